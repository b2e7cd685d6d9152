//! One independent runtime instance: value stack, heap, registry, globals.
//!
//! Stack indices follow the usual embedding convention. Positive indices
//! count from the bottom starting at 1; negative indices count from the top,
//! so `-1` is the topmost value.

use std::sync::Arc;

use crate::{
    bytecode::{
        chunk::{self, ChunkCache, DumpError},
        prototype::Prototype,
    },
    config::ContextConfig,
    runtime::{
        StackIndex,
        builtins::BUILTINS,
        closure::Closure,
        error::RuntimeError,
        frame::Frame,
        gc::{GcHandle, GcHeap, HeapObject, Userdata},
        hash_key::HashKey,
        host::{HostBindings, HostRef, Proxy, ProxyKind},
        registry::{Registry, RegistryRef},
        table::Table,
        value::{Value, ValueType},
    },
};

pub struct Context {
    pub(crate) heap: GcHeap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    registry: Registry,
    globals: GcHandle,
    bindings: Arc<HostBindings>,
    chunk_cache: ChunkCache,
    pub(crate) config: ContextConfig,
    pub(crate) trace: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("top", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("pinned", &self.registry.pinned_count())
            .field("heap", &self.heap)
            .finish()
    }
}

impl Context {
    /// Context with default limits and no host classes.
    pub fn new() -> Self {
        Self::with_config(&ContextConfig::default(), HostBindings::empty())
    }

    pub fn with_bindings(bindings: Arc<HostBindings>) -> Self {
        Self::with_config(&ContextConfig::default(), bindings)
    }

    pub fn with_config(config: &ContextConfig, bindings: Arc<HostBindings>) -> Self {
        let mut heap = GcHeap::with_threshold(config.gc_threshold);
        heap.set_enabled(config.gc_enabled);

        let mut globals = Table::with_capacity(BUILTINS.len());
        for builtin in BUILTINS {
            globals.raw_set(HashKey::from_str(builtin.name), Value::Builtin(builtin.clone()));
        }
        let globals = heap.alloc(HeapObject::Table(globals));

        Self {
            heap,
            stack: Vec::with_capacity(64),
            frames: Vec::new(),
            registry: Registry::default(),
            globals,
            bindings,
            chunk_cache: ChunkCache::new(config.chunk_cache_capacity),
            config: config.clone(),
            trace: config.trace,
        }
    }

    pub fn bindings(&self) -> &Arc<HostBindings> {
        &self.bindings
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    // ----- stack -------------------------------------------------------

    /// Converts a stack index to a zero-based slot.
    pub(crate) fn slot(&self, index: StackIndex) -> Result<usize, RuntimeError> {
        let len = self.stack.len() as i64;
        let slot = match index {
            i if i > 0 => i64::from(i) - 1,
            i if i < 0 => len + i64::from(i),
            _ => -1,
        };
        if slot < 0 || slot >= len {
            return Err(RuntimeError::InvalidIndex(index));
        }
        Ok(slot as usize)
    }

    /// Absolute (positive) form of `index`.
    pub fn abs_index(&self, index: StackIndex) -> Result<StackIndex, RuntimeError> {
        Ok(self.slot(index)? as StackIndex + 1)
    }

    pub fn get_top(&self) -> StackIndex {
        self.stack.len() as StackIndex
    }

    /// Sets the stack height. Growing fills with nil; a negative index keeps
    /// everything up to and including that position.
    pub fn set_top(&mut self, index: StackIndex) -> Result<(), RuntimeError> {
        let new_len = if index >= 0 {
            index as usize
        } else {
            self.stack
                .len()
                .checked_sub(index.unsigned_abs() as usize - 1)
                .ok_or(RuntimeError::InvalidIndex(index))?
        };
        if new_len > self.config.max_stack {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_stack,
            });
        }
        self.stack.resize(new_len, Value::Nil);
        Ok(())
    }

    pub fn pop(&mut self, count: usize) -> Result<(), RuntimeError> {
        let new_len = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        self.stack.truncate(new_len);
        Ok(())
    }

    pub(crate) fn pop_value(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn push_nil(&mut self) {
        self.push(Value::Nil);
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.push(Value::Boolean(value));
    }

    pub fn push_integer(&mut self, value: i64) {
        self.push(Value::Integer(value));
    }

    pub fn push_number(&mut self, value: f64) {
        self.push(Value::Float(value));
    }

    pub fn push_string(&mut self, value: &str) {
        self.push(Value::String(value.into()));
    }

    pub fn push_light_ref(&mut self, pointer: usize) {
        self.push(Value::LightRef(pointer));
    }

    /// Wraps `host` in a proxy of the given kind valid in this context.
    pub fn push_proxy(&mut self, kind: ProxyKind, host: HostRef) {
        self.push(Value::Proxy(Proxy::new(kind, host)));
    }

    pub fn push_globals(&mut self) {
        self.push(Value::Table(self.globals));
    }

    pub fn globals(&self) -> Value {
        Value::Table(self.globals)
    }

    /// Pushes a new empty table.
    pub fn new_table(&mut self) {
        self.safe_point();
        let handle = self.heap.alloc(HeapObject::Table(Table::default()));
        self.push(Value::Table(handle));
    }

    /// Pushes a raw userdata block. Userdata without a proxy binding cannot
    /// be transferred.
    pub fn new_userdata(&mut self, type_name: &str, bytes: Vec<u8>) {
        self.safe_point();
        let handle = self.heap.alloc(HeapObject::Userdata(Userdata {
            type_name: type_name.to_string(),
            bytes,
        }));
        self.push(Value::Userdata(handle));
    }

    pub fn value_at(&self, index: StackIndex) -> Result<Value, RuntimeError> {
        Ok(self.stack[self.slot(index)?].clone())
    }

    /// Pushes a copy of the value at `index`.
    pub fn push_value_at(&mut self, index: StackIndex) -> Result<(), RuntimeError> {
        let value = self.value_at(index)?;
        self.push(value);
        Ok(())
    }

    /// Removes the value at `index`, shifting the ones above it down.
    pub fn remove(&mut self, index: StackIndex) -> Result<Value, RuntimeError> {
        let slot = self.slot(index)?;
        Ok(self.stack.remove(slot))
    }

    pub fn type_of(&self, index: StackIndex) -> Result<ValueType, RuntimeError> {
        Ok(self.stack[self.slot(index)?].value_type())
    }

    pub fn to_integer(&self, index: StackIndex) -> Option<i64> {
        self.slot(index).ok().and_then(|slot| self.stack[slot].as_integer())
    }

    pub fn to_number(&self, index: StackIndex) -> Option<f64> {
        self.slot(index).ok().and_then(|slot| self.stack[slot].as_number())
    }

    /// Truthiness of the value; invalid indices read as false.
    pub fn to_boolean(&self, index: StackIndex) -> bool {
        self.slot(index)
            .map(|slot| self.stack[slot].is_truthy())
            .unwrap_or(false)
    }

    /// String contents, with numbers converted. `None` for other types.
    pub fn to_str(&self, index: StackIndex) -> Option<Arc<str>> {
        match &self.stack[self.slot(index).ok()?] {
            Value::String(s) => Some(s.clone()),
            number @ (Value::Integer(_) | Value::Float(_)) => Some(number.to_string().into()),
            _ => None,
        }
    }

    pub fn proxy_kind(&self, index: StackIndex) -> Option<ProxyKind> {
        self.slot(index)
            .ok()
            .and_then(|slot| self.stack[slot].proxy_kind())
    }

    // ----- heap access ---------------------------------------------------

    pub(crate) fn table(&self, handle: GcHandle) -> Result<&Table, RuntimeError> {
        match self.heap.get(handle) {
            Some(HeapObject::Table(table)) => Ok(table),
            Some(other) => Err(RuntimeError::TypeMismatch {
                expected: "table",
                found: other.kind_name(),
            }),
            None => Err(RuntimeError::DanglingHandle(handle.index())),
        }
    }

    pub(crate) fn table_mut(&mut self, handle: GcHandle) -> Result<&mut Table, RuntimeError> {
        match self.heap.get_mut(handle) {
            Some(HeapObject::Table(table)) => Ok(table),
            Some(other) => Err(RuntimeError::TypeMismatch {
                expected: "table",
                found: other.kind_name(),
            }),
            None => Err(RuntimeError::DanglingHandle(handle.index())),
        }
    }

    pub(crate) fn closure(&self, handle: GcHandle) -> Result<&Closure, RuntimeError> {
        match self.heap.get(handle) {
            Some(HeapObject::Closure(closure)) => Ok(closure),
            Some(other) => Err(RuntimeError::TypeMismatch {
                expected: "function",
                found: other.kind_name(),
            }),
            None => Err(RuntimeError::DanglingHandle(handle.index())),
        }
    }

    pub(crate) fn cell(&self, handle: GcHandle) -> Result<&Value, RuntimeError> {
        match self.heap.get(handle) {
            Some(HeapObject::Upvalue(value)) => Ok(value),
            _ => Err(RuntimeError::DanglingHandle(handle.index())),
        }
    }

    pub(crate) fn cell_mut(&mut self, handle: GcHandle) -> Result<&mut Value, RuntimeError> {
        match self.heap.get_mut(handle) {
            Some(HeapObject::Upvalue(value)) => Ok(value),
            _ => Err(RuntimeError::DanglingHandle(handle.index())),
        }
    }

    fn table_handle_at(&self, index: StackIndex) -> Result<GcHandle, RuntimeError> {
        match &self.stack[self.slot(index)?] {
            Value::Table(handle) => Ok(*handle),
            other => Err(RuntimeError::TypeMismatch {
                expected: "table",
                found: other.type_name(),
            }),
        }
    }

    // ----- tables --------------------------------------------------------

    /// Reads `t[k]` without metamethods, where `t` is at `index` and `k` is
    /// popped from the top. Pushes the result and returns its type.
    pub fn raw_get(&mut self, index: StackIndex) -> Result<ValueType, RuntimeError> {
        let handle = self.table_handle_at(index)?;
        let key = self.pop_value()?;
        let value = self.raw_lookup(handle, &key)?;
        let kind = value.value_type();
        self.push(value);
        Ok(kind)
    }

    /// Writes `t[k] = v` without metamethods, where `t` is at `index`, `v`
    /// is the top value and `k` the one below it. Pops both.
    pub fn raw_set(&mut self, index: StackIndex) -> Result<(), RuntimeError> {
        let handle = self.table_handle_at(index)?;
        if self.stack.len() < 2 {
            return Err(RuntimeError::StackUnderflow);
        }
        let value = self.pop_value()?;
        let key = self.pop_value()?;
        self.raw_store(handle, &key, value)
    }

    pub fn raw_get_field(&mut self, index: StackIndex, name: &str) -> Result<ValueType, RuntimeError> {
        let handle = self.table_handle_at(index)?;
        let value = self.table(handle)?.raw_get(&HashKey::from_str(name));
        let kind = value.value_type();
        self.push(value);
        Ok(kind)
    }

    /// Pops the top value into `t[name]`.
    pub fn raw_set_field(&mut self, index: StackIndex, name: &str) -> Result<(), RuntimeError> {
        let handle = self.table_handle_at(index)?;
        let value = self.pop_value()?;
        self.table_mut(handle)?
            .raw_set(HashKey::from_str(name), value);
        Ok(())
    }

    pub fn raw_get_index(&mut self, index: StackIndex, n: i64) -> Result<ValueType, RuntimeError> {
        let handle = self.table_handle_at(index)?;
        let value = self.table(handle)?.raw_get(&HashKey::Integer(n));
        let kind = value.value_type();
        self.push(value);
        Ok(kind)
    }

    /// Pops the top value into `t[n]`.
    pub fn raw_set_index(&mut self, index: StackIndex, n: i64) -> Result<(), RuntimeError> {
        let handle = self.table_handle_at(index)?;
        let value = self.pop_value()?;
        self.table_mut(handle)?.raw_set(HashKey::Integer(n), value);
        Ok(())
    }

    /// Length without metamethods: array border for tables, byte length for
    /// strings.
    pub fn raw_len(&self, index: StackIndex) -> Result<usize, RuntimeError> {
        match &self.stack[self.slot(index)?] {
            Value::String(s) => Ok(s.len()),
            Value::Table(handle) => Ok(self.table(*handle)?.len()),
            other => Err(RuntimeError::TypeMismatch {
                expected: "table or string",
                found: other.type_name(),
            }),
        }
    }

    /// Snapshot of every key/value pair of the table at `index`.
    pub fn table_pairs(&self, index: StackIndex) -> Result<Vec<(Value, Value)>, RuntimeError> {
        let handle = self.table_handle_at(index)?;
        Ok(self
            .table(handle)?
            .iter()
            .map(|(key, value)| (key.to_value(), value.clone()))
            .collect())
    }

    pub fn get_global(&mut self, name: &str) -> ValueType {
        let value = self
            .table(self.globals)
            .map(|globals| globals.raw_get(&HashKey::from_str(name)))
            .unwrap_or(Value::Nil);
        let kind = value.value_type();
        self.push(value);
        kind
    }

    /// Pops the top value into the global `name`.
    pub fn set_global(&mut self, name: &str) -> Result<(), RuntimeError> {
        let value = self.pop_value()?;
        let globals = self.globals;
        self.table_mut(globals)?
            .raw_set(HashKey::from_str(name), value);
        Ok(())
    }

    pub(crate) fn raw_lookup(&self, table: GcHandle, key: &Value) -> Result<Value, RuntimeError> {
        let table = self.table(table)?;
        Ok(match key.to_hash_key() {
            Some(key) => table.raw_get(&key),
            None => Value::Nil,
        })
    }

    pub(crate) fn raw_store(
        &mut self,
        table: GcHandle,
        key: &Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let key = key.to_hash_key().ok_or(match key {
            Value::Nil => RuntimeError::InvalidKey("nil"),
            _ => RuntimeError::InvalidKey("NaN"),
        })?;
        self.table_mut(table)?.raw_set(key, value);
        Ok(())
    }

    // ----- registry ------------------------------------------------------

    /// Pins the value at `index` without removing it from the stack.
    pub fn pin(&mut self, index: StackIndex) -> Result<RegistryRef, RuntimeError> {
        let value = self.value_at(index)?;
        Ok(self.registry.pin(value))
    }

    pub fn pin_value(&mut self, value: Value) -> RegistryRef {
        self.registry.pin(value)
    }

    pub fn pinned(&self, reference: RegistryRef) -> Option<&Value> {
        self.registry.get(reference)
    }

    pub fn push_pinned(&mut self, reference: RegistryRef) -> Result<(), RuntimeError> {
        let value = self
            .registry
            .get(reference)
            .cloned()
            .ok_or(RuntimeError::InvalidIndex(reference.slot() as StackIndex))?;
        self.push(value);
        Ok(())
    }

    pub fn unpin(&mut self, reference: RegistryRef) {
        self.registry.unpin(reference);
    }

    pub fn pinned_count(&self) -> usize {
        self.registry.pinned_count()
    }

    // ----- upvalues ------------------------------------------------------

    /// Name and current value of upvalue `n` (1-based) of `func`.
    ///
    /// Stripped functions report an empty name. Returns `None` past the last
    /// upvalue and for anything that is not a script function.
    pub fn upvalue(&self, func: &Value, n: usize) -> Option<(&str, Value)> {
        let Value::Function(handle) = func else {
            return None;
        };
        let closure = self.closure(*handle).ok()?;
        let slot = n.checked_sub(1)?;
        let cell = *closure.upvalues.get(slot)?;
        let value = self.cell(cell).ok()?.clone();
        Some((closure.proto.upvalue_name(slot).unwrap_or(""), value))
    }

    /// Pushes upvalue `n` of the function at `index` and returns its name.
    /// Pushes nothing when there is no such upvalue.
    pub fn get_upvalue(&mut self, index: StackIndex, n: usize) -> Result<Option<String>, RuntimeError> {
        let func = self.value_at(index)?;
        match self.upvalue(&func, n) {
            Some((name, value)) => {
                let name = name.to_string();
                self.push(value);
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Pops the top value into upvalue `n` of the function at `index` and
    /// returns its name. Pops nothing when there is no such upvalue.
    pub fn set_upvalue(&mut self, index: StackIndex, n: usize) -> Result<Option<String>, RuntimeError> {
        let Value::Function(handle) = self.value_at(index)? else {
            return Ok(None);
        };
        let closure = self.closure(handle)?;
        let Some(slot) = n.checked_sub(1) else {
            return Ok(None);
        };
        let Some(&cell) = closure.upvalues.get(slot) else {
            return Ok(None);
        };
        let name = closure.proto.upvalue_name(slot).unwrap_or("").to_string();
        let value = self.pop_value()?;
        *self.cell_mut(cell)? = value;
        Ok(Some(name))
    }

    // ----- functions -----------------------------------------------------

    /// Pushes a closure over `proto`. The first upvalue is bound to this
    /// context's globals; the rest start as nil.
    pub fn load_prototype(&mut self, proto: Prototype, chunk_name: &str) -> Result<(), RuntimeError> {
        chunk::verify(&proto)?;
        self.push_main_closure(Arc::new(proto.with_source(chunk_name)));
        Ok(())
    }

    /// Loads a binary chunk produced by [`Context::dump`] and pushes the
    /// resulting closure. Text input is rejected.
    pub fn load_binary(&mut self, bytes: &[u8], chunk_name: &str) -> Result<(), RuntimeError> {
        let proto = if self.chunk_cache.is_enabled() {
            let key = ChunkCache::key(bytes, chunk_name);
            match self.chunk_cache.get(&key) {
                Some(proto) => proto,
                None => {
                    let proto = Arc::new(chunk::undump(bytes, chunk_name)?);
                    self.chunk_cache.insert(key, proto.clone());
                    proto
                }
            }
        } else {
            Arc::new(chunk::undump(bytes, chunk_name)?)
        };
        self.push_main_closure(proto);
        Ok(())
    }

    fn push_main_closure(&mut self, proto: Arc<Prototype>) {
        self.safe_point();
        let globals = Value::Table(self.globals);
        let upvalues = (0..proto.upvalues.len())
            .map(|i| {
                let value = if i == 0 { globals.clone() } else { Value::Nil };
                self.heap.alloc(HeapObject::Upvalue(value))
            })
            .collect();
        let handle = self.heap.alloc(HeapObject::Closure(Closure::new(proto, upvalues)));
        self.push(Value::Function(handle));
    }

    /// Writes the function at `index` as a binary chunk.
    pub fn dump(&self, index: StackIndex, strip: bool) -> Result<Vec<u8>, DumpError> {
        let value = self
            .value_at(index)
            .map_err(|_| DumpError::NotAFunction("no value"))?;
        self.dump_value(&value, strip)
    }

    /// Like [`Context::dump`] for a value this context already holds.
    pub fn dump_value(&self, value: &Value, strip: bool) -> Result<Vec<u8>, DumpError> {
        match value {
            Value::Function(handle) => {
                let closure = self
                    .closure(*handle)
                    .map_err(|_| DumpError::NotAFunction("function"))?;
                chunk::dump(&closure.proto, strip, self.config.max_chunk_size)
            }
            Value::Builtin(builtin) => Err(DumpError::NativeFunction(builtin.name)),
            other => Err(DumpError::NotAFunction(other.type_name())),
        }
    }

    pub fn chunk_cache(&self) -> &ChunkCache {
        &self.chunk_cache
    }

    /// Calls the function below the top `nargs` values, popping it and the
    /// arguments and pushing its single result.
    ///
    /// On error the function and its arguments are removed and nothing is
    /// pushed.
    pub fn call(&mut self, nargs: usize) -> Result<(), RuntimeError> {
        let len = self.stack.len();
        if nargs >= len {
            return Err(RuntimeError::StackUnderflow);
        }
        let callee_slot = len - nargs - 1;
        let entry_depth = self.frames.len();

        self.safe_point();
        let result = self
            .call_value(callee_slot, nargs)
            .and_then(|_| self.run(entry_depth));

        if let Err(err) = result {
            log::debug!("call failed: {}", err);
            self.frames.truncate(entry_depth);
            self.stack.truncate(callee_slot);
            return Err(err);
        }
        Ok(())
    }

    // ----- gc ------------------------------------------------------------

    /// Collects when the allocation threshold has been reached.
    pub(crate) fn safe_point(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// Runs a full collection and returns the number of freed objects.
    pub fn collect_garbage(&mut self) -> usize {
        let mut root_handles = Vec::with_capacity(self.frames.len() + 1);
        root_handles.push(self.globals);
        root_handles.extend(self.frames.iter().map(|frame| frame.closure));
        let freed = self
            .heap
            .collect(self.stack.iter().chain(self.registry.values()), &root_handles);
        log::trace!(
            "gc: freed {} objects, {} live",
            freed,
            self.heap.live_count()
        );
        freed
    }

    pub fn live_objects(&self) -> usize {
        self.heap.live_count()
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;
