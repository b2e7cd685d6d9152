use super::error::{DumpError, LoadError};

/// Growable output buffer that reports allocation failure instead of aborting.
pub(super) struct ChunkWriter {
    buf: Vec<u8>,
    limit: usize,
}

impl ChunkWriter {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    pub(super) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn reserve(&mut self, additional: usize) -> Result<(), DumpError> {
        let needed = self.buf.len().saturating_add(additional);
        if needed > self.limit {
            return Err(DumpError::TooLarge { limit: self.limit });
        }
        self.buf
            .try_reserve(additional)
            .map_err(|_| DumpError::OutOfMemory { requested: needed })
    }

    pub(super) fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), DumpError> {
        self.reserve(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub(super) fn write_u8(&mut self, value: u8) -> Result<(), DumpError> {
        self.write_bytes(&[value])
    }

    pub(super) fn write_u16(&mut self, value: u16) -> Result<(), DumpError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub(super) fn write_u32(&mut self, value: u32) -> Result<(), DumpError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub(super) fn write_len(&mut self, len: usize) -> Result<(), DumpError> {
        let len = u32::try_from(len).map_err(|_| DumpError::TooLarge { limit: self.limit })?;
        self.write_u32(len)
    }

    pub(super) fn write_i64(&mut self, value: i64) -> Result<(), DumpError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub(super) fn write_f64(&mut self, value: f64) -> Result<(), DumpError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub(super) fn write_string(&mut self, value: &str) -> Result<(), DumpError> {
        self.write_len(value.len())?;
        self.write_bytes(value.as_bytes())
    }

    pub(super) fn write_opt_string(&mut self, value: Option<&str>) -> Result<(), DumpError> {
        match value {
            None => self.write_u8(0),
            Some(value) => {
                self.write_u8(1)?;
                self.write_string(value)
            }
        }
    }
}

/// Cursor over a chunk being loaded.
pub(super) struct ChunkReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    pub(super) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(super) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(super) fn read_exact(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        if len > self.remaining() {
            return Err(LoadError::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_exact(N)?);
        Ok(buf)
    }

    pub(super) fn read_u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(super) fn read_u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub(super) fn read_u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads an element count, rejecting counts the remaining input cannot hold.
    pub(super) fn read_count(&mut self, min_element_size: usize) -> Result<usize, LoadError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_element_size) > self.remaining() {
            return Err(LoadError::Truncated);
        }
        Ok(count)
    }

    pub(super) fn read_i64(&mut self) -> Result<i64, LoadError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub(super) fn read_f64(&mut self) -> Result<f64, LoadError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub(super) fn read_string(&mut self) -> Result<String, LoadError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LoadError::InvalidUtf8)
    }

    pub(super) fn read_opt_string(&mut self) -> Result<Option<String>, LoadError> {
        match self.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.read_string()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_primitives() {
        let mut writer = ChunkWriter::new(usize::MAX);
        writer.write_u16(42).unwrap();
        writer.write_u32(9001).unwrap();
        writer.write_i64(-7).unwrap();
        writer.write_f64(2.5).unwrap();
        writer.write_string("hello").unwrap();
        writer.write_opt_string(None).unwrap();
        writer.write_opt_string(Some("x")).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = ChunkReader::new(&bytes);
        assert_eq!(reader.read_u16(), Ok(42));
        assert_eq!(reader.read_u32(), Ok(9001));
        assert_eq!(reader.read_i64(), Ok(-7));
        assert_eq!(reader.read_f64(), Ok(2.5));
        assert_eq!(reader.read_string(), Ok("hello".to_string()));
        assert_eq!(reader.read_opt_string(), Ok(None));
        assert_eq!(reader.read_opt_string(), Ok(Some("x".to_string())));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn writer_enforces_limit() {
        let mut writer = ChunkWriter::new(4);
        writer.write_u32(1).unwrap();
        assert_eq!(writer.write_u8(0), Err(DumpError::TooLarge { limit: 4 }));
    }

    #[test]
    fn reader_reports_truncation() {
        let mut reader = ChunkReader::new(&[1, 0]);
        assert_eq!(reader.read_u32(), Err(LoadError::Truncated));
    }

    #[test]
    fn reader_rejects_impossible_counts() {
        let bytes = 1000u32.to_le_bytes();
        let mut reader = ChunkReader::new(&bytes);
        assert_eq!(reader.read_count(1), Err(LoadError::Truncated));
    }

    #[test]
    fn reader_rejects_invalid_utf8() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        let mut reader = ChunkReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(LoadError::InvalidUtf8));
    }
}
