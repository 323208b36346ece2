use bytes::{Bytes, BytesMut};

use super::Stream;
use crate::error::{Error, Result};

/// Read-only view over a fixed buffer.
#[derive(Debug, Clone)]
pub struct ReadOnlyMemoryStream {
    data: Bytes,
    pos: usize,
}

impl ReadOnlyMemoryStream {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl Stream for ReadOnlyMemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<u64> {
        let end = self.data.len().min(self.pos + buf.len());
        let count = end - self.pos;
        buf[..count].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(count as u64)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<u64> {
        Err(Error::protocol("memory stream is read-only"))
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.data.len() as u64 {
            return Err(Error::invalid_argument(format!(
                "seek to {offset} past end of {}-byte buffer",
                self.data.len()
            )));
        }
        self.pos = offset as usize;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        self.data = Bytes::new();
        self.pos = 0;
        Ok(())
    }
}

/// Growable in-memory stream. Writing or seeking past the end zero-extends it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    data: BytesMut,
    pos: usize,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    fn grow_to(&mut self, len: usize) {
        if len > self.data.len() {
            self.data.resize(len, 0);
        }
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<u64> {
        let end = self.data.len().min(self.pos + buf.len());
        let count = end.saturating_sub(self.pos);
        buf[..count].copy_from_slice(&self.data[self.pos..self.pos + count]);
        self.pos += count;
        Ok(count as u64)
    }

    fn write(&mut self, buf: &[u8]) -> Result<u64> {
        let end = self.pos + buf.len();
        self.grow_to(end);
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len() as u64)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let offset = usize::try_from(offset).map_err(|_| {
            Error::invalid_argument(format!("offset {offset} exceeds address space"))
        })?;
        self.grow_to(offset);
        self.pos = offset;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        self.data.clear();
        self.pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn read_only_clamps_reads() {
        let mut stream = ReadOnlyMemoryStream::new(&b"abcdef"[..]);
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_only_rejects_writes_and_far_seeks() {
        let mut stream = ReadOnlyMemoryStream::new(vec![1u8, 2, 3]);
        assert!(!stream.can_write());
        assert_eq!(stream.write(b"x").unwrap_err().kind(), ErrorKind::Protocol);
        stream.seek(3).unwrap();
        assert_eq!(stream.seek(4).unwrap_err().kind(), ErrorKind::Argument);
    }

    #[test]
    fn memory_stream_extends_on_seek_and_write() {
        let mut stream = MemoryStream::new();
        stream.seek(4).unwrap();
        assert_eq!(stream.size().unwrap(), 4);
        stream.write(b"xy").unwrap();
        assert_eq!(stream.as_slice(), &[0, 0, 0, 0, b'x', b'y']);

        stream.seek(1).unwrap();
        stream.write(b"abcdefgh").unwrap();
        assert_eq!(stream.size().unwrap(), 9);
        assert_eq!(stream.tell().unwrap(), 9);

        stream.seek(0).unwrap();
        let mut buf = [0u8; 3];
        stream.read(&mut buf).unwrap();
        assert_eq!(&buf, &[0, b'a', b'b']);
        assert_eq!(&stream.into_bytes()[..], b"\0abcdefgh");
    }
}
