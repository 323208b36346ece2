//! Seekable byte streams the chunk file reader and writer operate on.
//!
//! Positions are absolute byte offsets from the start of the stream. A
//! stream must support at least one of reading or writing.

use crate::error::{Error, Result};

mod file;
mod memory;
mod user;

pub use file::{FileMode, FileStream, StreamAccess};
pub use memory::{MemoryStream, ReadOnlyMemoryStream};
pub use user::{UserStream, UserStreamCallbacks};

pub trait Stream {
    /// Reads up to `buf.len()` bytes, returning how many were read. Fewer
    /// than requested means the end of the stream was reached.
    fn read(&mut self, buf: &mut [u8]) -> Result<u64>;

    /// Writes up to `buf.len()` bytes, returning how many were written.
    fn write(&mut self, buf: &[u8]) -> Result<u64>;

    fn tell(&mut self) -> Result<u64>;

    fn seek(&mut self, offset: u64) -> Result<()>;

    fn size(&mut self) -> Result<u64>;

    fn can_read(&self) -> bool;

    fn can_write(&self) -> bool;

    /// Releases the underlying resource. Later calls are no-ops.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Stream + ?Sized> Stream for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<u64> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<u64> {
        (**self).write(buf)
    }

    fn tell(&mut self) -> Result<u64> {
        (**self).tell()
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        (**self).seek(offset)
    }

    fn size(&mut self) -> Result<u64> {
        (**self).size()
    }

    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<u64> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<u64> {
        (**self).write(buf)
    }

    fn tell(&mut self) -> Result<u64> {
        (**self).tell()
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        (**self).seek(offset)
    }

    fn size(&mut self) -> Result<u64> {
        (**self).size()
    }

    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Helpers layered over [`Stream`] for callers that need whole buffers.
pub trait StreamExt: Stream {
    /// Fills `buf` completely or fails with `UnexpectedEof`.
    fn read_exact(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        let read = self.read(buf)?;
        if read != buf.len() as u64 {
            return Err(Error::unexpected_eof(what, buf.len() as u64, read));
        }
        Ok(())
    }

    /// Writes all of `buf` or fails with `WriteZero`.
    fn write_all(&mut self, buf: &[u8], what: &str) -> Result<()> {
        let written = self.write(buf)?;
        if written != buf.len() as u64 {
            return Err(Error::io(
                format!("{what}: wrote {written} of {} bytes", buf.len()),
                std::io::Error::from(std::io::ErrorKind::WriteZero),
            ));
        }
        Ok(())
    }
}

impl<S: Stream + ?Sized> StreamExt for S {}

/// Converts a signed offset or size coming from an external caller.
pub fn checked_offset(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::invalid_argument(format!("negative offset {value}")))
}
