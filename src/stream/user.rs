use std::io;

use super::Stream;
use crate::error::{Error, Result};

type ReadFn = Box<dyn FnMut(&mut [u8]) -> io::Result<usize>>;
type WriteFn = Box<dyn FnMut(&[u8]) -> io::Result<usize>>;
type TellFn = Box<dyn FnMut() -> io::Result<u64>>;
type SeekFn = Box<dyn FnMut(u64) -> io::Result<()>>;
type SizeFn = Box<dyn FnMut() -> io::Result<u64>>;
type CloseFn = Box<dyn FnMut() -> io::Result<()>>;

/// Callback table describing a caller-implemented stream.
///
/// `tell`, `seek` and `size` are mandatory. `read` and `write` are each
/// optional, but at least one of them must be set. `close` is optional.
#[derive(Default)]
pub struct UserStreamCallbacks {
    pub read: Option<ReadFn>,
    pub write: Option<WriteFn>,
    pub tell: Option<TellFn>,
    pub seek: Option<SeekFn>,
    pub size: Option<SizeFn>,
    pub close: Option<CloseFn>,
}

impl UserStreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, f: impl FnMut(&mut [u8]) -> io::Result<usize> + 'static) -> Self {
        self.read = Some(Box::new(f));
        self
    }

    pub fn write(mut self, f: impl FnMut(&[u8]) -> io::Result<usize> + 'static) -> Self {
        self.write = Some(Box::new(f));
        self
    }

    pub fn tell(mut self, f: impl FnMut() -> io::Result<u64> + 'static) -> Self {
        self.tell = Some(Box::new(f));
        self
    }

    pub fn seek(mut self, f: impl FnMut(u64) -> io::Result<()> + 'static) -> Self {
        self.seek = Some(Box::new(f));
        self
    }

    pub fn size(mut self, f: impl FnMut() -> io::Result<u64> + 'static) -> Self {
        self.size = Some(Box::new(f));
        self
    }

    pub fn close(mut self, f: impl FnMut() -> io::Result<()> + 'static) -> Self {
        self.close = Some(Box::new(f));
        self
    }
}

pub struct UserStream {
    read: Option<ReadFn>,
    write: Option<WriteFn>,
    tell: TellFn,
    seek: SeekFn,
    size: SizeFn,
    close: Option<CloseFn>,
}

impl std::fmt::Debug for UserStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStream")
            .field("can_read", &self.read.is_some())
            .field("can_write", &self.write.is_some())
            .field("has_close", &self.close.is_some())
            .finish()
    }
}

impl UserStream {
    pub fn new(callbacks: UserStreamCallbacks) -> Result<Self> {
        let UserStreamCallbacks {
            read,
            write,
            tell,
            seek,
            size,
            close,
        } = callbacks;

        if read.is_none() && write.is_none() {
            return Err(Error::invalid_argument(
                "user stream must support at least reading or writing",
            ));
        }

        let missing = |name: &str| {
            Error::invalid_argument(format!("user stream must provide a {name} callback"))
        };

        Ok(Self {
            read,
            write,
            tell: tell.ok_or_else(|| missing("tell"))?,
            seek: seek.ok_or_else(|| missing("seek"))?,
            size: size.ok_or_else(|| missing("size"))?,
            close,
        })
    }
}

impl Stream for UserStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<u64> {
        let read = self
            .read
            .as_mut()
            .ok_or_else(|| Error::protocol("user stream does not support reading"))?;
        let count = read(buf).map_err(|e| Error::io("user stream read failed", e))?;
        debug_assert!(count <= buf.len());
        Ok(count as u64)
    }

    fn write(&mut self, buf: &[u8]) -> Result<u64> {
        let write = self
            .write
            .as_mut()
            .ok_or_else(|| Error::protocol("user stream does not support writing"))?;
        let count = write(buf).map_err(|e| Error::io("user stream write failed", e))?;
        debug_assert!(count <= buf.len());
        Ok(count as u64)
    }

    fn tell(&mut self) -> Result<u64> {
        (self.tell)().map_err(|e| Error::io("user stream tell failed", e))
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        (self.seek)(offset).map_err(|e| Error::io("user stream seek failed", e))
    }

    fn size(&mut self) -> Result<u64> {
        (self.size)().map_err(|e| Error::io("user stream size failed", e))
    }

    fn can_read(&self) -> bool {
        self.read.is_some()
    }

    fn can_write(&self) -> bool {
        self.write.is_some()
    }

    fn close(&mut self) -> Result<()> {
        match self.close.take() {
            Some(mut close) => close().map_err(|e| Error::io("user stream close failed", e)),
            None => Ok(()),
        }
    }
}
