use std::{
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::Path,
};

use tap::Pipe;

use super::Stream;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAccess {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Open an existing file.
    Open,
    /// Create a new file, truncating an existing one.
    Create,
}

/// Stream over an OS file. The handle is released on [`Stream::close`] or drop.
#[derive(Debug)]
pub struct FileStream {
    file: Option<File>,
    access: StreamAccess,
}

impl FileStream {
    pub fn open(path: impl AsRef<Path>, access: StreamAccess, mode: FileMode) -> Result<Self> {
        let path = path.as_ref();
        let mut options = File::options();
        match (access, mode) {
            (StreamAccess::Read, FileMode::Open) => options.read(true),
            (StreamAccess::Read, FileMode::Create) => {
                return Err(Error::invalid_argument(
                    "cannot create a file with read-only access",
                ))
            }
            (StreamAccess::ReadWrite, FileMode::Open) => options.read(true).write(true),
            (StreamAccess::ReadWrite, FileMode::Create) => {
                options.read(true).write(true).create(true).truncate(true)
            }
        };

        options
            .open(path)
            .map_err(|e| Error::io(format!("could not open {}", path.display()), e))?
            .pipe(|file| Self {
                file: Some(file),
                access,
            })
            .pipe(Ok)
    }

    /// Opens an existing file for reading.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, StreamAccess::Read, FileMode::Open)
    }

    /// Creates (or truncates) a file for reading and writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, StreamAccess::ReadWrite, FileMode::Create)
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::io("stream is closed", ErrorKind::NotConnected.into()))
    }
}

impl Stream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<u64> {
        let file = self.file()?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled as u64)
    }

    fn write(&mut self, buf: &[u8]) -> Result<u64> {
        if self.access != StreamAccess::ReadWrite {
            return Err(Error::protocol("file stream was opened read-only"));
        }
        self.file()?.write_all(buf)?;
        Ok(buf.len() as u64)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.file()?.stream_position()?)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.file()?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        self.access == StreamAccess::ReadWrite
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            if self.access == StreamAccess::ReadWrite {
                file.flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_create_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStream::open(dir.path().join("x"), StreamAccess::Read, FileMode::Create)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Argument);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStream::open_read(dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }

    #[test]
    fn write_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        let mut stream = FileStream::create(&path).unwrap();
        assert!(stream.can_read() && stream.can_write());
        assert_eq!(stream.write(b"hello world").unwrap(), 11);
        assert_eq!(stream.tell().unwrap(), 11);
        stream.close().unwrap();
        stream.close().unwrap();
        assert!(stream.tell().is_err());

        let mut stream = FileStream::open_read(&path).unwrap();
        assert!(!stream.can_write());
        assert_eq!(stream.size().unwrap(), 11);
        stream.seek(6).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"world");
        assert_eq!(stream.write(b"x").unwrap_err().kind(), crate::ErrorKind::Protocol);
    }
}
