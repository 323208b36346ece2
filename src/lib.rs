//! Reader and writer for RDF chunk files.
//!
//! A chunk file is a seekable container of named chunks. Each chunk has an
//! optional header and a payload that may be zstd-compressed. Chunks are
//! addressed by a 16-byte identifier plus an index that counts chunks with
//! the same identifier in creation order.
//!
//! ```no_run
//! use rdf::{ChunkFile, ChunkFileWriter, Compression, FileStream};
//!
//! # fn main() -> rdf::Result<()> {
//! let mut writer = ChunkFileWriter::create(FileStream::create("trace.rdf")?)?;
//! writer.write_chunk("TestData", &[0xDE, 0xAD, 0xBE, 0xEF], b"abc", Compression::None, 1)?;
//! writer.finalize()?;
//!
//! let mut file = ChunkFile::open_file("trace.rdf")?;
//! assert_eq!(file.chunk_data("TestData", 0)?, b"abc");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chunk;
mod error;
pub mod reader;
pub mod stream;
pub mod writer;

pub use chunk::{ChunkId, Codec, Compression, Header, IndexEntry, ZstdCodec, IDENTIFIER_SIZE};
pub use error::{Error, ErrorKind, Result};
pub use reader::{ChunkFile, ChunkFileIterator};
pub use stream::{
    FileMode, FileStream, MemoryStream, ReadOnlyMemoryStream, Stream, StreamAccess, StreamExt,
    UserStream, UserStreamCallbacks,
};
pub use writer::{ChunkFileWriter, WriterMode, WriterOptions};

pub const fn make_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 22) | (minor << 12) | patch
}

/// Version of the library interface, encoded with [make_version].
pub const INTERFACE_VERSION: u32 = make_version(1, 2, 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_version_encoding() {
        assert_eq!(INTERFACE_VERSION, (1 << 22) | (2 << 12));
        assert!(make_version(1, 3, 0) > INTERFACE_VERSION);
    }
}
