//! Building new chunk files and appending to existing ones.

use std::collections::HashMap;

use bytes::BytesMut;
use tracing::{debug, trace};
use zerocopy::{IntoBytes, I64};

use crate::{
    chunk::{ChunkId, Codec, Compression, Header, IndexEntry, ZstdCodec},
    error::{Error, Result},
    reader::{read_header, read_index},
    stream::{Stream, StreamExt},
};

mod options;

pub use options::{WriterMode, WriterOptions};

/// Writes chunks to a stream.
///
/// Chunks are written with [begin_chunk](Self::begin_chunk),
/// [append_to_chunk](Self::append_to_chunk) and [end_chunk](Self::end_chunk),
/// one at a time. Nothing is readable until [finalize](Self::finalize) writes
/// the index and rewrites the header; dropping the writer without finalizing
/// leaves the file without a valid index.
pub struct ChunkFileWriter<S: Stream> {
    stream: S,
    header: Header,
    chunks: Vec<IndexEntry>,
    /// Position in `chunks` of the open chunk.
    current: Option<usize>,
    /// Pending payload of an open compressed chunk.
    buffer: BytesMut,
    counts: HashMap<ChunkId, usize>,
    write_offset: u64,
    codec: Box<dyn Codec>,
}

impl<S: Stream> ChunkFileWriter<S> {
    /// Starts a new file at the beginning of `stream`.
    pub fn create(stream: S) -> Result<Self> {
        Self::with_options(stream, WriterOptions::default())
    }

    /// Opens an existing file in `stream` to add more chunks.
    pub fn append(stream: S) -> Result<Self> {
        Self::with_options(stream, WriterOptions::append())
    }

    pub fn with_options(mut stream: S, options: WriterOptions) -> Result<Self> {
        if !stream.can_write() {
            return Err(Error::protocol("stream must allow write access"));
        }

        let codec = Box::new(ZstdCodec::new(options.compression_level));

        match options.mode {
            WriterMode::Create => {
                let header = Header::new();
                stream.seek(0)?;
                stream.write_all(header.as_bytes(), "file header")?;
                let write_offset = stream.tell()?;

                debug!(write_offset, "created chunk file");

                Ok(Self {
                    stream,
                    header,
                    chunks: Vec::new(),
                    current: None,
                    buffer: BytesMut::new(),
                    counts: HashMap::new(),
                    write_offset,
                    codec,
                })
            }
            WriterMode::Append => {
                if !stream.can_read() {
                    return Err(Error::protocol("appending requires a stream with read access"));
                }

                let header = read_header(&mut stream)?;
                let chunks = read_index(&mut stream, &header)?;

                let mut counts = HashMap::new();
                for entry in &chunks {
                    *counts.entry(entry.chunk_identifier).or_insert(0) += 1;
                }

                // New chunks overwrite the old index.
                let write_offset = header.index_offset.get() as u64;
                stream.seek(write_offset)?;

                debug!(
                    entries = chunks.len(),
                    write_offset, "opened chunk file for append"
                );

                Ok(Self {
                    stream,
                    header,
                    chunks,
                    current: None,
                    buffer: BytesMut::new(),
                    counts,
                    write_offset,
                    codec,
                })
            }
        }
    }

    /// Replaces the codec used for [Compression::Zstd] chunks.
    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Opens a chunk and writes its (never compressed) header. A `version`
    /// of 0 is stored as 1.
    pub fn begin_chunk(
        &mut self,
        id: impl Into<ChunkId>,
        header: &[u8],
        compression: Compression,
        version: u32,
    ) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::protocol("a chunk is already open"));
        }

        let id = id.into();
        let mut entry = IndexEntry::new(id, compression, version);

        self.stream.seek(self.write_offset)?;
        entry.chunk_header_offset = I64::new(self.write_offset as i64);
        if !header.is_empty() {
            self.stream.write_all(header, "chunk header")?;
            entry.chunk_header_size = I64::new(header.len() as i64);
        }
        self.write_offset += header.len() as u64;
        entry.chunk_data_offset = I64::new(self.write_offset as i64);

        trace!(%id, %compression, header_size = header.len(), "begin chunk");

        self.chunks.push(entry);
        self.current = Some(self.chunks.len() - 1);
        Ok(())
    }

    /// Adds payload to the open chunk. Uncompressed data goes straight to the
    /// stream; compressed data is buffered until [Self::end_chunk].
    pub fn append_to_chunk(&mut self, data: &[u8]) -> Result<()> {
        let current = self
            .current
            .ok_or_else(|| Error::protocol("no chunk is open"))?;

        match self.chunks[current].compression {
            Compression::None => {
                self.stream.write_all(data, "chunk data")?;
                self.write_offset += data.len() as u64;
            }
            Compression::Zstd => self.buffer.extend_from_slice(data),
        }

        Ok(())
    }

    /// Closes the open chunk and returns its index among chunks with the same
    /// identifier.
    pub fn end_chunk(&mut self) -> Result<usize> {
        let current = self
            .current
            .ok_or_else(|| Error::protocol("no chunk is open"))?;

        let compression = self.chunks[current].compression;
        match compression {
            Compression::None => {
                let entry = &mut self.chunks[current];
                let size = self.write_offset - entry.chunk_data_offset.get() as u64;
                entry.chunk_data_size = I64::new(size as i64);
                entry.uncompressed_chunk_size = I64::new(size as i64);
            }
            Compression::Zstd => {
                let packed = self.codec.compress(&self.buffer)?;
                self.stream.write_all(&packed, "compressed chunk data")?;

                let entry = &mut self.chunks[current];
                entry.chunk_data_size = I64::new(packed.len() as i64);
                entry.uncompressed_chunk_size = I64::new(self.buffer.len() as i64);
                self.write_offset += packed.len() as u64;
            }
        }

        let id = self.chunks[current].chunk_identifier;
        let count = self.counts.entry(id).or_insert(0);
        let index = *count;
        *count += 1;

        trace!(
            %id,
            index,
            stored = self.chunks[current].chunk_data_size.get(),
            "end chunk"
        );

        self.current = None;
        self.buffer.clear();

        Ok(index)
    }

    /// Writes a complete chunk in one call; returns its index.
    pub fn write_chunk(
        &mut self,
        id: impl Into<ChunkId>,
        header: &[u8],
        data: &[u8],
        compression: Compression,
        version: u32,
    ) -> Result<usize> {
        self.begin_chunk(id, header, compression, version)?;
        self.append_to_chunk(data)?;
        self.end_chunk()
    }

    /// Number of chunks written so far with this identifier, including the
    /// ones present before an append.
    pub fn chunk_count(&self, id: impl Into<ChunkId>) -> usize {
        self.counts.get(&id.into()).copied().unwrap_or(0)
    }

    /// Writes the index and the final header, returning the stream.
    pub fn finalize(mut self) -> Result<S> {
        if self.current.is_some() {
            return Err(Error::protocol("cannot finalize with a chunk still open"));
        }

        self.stream.seek(self.write_offset)?;
        self.stream
            .write_all(self.chunks.as_slice().as_bytes(), "chunk index")?;

        self.header.index_offset = I64::new(self.write_offset as i64);
        self.header.index_size = I64::new((self.chunks.len() * IndexEntry::SIZE) as i64);

        self.stream.seek(0)?;
        self.stream.write_all(self.header.as_bytes(), "file header")?;

        debug!(
            entries = self.chunks.len(),
            index_offset = self.write_offset,
            "finalized chunk file"
        );

        Ok(self.stream)
    }
}

impl<S: Stream> std::fmt::Debug for ChunkFileWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkFileWriter")
            .field("entries", &self.chunks.len())
            .field("open", &self.current.is_some())
            .field("write_offset", &self.write_offset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChunkFile, ErrorKind, MemoryStream, ReadOnlyMemoryStream};

    #[test]
    fn streaming_uncompressed_chunk() {
        let mut writer = ChunkFileWriter::create(MemoryStream::new()).unwrap();
        writer
            .begin_chunk("TestData", &[0xDE, 0xAD, 0xBE, 0xEF], Compression::None, 1)
            .unwrap();
        writer.append_to_chunk(b"ab").unwrap();
        writer.append_to_chunk(b"").unwrap();
        writer.append_to_chunk(b"c").unwrap();
        assert_eq!(writer.end_chunk().unwrap(), 0);

        let mut file = ChunkFile::open(writer.finalize().unwrap()).unwrap();
        assert_eq!(file.chunk_count("TestData"), 1);
        assert_eq!(file.chunk_header_size("TestData", 0).unwrap(), 4);
        assert_eq!(file.chunk_data_size("TestData", 0).unwrap(), 3);
        assert_eq!(file.chunk_header("TestData", 0).unwrap(), [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(file.chunk_data("TestData", 0).unwrap(), b"abc");
    }

    #[test]
    fn compressed_chunk_stores_fewer_bytes() {
        let data = b"0123456789".repeat(100);

        let mut writer = ChunkFileWriter::create(MemoryStream::new()).unwrap();
        writer.begin_chunk("Big", b"h", Compression::Zstd, 3).unwrap();
        for piece in data.chunks(33) {
            writer.append_to_chunk(piece).unwrap();
        }
        writer.end_chunk().unwrap();

        let mut file = ChunkFile::open(writer.finalize().unwrap()).unwrap();
        let info = *file.chunk_info("Big", 0).unwrap();
        assert_eq!(info.uncompressed_chunk_size.get() as usize, data.len());
        assert!((info.chunk_data_size.get() as usize) < data.len());
        assert_eq!(file.chunk_data_size("Big", 0).unwrap() as usize, data.len());
        assert_eq!(file.chunk_data("Big", 0).unwrap(), data);
        assert_eq!(file.chunk_header("Big", 0).unwrap(), b"h");
    }

    #[test]
    fn indices_count_per_identifier() {
        let mut writer = ChunkFileWriter::create(MemoryStream::new()).unwrap();
        assert_eq!(writer.write_chunk("A", b"", b"d0", Compression::None, 1).unwrap(), 0);
        assert_eq!(writer.write_chunk("B", b"", b"e0", Compression::Zstd, 1).unwrap(), 0);
        assert_eq!(writer.write_chunk("A", b"", b"d1", Compression::Zstd, 1).unwrap(), 1);
        assert_eq!(writer.chunk_count("A"), 2);
        assert_eq!(writer.chunk_count("Z"), 0);
    }

    #[test]
    fn protocol_violations() {
        let mut writer = ChunkFileWriter::create(MemoryStream::new()).unwrap();

        assert_eq!(
            writer.append_to_chunk(b"x").unwrap_err().kind(),
            ErrorKind::Protocol
        );
        assert_eq!(writer.end_chunk().unwrap_err().kind(), ErrorKind::Protocol);

        writer.begin_chunk("A", b"", Compression::None, 1).unwrap();
        let err = writer
            .begin_chunk("B", b"", Compression::None, 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        assert_eq!(writer.finalize().unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn read_only_stream_is_rejected() {
        let err = ChunkFileWriter::create(ReadOnlyMemoryStream::new(vec![0u8; 64])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn append_continues_sequences() {
        let mut stream = MemoryStream::new();

        let mut writer = ChunkFileWriter::create(&mut stream).unwrap();
        writer.write_chunk("X", b"hx", b"x0", Compression::None, 1).unwrap();
        writer.write_chunk("X", b"", b"x1", Compression::Zstd, 1).unwrap();
        writer.finalize().unwrap();

        let mut writer = ChunkFileWriter::append(&mut stream).unwrap();
        assert_eq!(writer.chunk_count("X"), 2);
        assert_eq!(writer.write_chunk("Y", b"", b"y0", Compression::None, 1).unwrap(), 0);
        assert_eq!(writer.write_chunk("X", b"", b"x2", Compression::Zstd, 4).unwrap(), 2);
        writer.finalize().unwrap();

        let mut file = ChunkFile::open(&mut stream).unwrap();
        assert_eq!(file.chunk_count("X"), 3);
        assert_eq!(file.chunk_count("Y"), 1);
        assert_eq!(file.chunk_data("X", 0).unwrap(), b"x0");
        assert_eq!(file.chunk_header("X", 0).unwrap(), b"hx");
        assert_eq!(file.chunk_data("X", 1).unwrap(), b"x1");
        assert_eq!(file.chunk_data("X", 2).unwrap(), b"x2");
        assert_eq!(file.chunk_version("X", 2).unwrap(), 4);
        assert_eq!(file.chunk_data("Y", 0).unwrap(), b"y0");
    }

    #[test]
    fn append_keeps_legacy_identifier() {
        let mut stream = MemoryStream::new();

        let mut writer = ChunkFileWriter::create(&mut stream).unwrap();
        writer.write_chunk("Old", b"h", b"old-data", Compression::None, 1).unwrap();
        writer.finalize().unwrap();

        stream.seek(0).unwrap();
        stream.write_all(&Header::LEGACY_IDENTIFIER, "test").unwrap();

        let mut writer = ChunkFileWriter::append(&mut stream).unwrap();
        writer.write_chunk("New", b"", b"new-data", Compression::Zstd, 1).unwrap();
        writer.finalize().unwrap();

        assert_eq!(&stream.as_slice()[..8], b"RTA_DATA");

        let mut file = ChunkFile::open(&mut stream).unwrap();
        assert_eq!(file.header().identifier, Header::LEGACY_IDENTIFIER);
        assert_eq!(file.chunk_data("Old", 0).unwrap(), b"old-data");
        assert_eq!(file.chunk_header("Old", 0).unwrap(), b"h");
        assert_eq!(file.chunk_data("New", 0).unwrap(), b"new-data");
    }

    #[test]
    fn append_rejects_garbage() {
        let mut stream = MemoryStream::new();
        stream.write_all(&[0x55u8; 64], "test").unwrap();
        let err = ChunkFileWriter::append(&mut stream).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn custom_codec_is_used() {
        struct Identity;

        impl Codec for Identity {
            fn compress(&self, src: &[u8]) -> Result<Vec<u8>> {
                Ok(src.to_vec())
            }

            fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
                dst[..src.len()].copy_from_slice(src);
                Ok(src.len())
            }
        }

        let mut writer = ChunkFileWriter::create(MemoryStream::new())
            .unwrap()
            .with_codec(Box::new(Identity));
        writer.write_chunk("C", b"", b"plain", Compression::Zstd, 1).unwrap();
        let stream = writer.finalize().unwrap();

        let bytes = stream.as_slice();
        assert_eq!(&bytes[Header::SIZE..Header::SIZE + 5], b"plain");

        let mut file = ChunkFile::open(stream).unwrap().with_codec(Box::new(Identity));
        assert_eq!(file.chunk_data("C", 0).unwrap(), b"plain");
    }
}
