//! Read access to a finalized chunk file.

use std::{collections::BTreeMap, ops::Range, path::Path};

use tracing::debug;
use zerocopy::{FromZeros, IntoBytes, TryFromBytes};

use crate::{
    chunk::{ChunkId, Codec, Compression, Header, IndexEntry, ZstdCodec},
    error::{Error, Result},
    stream::{FileStream, Stream, StreamExt},
};

mod iterator;

pub use iterator::ChunkFileIterator;

/// Parsed chunk file. The index is read once on open; chunk bytes are read
/// on demand, which repositions the stream.
pub struct ChunkFile<S> {
    stream: S,
    header: Header,
    /// Stable-sorted by identifier, so same-id entries keep creation order.
    index: Vec<IndexEntry>,
    ranges: BTreeMap<ChunkId, Range<usize>>,
    codec: Box<dyn Codec>,
}

impl ChunkFile<FileStream> {
    /// Opens a chunk file on disk for reading.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(FileStream::open_read(path)?)
    }
}

impl<S: Stream> ChunkFile<S> {
    /// Parses header and index from `stream`. Pass `&mut stream` to keep
    /// ownership with the caller.
    pub fn open(mut stream: S) -> Result<Self> {
        let header = read_header(&mut stream)?;
        let mut index = read_index(&mut stream, &header)?;

        index.sort_by(|a, b| a.chunk_identifier.cmp(&b.chunk_identifier));
        let ranges = build_ranges(&index);

        debug!(
            entries = index.len(),
            ids = ranges.len(),
            index_offset = header.index_offset.get(),
            "opened chunk file"
        );

        Ok(Self {
            stream,
            header,
            index,
            ranges,
            codec: Box::new(ZstdCodec::default()),
        })
    }

    /// Replaces the codec used to expand compressed chunks.
    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn contains_chunk(&self, id: impl Into<ChunkId>, index: usize) -> bool {
        self.ranges
            .get(&id.into())
            .is_some_and(|range| index < range.len())
    }

    pub fn chunk_count(&self, id: impl Into<ChunkId>) -> usize {
        self.ranges.get(&id.into()).map_or(0, |range| range.len())
    }

    /// Raw index entry for the `index`-th chunk named `id`.
    pub fn chunk_info(&self, id: impl Into<ChunkId>, index: usize) -> Result<&IndexEntry> {
        let id = id.into();
        self.ranges
            .get(&id)
            .filter(|range| index < range.len())
            .map(|range| &self.index[range.start + index])
            .ok_or_else(|| Error::ChunkNotFound {
                id: id.to_string(),
                index,
            })
    }

    pub fn chunk_version(&self, id: impl Into<ChunkId>, index: usize) -> Result<u32> {
        Ok(self.chunk_info(id, index)?.version.get())
    }

    pub fn chunk_header_size(&self, id: impl Into<ChunkId>, index: usize) -> Result<u64> {
        Ok(self.chunk_info(id, index)?.chunk_header_size.get() as u64)
    }

    /// Logical (uncompressed) payload size.
    pub fn chunk_data_size(&self, id: impl Into<ChunkId>, index: usize) -> Result<u64> {
        Ok(self.chunk_info(id, index)?.data_size())
    }

    /// Reads the chunk header into the front of `buf`, which must hold at
    /// least [Self::chunk_header_size] bytes.
    pub fn read_chunk_header(
        &mut self,
        id: impl Into<ChunkId>,
        index: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        let entry = *self.chunk_info(id, index)?;
        let size = entry.chunk_header_size.get() as usize;
        let buf = sized_prefix(buf, size, "chunk header")?;

        self.stream.seek(entry.chunk_header_offset.get() as u64)?;
        self.stream.read_exact(buf, "chunk header")
    }

    /// Reads the chunk payload into the front of `buf`, decompressing if
    /// needed. `buf` must hold at least [Self::chunk_data_size] bytes.
    pub fn read_chunk_data(
        &mut self,
        id: impl Into<ChunkId>,
        index: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        let entry = *self.chunk_info(id, index)?;
        let buf = sized_prefix(buf, entry.data_size() as usize, "chunk data")?;

        self.stream.seek(entry.chunk_data_offset.get() as u64)?;

        match entry.compression {
            Compression::None => self.stream.read_exact(buf, "chunk data"),
            Compression::Zstd => {
                let mut packed = zeroed(entry.chunk_data_size.get() as u64)?;
                self.stream.read_exact(&mut packed, "compressed chunk data")?;

                let produced = self.codec.decompress(&packed, buf)?;
                if produced != buf.len() {
                    return Err(Error::unexpected_eof(
                        "decompressed chunk data",
                        buf.len() as u64,
                        produced as u64,
                    ));
                }
                Ok(())
            }
        }
    }

    /// Reads the whole chunk header into a new buffer.
    pub fn chunk_header(&mut self, id: impl Into<ChunkId>, index: usize) -> Result<Vec<u8>> {
        let id = id.into();
        let mut buf = zeroed(self.chunk_header_size(id, index)?)?;
        self.read_chunk_header(id, index, &mut buf)?;
        Ok(buf)
    }

    /// Reads the whole (decompressed) chunk payload into a new buffer.
    pub fn chunk_data(&mut self, id: impl Into<ChunkId>, index: usize) -> Result<Vec<u8>> {
        let id = id.into();
        let mut buf = zeroed(self.chunk_data_size(id, index)?)?;
        self.read_chunk_data(id, index, &mut buf)?;
        Ok(buf)
    }

    /// Distinct chunk identifiers, in identifier order.
    pub fn chunk_ids(&self) -> impl Iterator<Item = &ChunkId> + '_ {
        self.ranges.keys()
    }

    pub fn iter(&self) -> ChunkFileIterator<'_> {
        ChunkFileIterator::new(&self.ranges)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> std::fmt::Debug for ChunkFile<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkFile")
            .field("header", &self.header)
            .field("entries", &self.index.len())
            .field("ranges", &self.ranges)
            .finish_non_exhaustive()
    }
}

/// Seeks to the start and reads a validated header.
pub(crate) fn read_header(stream: &mut impl Stream) -> Result<Header> {
    stream.seek(0)?;

    let mut header = Header::new_zeroed();
    stream.read_exact(header.as_mut_bytes(), "file header")?;
    header.validate().map_err(Error::format)?;

    Ok(header)
}

/// Reads the index entries in file order.
pub(crate) fn read_index(stream: &mut impl Stream, header: &Header) -> Result<Vec<IndexEntry>> {
    let offset = header.index_offset.get() as u64;
    let len = (header.entry_count() * IndexEntry::SIZE) as u64;
    let size = stream.size()?;
    if offset > size {
        return Err(Error::format(format!(
            "index offset {offset} is past end of {size}-byte stream"
        )));
    }

    let available = size - offset;
    if available < len {
        return Err(Error::unexpected_eof("chunk index", len, available));
    }

    let mut raw = vec![0u8; len as usize];
    stream.seek(offset)?;
    stream.read_exact(&mut raw, "chunk index")?;

    raw.chunks_exact(IndexEntry::SIZE)
        .enumerate()
        .map(|(i, record)| {
            let entry = IndexEntry::try_read_from_bytes(record)
                .map_err(|_| Error::format(format!("malformed index entry {i}")))?;
            entry
                .validate(size)
                .map_err(|e| Error::format(format!("index entry {i}: {e}")))?;
            Ok(entry)
        })
        .collect()
}

/// Groups runs of equal identifiers in a sorted index into half-open ranges.
fn build_ranges(index: &[IndexEntry]) -> BTreeMap<ChunkId, Range<usize>> {
    let mut ranges = BTreeMap::new();
    let mut start = 0;

    for current in 1..=index.len() {
        let run_ends = current == index.len()
            || index[current].chunk_identifier != index[start].chunk_identifier;
        if run_ends {
            ranges.insert(index[start].chunk_identifier, start..current);
            start = current;
        }
    }

    ranges
}

/// Zero-filled buffer of `size` bytes; fails instead of aborting when the
/// allocation cannot be made.
fn zeroed(size: u64) -> Result<Vec<u8>> {
    let too_large = || Error::invalid_argument(format!("cannot allocate {size}-byte buffer"));
    let len = usize::try_from(size).map_err(|_| too_large())?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| too_large())?;
    buf.resize(len, 0);
    Ok(buf)
}

fn sized_prefix<'a>(buf: &'a mut [u8], size: usize, what: &str) -> Result<&'a mut [u8]> {
    let len = buf.len();
    buf.get_mut(..size).ok_or_else(|| {
        Error::invalid_argument(format!("{what} needs {size} bytes, buffer holds {len}"))
    })
}
