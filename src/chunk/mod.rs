//! On-disk records of a chunk file.
//!
//! Layout:
//! \[u8; 32\] of [Header] at offset 0.
//! Then chunk headers and payloads, written in creation order.
//! Then the index: [Header::index_size] / 64 [IndexEntry] records starting at
//! [Header::index_offset].

use core::fmt::{self, Debug, Display};

use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, LittleEndian, Unaligned, I64, U32,
};

mod compression;

pub use compression::{Codec, Compression, ZstdCodec};

/// Size in bytes of a [ChunkId].
pub const IDENTIFIER_SIZE: usize = 16;

/// 16-byte chunk identifier, NUL-padded.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(transparent)]
pub struct ChunkId([u8; IDENTIFIER_SIZE]);

impl ChunkId {
    /// Builds an identifier from raw bytes. Input stops at the first NUL and
    /// is truncated to [IDENTIFIER_SIZE] bytes.
    pub fn new(id: impl AsRef<[u8]>) -> Self {
        let id = id.as_ref();
        let len = id
            .iter()
            .take(IDENTIFIER_SIZE)
            .position(|&b| b == 0)
            .unwrap_or(id.len().min(IDENTIFIER_SIZE));

        let mut raw = [0u8; IDENTIFIER_SIZE];
        raw[..len].copy_from_slice(&id[..len]);
        Self(raw)
    }

    pub const fn from_raw(raw: [u8; IDENTIFIER_SIZE]) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> &[u8; IDENTIFIER_SIZE] {
        &self.0
    }

    /// The identifier without its NUL padding.
    pub fn trimmed(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(IDENTIFIER_SIZE);
        &self.0[..len]
    }
}

impl From<&str> for ChunkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<&String> for ChunkId {
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

impl From<&ChunkId> for ChunkId {
    fn from(id: &ChunkId) -> Self {
        *id
    }
}

impl Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.trimmed()))
    }
}

impl Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({:?})", String::from_utf8_lossy(self.trimmed()))
    }
}

/// Fixed 32-byte file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct Header {
    pub identifier: [u8; 8],
    pub version: U32<LittleEndian>,
    pub reserved: U32<LittleEndian>,
    pub index_offset: I64<LittleEndian>,
    pub index_size: I64<LittleEndian>,
}

impl Header {
    pub const SIZE: usize = 32;
    pub const IDENTIFIER: [u8; 8] = *b"AMD_RDF ";
    pub const LEGACY_IDENTIFIER: [u8; 8] = *b"RTA_DATA";
    pub const VERSION: u32 = 3;

    /// Header for a fresh file; the index fields are filled in on finalize.
    pub fn new() -> Self {
        Self {
            identifier: Self::IDENTIFIER,
            version: U32::new(Self::VERSION),
            reserved: U32::new(0),
            index_offset: I64::new(0),
            index_size: I64::new(0),
        }
    }

    /// Checks magic and version, returning a description of the first mismatch.
    pub fn validate(&self) -> Result<(), String> {
        if self.identifier != Self::IDENTIFIER && self.identifier != Self::LEGACY_IDENTIFIER {
            return Err(format!(
                "invalid file header {:?}",
                String::from_utf8_lossy(&self.identifier)
            ));
        }

        if self.version.get() != Self::VERSION {
            return Err(format!("unsupported file version {}", self.version.get()));
        }

        if self.index_offset.get() < 0 || self.index_size.get() < 0 {
            return Err(format!(
                "negative index location {}+{}",
                self.index_offset.get(),
                self.index_size.get()
            ));
        }

        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.index_size.get() as usize / IndexEntry::SIZE
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed 64-byte index record describing one chunk.
#[derive(Debug, Clone, Copy, FromZeros, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct IndexEntry {
    pub chunk_identifier: ChunkId,
    pub compression: Compression,
    pub reserved: [u8; 3],
    pub version: U32<LittleEndian>,
    pub chunk_header_offset: I64<LittleEndian>,
    pub chunk_header_size: I64<LittleEndian>,
    pub chunk_data_offset: I64<LittleEndian>,
    /// Size as stored, i.e. compressed size for compressed chunks.
    pub chunk_data_size: I64<LittleEndian>,
    pub uncompressed_chunk_size: I64<LittleEndian>,
}

impl IndexEntry {
    pub const SIZE: usize = 64;

    pub fn new(id: ChunkId, compression: Compression, version: u32) -> Self {
        let mut entry = Self::new_zeroed();
        entry.chunk_identifier = id;
        entry.compression = compression;
        entry.version = U32::new(version.max(1));
        entry
    }

    /// Logical payload size, after decompression.
    pub fn data_size(&self) -> u64 {
        match self.compression {
            Compression::None => self.chunk_data_size.get() as u64,
            Compression::Zstd => self.uncompressed_chunk_size.get() as u64,
        }
    }

    /// Checks that header and payload lie within a stream of `stream_size`
    /// bytes, returning a description of the first bad field.
    pub fn validate(&self, stream_size: u64) -> Result<(), String> {
        let spans = [
            (
                "chunk header",
                self.chunk_header_offset.get(),
                self.chunk_header_size.get(),
            ),
            (
                "chunk data",
                self.chunk_data_offset.get(),
                self.chunk_data_size.get(),
            ),
        ];

        for (what, offset, size) in spans {
            if offset < 0 || size < 0 {
                return Err(format!("{what} has negative location {offset}+{size}"));
            }
            match offset.checked_add(size) {
                Some(end) if end as u64 <= stream_size => {}
                _ => {
                    return Err(format!(
                        "{what} {offset}+{size} runs past end of {stream_size}-byte stream"
                    ))
                }
            }
        }

        if self.compression == Compression::Zstd && self.uncompressed_chunk_size.get() < 0 {
            return Err(format!(
                "negative uncompressed size {}",
                self.uncompressed_chunk_size.get()
            ));
        }

        Ok(())
    }
}

const _: () = assert!(core::mem::size_of::<Header>() == Header::SIZE);
const _: () = assert!(core::mem::size_of::<IndexEntry>() == IndexEntry::SIZE);
const _: () = assert!(core::mem::size_of::<ChunkId>() == IDENTIFIER_SIZE);

#[cfg(test)]
mod tests {
    use zerocopy::TryFromBytes;

    use super::*;

    #[test]
    fn chunk_id_padding_and_truncation() {
        let id = ChunkId::from("TestData");
        assert_eq!(&id.as_raw()[..8], b"TestData");
        assert!(id.as_raw()[8..].iter().all(|&b| b == 0));
        assert_eq!(id.to_string(), "TestData");

        let long = ChunkId::from("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(long.as_raw(), b"ABCDEFGHIJKLMNOP");

        assert_eq!(ChunkId::new(b"ab\0cd"), ChunkId::from("ab"));
    }

    #[test]
    fn chunk_id_ordering_is_bytewise() {
        assert!(ChunkId::from("A") < ChunkId::from("B"));
        assert!(ChunkId::from("A") < ChunkId::from("AA"));
        assert_ne!(ChunkId::from("a"), ChunkId::from("A"));
    }

    #[test]
    fn header_layout() {
        let mut header = Header::new();
        header.index_offset = I64::new(0x1122);
        header.index_size = I64::new(128);

        let bytes = header.as_bytes();
        assert_eq!(&bytes[..8], b"AMD_RDF ");
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..24], &0x1122i64.to_le_bytes());
        assert_eq!(&bytes[24..32], &128i64.to_le_bytes());
        assert_eq!(header.entry_count(), 2);
    }

    #[test]
    fn header_validation() {
        let mut header = Header::new();
        assert!(header.validate().is_ok());

        header.identifier = Header::LEGACY_IDENTIFIER;
        assert!(header.validate().is_ok());

        header.identifier = *b"NOT_RDF!";
        assert!(header.validate().unwrap_err().contains("invalid file header"));

        header.identifier = Header::IDENTIFIER;
        header.version = U32::new(2);
        assert!(header.validate().unwrap_err().contains("version"));
    }

    #[test]
    fn index_entry_layout() {
        let mut entry = IndexEntry::new("Chunk".into(), Compression::Zstd, 0);
        entry.chunk_header_offset = I64::new(32);
        entry.chunk_data_size = I64::new(10);
        entry.uncompressed_chunk_size = I64::new(99);

        assert_eq!(entry.version.get(), 1);
        assert_eq!(entry.data_size(), 99);

        let bytes = entry.as_bytes();
        assert_eq!(&bytes[..5], b"Chunk");
        assert_eq!(bytes[16], 1);
        assert_eq!(&bytes[20..24], &1u32.to_le_bytes());
        assert_eq!(&bytes[24..32], &32i64.to_le_bytes());

        let parsed = IndexEntry::try_read_from_bytes(bytes).unwrap();
        assert_eq!(parsed.chunk_identifier, entry.chunk_identifier);

        let mut bad = bytes.to_vec();
        bad[16] = 7;
        assert!(IndexEntry::try_read_from_bytes(&bad[..]).is_err());
    }

    #[test]
    fn index_entry_bounds() {
        let mut entry = IndexEntry::new("Chunk".into(), Compression::Zstd, 1);
        entry.chunk_header_offset = I64::new(32);
        entry.chunk_header_size = I64::new(4);
        entry.chunk_data_offset = I64::new(36);
        entry.chunk_data_size = I64::new(10);
        entry.uncompressed_chunk_size = I64::new(50);
        assert!(entry.validate(46).is_ok());
        assert!(entry.validate(45).unwrap_err().contains("past end"));

        let mut negative = entry;
        negative.chunk_header_size = I64::new(-1);
        assert!(negative.validate(46).unwrap_err().contains("negative"));

        let mut overflow = entry;
        overflow.chunk_data_offset = I64::new(i64::MAX);
        assert!(overflow.validate(u64::MAX).is_err());

        let mut unpacked = entry;
        unpacked.uncompressed_chunk_size = I64::new(-5);
        assert!(unpacked.validate(46).is_err());
        unpacked.compression = Compression::None;
        assert!(unpacked.validate(46).is_ok());
    }
}
