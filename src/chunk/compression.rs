use core::fmt::{self, Display};

use clap::ValueEnum;
use tap::Pipe;
use zerocopy::{FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Compression tag stored in each index entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    ValueEnum,
    FromZeros,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(u8)]
#[non_exhaustive]
pub enum Compression {
    Zstd = 1,
    None = 0,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => f.write_str("none"),
            Compression::Zstd => f.write_str("zstd"),
        }
    }
}

/// Whole-buffer codec used for [Compression::Zstd] chunks.
///
/// Chunks are compressed as a single block, so both directions work on
/// complete buffers. `decompress` must fill `dst` from the start and return
/// the number of bytes produced.
pub trait Codec: Send + Sync {
    fn compress(&self, src: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// `0` selects the library default level.
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Codec for ZstdCodec {
    fn compress(&self, src: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(src, self.level)
            .map_err(|e| Error::io("zstd compression failed", e))?
            .pipe(Ok)
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        zstd::bulk::decompress_to_buffer(src, dst)
            .map_err(|e| Error::io("zstd decompression failed", e))?
            .pipe(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_round_trip() {
        let codec = ZstdCodec::default();
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(20);
        let packed = codec.compress(&data).unwrap();
        assert!(packed.len() < data.len());

        let mut out = vec![0u8; data.len()];
        assert_eq!(codec.decompress(&packed, &mut out).unwrap(), data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn zstd_rejects_small_buffer() {
        let codec = ZstdCodec::new(0);
        let packed = codec.compress(&[7u8; 100]).unwrap();
        let mut out = vec![0u8; 10];
        assert_eq!(
            codec.decompress(&packed, &mut out).unwrap_err().kind(),
            crate::ErrorKind::Io
        );
    }

    #[test]
    fn tag_values() {
        assert_eq!(Compression::None.as_bytes(), &[0]);
        assert_eq!(Compression::Zstd.as_bytes(), &[1]);
        assert_eq!(Compression::Zstd.to_string(), "zstd");
    }
}
