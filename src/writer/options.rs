#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriterMode {
    /// Write a fresh file from offset 0.
    #[default]
    Create,
    /// Extend an existing file; needs a readable and writable stream.
    Append,
}

/// Settings for [super::ChunkFileWriter::with_options].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    pub mode: WriterMode,
    /// zstd level for compressed chunks; 0 picks the library default.
    pub compression_level: i32,
}

impl WriterOptions {
    pub fn append() -> Self {
        Self {
            mode: WriterMode::Append,
            ..Self::default()
        }
    }

    pub fn mode(mut self, mode: WriterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            mode: WriterMode::Create,
            compression_level: 0,
        }
    }
}
