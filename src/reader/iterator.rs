use std::{
    collections::{btree_map, BTreeMap},
    ops::Range,
};

use crate::chunk::ChunkId;

/// Cursor over every (identifier, index) pair of a [super::ChunkFile].
///
/// Identifiers come in byte order; for each one, indices run `0..count`.
#[derive(Debug, Clone)]
pub struct ChunkFileIterator<'a> {
    rest: btree_map::Iter<'a, ChunkId, Range<usize>>,
    current: Option<(&'a ChunkId, &'a Range<usize>)>,
    index: usize,
}

impl<'a> ChunkFileIterator<'a> {
    pub(super) fn new(ranges: &'a BTreeMap<ChunkId, Range<usize>>) -> Self {
        let mut rest = ranges.iter();
        let current = rest.next();
        Self {
            rest,
            current,
            index: 0,
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.current.is_none()
    }

    /// Moves to the next pair; does nothing at the end.
    pub fn advance(&mut self) {
        let Some((_, range)) = self.current else {
            return;
        };

        self.index += 1;
        if self.index >= range.len() {
            self.current = self.rest.next();
            self.index = 0;
        }
    }

    /// `None` at the end.
    pub fn chunk_identifier(&self) -> Option<ChunkId> {
        self.current.map(|(id, _)| *id)
    }

    /// `None` at the end.
    pub fn chunk_index(&self) -> Option<usize> {
        self.current.map(|_| self.index)
    }
}

impl Iterator for ChunkFileIterator<'_> {
    type Item = (ChunkId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let item = (self.chunk_identifier()?, self.index);
        self.advance();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ChunkFile, ChunkFileWriter, ChunkId, Compression, MemoryStream};

    fn file_with(ids: &[&str]) -> ChunkFile<MemoryStream> {
        let mut writer = ChunkFileWriter::create(MemoryStream::new()).unwrap();
        for id in ids {
            writer
                .write_chunk(*id, b"", id.as_bytes(), Compression::None, 1)
                .unwrap();
        }
        ChunkFile::open(writer.finalize().unwrap()).unwrap()
    }

    #[test]
    fn cursor_walks_every_pair_once() {
        let file = file_with(&["B", "A", "B", "C", "B"]);
        let mut it = file.iter();
        let mut seen = vec![];

        while !it.is_at_end() {
            seen.push((it.chunk_identifier().unwrap(), it.chunk_index().unwrap()));
            it.advance();
        }

        let expected: Vec<(ChunkId, usize)> = vec![
            ("A".into(), 0),
            ("B".into(), 0),
            ("B".into(), 1),
            ("B".into(), 2),
            ("C".into(), 0),
        ];
        assert_eq!(seen, expected);

        it.advance();
        assert!(it.is_at_end());
        assert_eq!(it.chunk_identifier(), None);
        assert_eq!(it.chunk_index(), None);
    }

    #[test]
    fn iterator_matches_lookup_api() {
        let file = file_with(&["X", "Y", "X"]);
        let pairs: Vec<_> = file.iter().collect();
        assert_eq!(pairs.len(), 3);
        for (id, index) in pairs {
            assert!(file.contains_chunk(id, index));
        }
    }

    #[test]
    fn queries_do_not_move_the_cursor() {
        let file = file_with(&["Q", "Q"]);
        let mut it = file.iter();
        it.advance();

        let snapshot = &it;
        assert_eq!(snapshot.chunk_identifier(), Some(ChunkId::from("Q")));
        assert_eq!(snapshot.chunk_index(), Some(1));
        assert_eq!(snapshot.chunk_index(), Some(1));
        assert!(!snapshot.is_at_end());
        assert_eq!(it.next(), Some((ChunkId::from("Q"), 1)));
        assert!(it.is_at_end());
    }

    #[test]
    fn empty_file() {
        let file = file_with(&[]);
        assert_eq!(file.iter().next(), None);
    }
}
