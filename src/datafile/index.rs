//! The index table maps data entry ids to record offsets in the data file.
//!
//! On disk it is a `u64` entry count followed by `count` pairs of `(u32 id, u64 offset)`,
//! in native byte order and ascending id order.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::*;

use super::BLOCK_HEADER_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexTable {
    entries: BTreeMap<u32, u64>,
}

impl IndexTable {
    /// Creates a new and empty `IndexTable`.
    pub fn new() -> Self {
        IndexTable {
            entries: BTreeMap::new(),
        }
    }

    /// Reads a whole table.
    pub fn read_from<R: Read>(mut file: R) -> Result<Self> {
        let count = file.read_u64::<NativeEndian>()?;

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let id = file.read_u32::<NativeEndian>()?;
            let offset = file.read_u64::<NativeEndian>()?;
            if entries.insert(id, offset).is_some() {
                return Err(Error::Malformed(format!(
                    "Data entry {:08X} is indexed twice.",
                    id
                )));
            }
        }

        Ok(IndexTable { entries })
    }

    /// Writes the whole table.
    pub fn write_to<W: Write>(&self, mut file: W) -> Result<()> {
        file.write_u64::<NativeEndian>(self.entries.len() as u64)?;
        for (&id, &offset) in &self.entries {
            file.write_u32::<NativeEndian>(id)?;
            file.write_u64::<NativeEndian>(offset)?;
        }

        file.flush()?;
        Ok(())
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<u64> {
        self.entries.get(&id).cloned()
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    #[inline]
    pub fn insert(&mut self, id: u32, offset: u64) -> Option<u64> {
        self.entries.insert(id, offset)
    }

    #[inline]
    pub fn remove(&mut self, id: u32) -> Option<u64> {
        self.entries.remove(&id)
    }

    /// Start offset of the first record placed after `offset`.
    pub fn next_offset(&self, offset: u64) -> Option<u64> {
        self.entries.values().cloned().filter(|&v| v > offset).min()
    }

    /// Fails if two records share bytes, or if a record header does not fit in a data
    /// file of `file_size` bytes.
    pub fn check_layout(&self, file_size: u64) -> Result<()> {
        let entries = self.by_offset();

        for (i, &(id, offset)) in entries.iter().enumerate() {
            let limit = entries.get(i + 1).map_or(file_size, |&(_, next)| next);
            let fits = offset
                .checked_add(BLOCK_HEADER_SIZE)
                .map_or(false, |end| end <= limit);

            if !fits {
                return Err(Error::Malformed(format!(
                    "Data entry {:08X} at {} overlaps the next record or the end of the data file.",
                    id, offset
                )));
            }
        }

        Ok(())
    }

    /// Entries ordered by their position in the data file.
    pub fn by_offset(&self) -> Vec<(u32, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|&(_, offset)| offset);
        entries
    }

    #[inline]
    pub fn iter(&self) -> Iter {
        Iter {
            iter: self.entries.iter(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// An iterator visiting `(id, offset)` pairs in ascending id order.
pub struct Iter<'a> {
    iter: btree_map::Iter<'a, u32, u64>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u32, u64);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(&id, &offset)| (id, offset))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn layout() {
        let mut table = IndexTable::new();
        table.insert(7, 64);
        table.insert(3, 0);

        let mut buf = Vec::new();
        table.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 2 * (4 + 8));

        // Ascending ids on disk.
        assert_eq!(&buf[8..12], &3u32.to_ne_bytes()[..]);
        assert_eq!(&buf[20..24], &7u32.to_ne_bytes()[..]);

        let other = IndexTable::read_from(Cursor::new(&buf)).unwrap();
        assert_eq!(table, other);
    }

    #[test]
    fn neighbours() {
        let mut table = IndexTable::new();
        table.insert(1, 0);
        table.insert(2, 100);
        table.insert(3, 40);

        assert_eq!(table.next_offset(0), Some(40));
        assert_eq!(table.next_offset(40), Some(100));
        assert_eq!(table.next_offset(100), None);
        assert_eq!(table.by_offset(), vec![(1, 0), (3, 40), (2, 100)]);
    }

    #[test]
    fn overlaps() {
        let mut table = IndexTable::new();
        table.insert(1, 0);
        table.insert(2, 8);
        assert!(table.check_layout(16).is_ok());
        assert!(table.check_layout(15).is_err());

        table.insert(2, 4);
        assert!(table.check_layout(16).is_err());

        table.insert(2, 0);
        assert!(table.check_layout(16).is_err());

        table.insert(2, u64::max_value());
        assert!(table.check_layout(u64::max_value()).is_err());
    }

    #[test]
    fn truncated() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u64.to_ne_bytes());
        buf.extend_from_slice(&1u32.to_ne_bytes());
        buf.extend_from_slice(&0u64.to_ne_bytes());
        assert!(IndexTable::read_from(Cursor::new(&buf)).is_err());
    }
}
