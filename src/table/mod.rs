// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod iter;

/// Decoding of tables from byte buffers
pub mod reader;

use crate::{
    coding::{encode_len, Decode, DecodeError, Encode, EncodeError},
    hash::{bucket_position, hash64, slot_position},
    Slice,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use reader::{Array, NativeStrategy, SliceReader, Strategy};
use std::io::{Read, Write};

pub use iter::{Iter, Keys, Values};

/// Marks a bucket that never received any keys
pub const SENTINEL: u16 = u16::MAX;

/// Maximum length of the seed vector, so every seed index stays below [`SENTINEL`]
pub const MAX_SEEDS: usize = SENTINEL as usize;

/// Byte range inside a table's buffer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Region {
    /// Appends `bytes` to `buffer`, returning where they landed.
    pub(crate) fn append(buffer: &mut Vec<u8>, bytes: &[u8]) -> Self {
        let start = buffer.len();
        buffer.extend_from_slice(bytes);

        Self {
            start,
            end: buffer.len(),
        }
    }

    /// Length of the range in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn slice<'b>(&self, buffer: &'b [u8]) -> &'b [u8] {
        buffer.get(self.start..self.end).unwrap_or_default()
    }
}

/// Key and value location of one table slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Entry {
    pub key: Region,
    pub value: Region,
}

/// Backing storage of keys and values
#[derive(Clone)]
enum Buffer<'a> {
    Owned(Slice),
    Borrowed(&'a [u8]),
}

impl std::ops::Deref for Buffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Owned(slice) => slice,
            Self::Borrowed(bytes) => bytes,
        }
    }
}

/// An immutable minimal perfect hash table
///
/// Every lookup costs two hash computations and one key comparison,
/// regardless of the number of entries.
///
/// A table either owns its data (`Table<'static>`, e.g. after building or reading from a stream)
/// or borrows it from a caller-provided buffer, such as a memory-mapped file.
/// A borrowed table cannot outlive that buffer.
///
/// ```
/// use chd_table::{Builder, Table, coding::Encode};
///
/// let mut builder = Builder::new();
/// builder.add("one", "1");
/// builder.add("two", "2");
///
/// let table = builder.build()?;
/// assert_eq!(Some(&b"1"[..]), table.get(b"one"));
/// assert_eq!(None, table.get(b"three"));
///
/// let bytes = table.encode_into_vec()?;
/// let view = Table::from_slice(&bytes)?;
/// assert_eq!(Some(&b"2"[..]), view.get(b"two"));
/// # Ok::<(), chd_table::Error>(())
/// ```
#[derive(Clone)]
pub struct Table<'a> {
    /// Salt followed by displacement seeds
    seeds: Array<'a, u64>,

    /// Seed index per bucket
    indices: Array<'a, u16>,

    buffer: Buffer<'a>,

    /// Key/value locations, in slot order
    entries: Vec<Entry>,
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.len())
            .field("seeds", &self.seed_count())
            .field("buckets", &self.bucket_count())
            .field("borrowed", &self.is_borrowed())
            .finish()
    }
}

impl Table<'static> {
    pub(crate) fn from_parts(
        seeds: Vec<u64>,
        indices: Vec<u16>,
        buffer: Slice,
        entries: Vec<Entry>,
    ) -> Self {
        Self {
            seeds: seeds.into(),
            indices: indices.into(),
            buffer: Buffer::Owned(buffer),
            entries,
        }
    }
}

impl<'a> Table<'a> {
    /// Reads a table from a byte buffer, without copying keys and values.
    ///
    /// Seed and index arrays are viewed in place on little-endian hosts and
    /// decoded on big-endian hosts.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the buffer is truncated or malformed.
    pub fn from_slice(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        Self::from_slice_with::<NativeStrategy>(bytes)
    }

    /// Reads a table from a byte buffer, using the given strategy for the seed and index arrays.
    ///
    /// Keys and values always stay in `bytes`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the buffer is truncated or malformed.
    pub fn from_slice_with<S: Strategy>(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let mut reader = SliceReader::<S>::new(bytes);

        let seed_count = reader.read_u32()?;
        check_seed_count(seed_count)?;
        let seeds = reader.read_array::<u64>(seed_count as usize)?;

        let indices_count = reader.read_len()?;
        let indices = reader.read_array::<u16>(indices_count)?;

        let entry_count = reader.read_len()?;
        let mut entries = Vec::new();

        for _ in 0..entry_count {
            let key_len = reader.read_len()?;
            let value_len = reader.read_len()?;
            let key = reader.region(key_len)?;
            let value = reader.region(value_len)?;
            entries.push(Entry { key, value });
        }

        log::trace!(
            "Read table with {entry_count} entries, {seed_count} seeds and {indices_count} buckets ({} bytes)",
            reader.position(),
        );

        let table = Self {
            seeds,
            indices,
            buffer: Buffer::Borrowed(bytes),
            entries,
        };
        table.check_indices()?;

        Ok(table)
    }

    /// Copies borrowed data, detaching the table from its source buffer.
    #[must_use]
    pub fn into_owned(self) -> Table<'static> {
        Table {
            seeds: self.seeds.into_owned(),
            indices: self.indices.into_owned(),
            buffer: match self.buffer {
                Buffer::Owned(slice) => Buffer::Owned(slice),
                Buffer::Borrowed(bytes) => Buffer::Owned(Slice::from(bytes)),
            },
            entries: self.entries,
        }
    }

    /// Returns `true` if keys and values live in a caller-provided buffer.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.buffer, Buffer::Borrowed(_))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of seeds, including the salt.
    #[must_use]
    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.indices.len()
    }

    /// Iterates over the seed vector, starting with the salt.
    #[doc(hidden)]
    pub fn seeds(&self) -> impl Iterator<Item = u64> + '_ {
        self.seeds.iter()
    }

    /// Iterates over the seed index of every bucket.
    #[doc(hidden)]
    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.indices.iter()
    }

    /// Computes the slot a key would live in, if its bucket is populated.
    fn slot_of(&self, key: &[u8]) -> Option<usize> {
        if self.entries.is_empty() || self.indices.is_empty() {
            return None;
        }

        let salted = hash64(key) ^ self.seeds.get(0)?;

        // NOTE: Bucket and slot positions are reduced modulo a usize length
        #[allow(clippy::cast_possible_truncation)]
        let bucket = bucket_position(salted, self.indices.len() as u64) as usize;

        let seed_idx = self.indices.get(bucket)?;
        if seed_idx == SENTINEL {
            return None;
        }
        let seed = self.seeds.get(usize::from(seed_idx))?;

        #[allow(clippy::cast_possible_truncation)]
        let slot = slot_position(salted, seed, self.entries.len() as u64) as usize;

        Some(slot)
    }

    /// Returns the value of the given key.
    ///
    /// Lookups of absent keys cost the same as lookups of present keys:
    /// the stored key is always compared in full.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let slot = self.slot_of(key)?;
        let entry = self.entries.get(slot)?;

        if entry.key.slice(&self.buffer) == key {
            Some(entry.value.slice(&self.buffer))
        } else {
            None
        }
    }

    /// Returns `true` if the table contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over all entries, in slot order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.buffer, &self.entries)
    }

    /// Iterates over all keys, in slot order.
    #[must_use]
    pub fn keys(&self) -> Keys<'_> {
        Keys(self.iter())
    }

    /// Iterates over all values, in slot order.
    #[must_use]
    pub fn values(&self) -> Values<'_> {
        Values(self.iter())
    }

    fn check_indices(&self) -> Result<(), DecodeError> {
        if self.entries.is_empty() {
            // NOTE: Lookups short-circuit on empty tables, but the indices
            // still need to be sane for `verify` and re-encoding
            if self.seeds.is_empty() && self.indices.iter().any(|idx| idx != SENTINEL) {
                return Err(DecodeError::MissingSalt);
            }
        } else {
            if self.seeds.is_empty() {
                return Err(DecodeError::MissingSalt);
            }
            if self.indices.is_empty() {
                return Err(DecodeError::EmptyIndex);
            }
        }

        let seed_count = self.seeds.len();

        for (bucket, index) in self.indices.iter().enumerate() {
            if index != SENTINEL && usize::from(index) >= seed_count {
                return Err(DecodeError::InvalidSeedIndex {
                    bucket,
                    index,
                    seed_count,
                });
            }
        }

        Ok(())
    }

    /// Checks that every stored key hashes to the slot it is stored in.
    ///
    /// This walks the entire table, so it is meant for auditing untrusted
    /// files, not for every open.
    ///
    /// # Errors
    ///
    /// Will return `Err` on the first inconsistent slot.
    pub fn verify(&self) -> Result<(), DecodeError> {
        self.check_indices()?;

        for (slot, (key, _)) in self.iter().enumerate() {
            if self.slot_of(key) != Some(slot) {
                return Err(DecodeError::Inconsistent { slot });
            }
        }

        Ok(())
    }
}

impl<'t> IntoIterator for &'t Table<'_> {
    type Item = (&'t [u8], &'t [u8]);
    type IntoIter = Iter<'t>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn check_seed_count(seed_count: u32) -> Result<(), DecodeError> {
    if seed_count as usize > MAX_SEEDS {
        return Err(DecodeError::TooManySeeds(seed_count));
    }
    Ok(())
}

impl Encode for Table<'_> {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32::<LittleEndian>(encode_len("seed vector", self.seeds.len())?)?;
        for seed in self.seeds.iter() {
            writer.write_u64::<LittleEndian>(seed)?;
        }

        writer.write_u32::<LittleEndian>(encode_len("indices vector", self.indices.len())?)?;
        for index in self.indices.iter() {
            writer.write_u16::<LittleEndian>(index)?;
        }

        writer.write_u32::<LittleEndian>(encode_len("table", self.entries.len())?)?;
        for (key, value) in self.iter() {
            writer.write_u32::<LittleEndian>(encode_len("key", key.len())?)?;
            writer.write_u32::<LittleEndian>(encode_len("value", value.len())?)?;
            writer.write_all(key)?;
            writer.write_all(value)?;
        }

        Ok(())
    }
}

/// Reads `len` bytes into `buffer`, failing if the reader ends early.
fn read_region<R: Read>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
    len: usize,
) -> Result<Region, DecodeError> {
    let start = buffer.len();

    // NOTE: `take` keeps a corrupted length from allocating more than the reader has
    reader.by_ref().take(len as u64).read_to_end(buffer)?;

    if buffer.len() - start != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }

    Ok(Region {
        start,
        end: buffer.len(),
    })
}

impl Decode for Table<'static> {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let seed_count = reader.read_u32::<LittleEndian>()?;
        check_seed_count(seed_count)?;

        let seeds = (0..seed_count)
            .map(|_| reader.read_u64::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;

        let indices_count = reader.read_u32::<LittleEndian>()?;
        let indices = (0..indices_count)
            .map(|_| reader.read_u16::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;

        let entry_count = reader.read_u32::<LittleEndian>()?;
        let mut entries = Vec::new();
        let mut buffer = Vec::new();

        for _ in 0..entry_count {
            let key_len = reader.read_u32::<LittleEndian>()? as usize;
            let value_len = reader.read_u32::<LittleEndian>()? as usize;
            let key = read_region(reader, &mut buffer, key_len)?;
            let value = read_region(reader, &mut buffer, value_len)?;
            entries.push(Entry { key, value });
        }

        log::trace!(
            "Decoded table with {entry_count} entries, {seed_count} seeds and {indices_count} buckets",
        );

        let table = Self::from_parts(seeds, indices, Slice::from(buffer), entries);
        table.check_indices()?;

        Ok(table)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Builder;
    use reader::{Borrowing, Copying};
    use test_log::test;

    fn sample() -> Table<'static> {
        let mut builder = Builder::with_config(crate::Config::default().rng_seed(7));
        for (k, v) in [("one", "1"), ("two", "2"), ("three", "3"), ("four", "4")] {
            builder.add(k, v);
        }
        builder.build().unwrap()
    }

    #[test]
    fn table_region_slice() {
        let mut buffer = vec![];
        let a = Region::append(&mut buffer, b"abc");
        let b = Region::append(&mut buffer, b"");
        let c = Region::append(&mut buffer, b"de");

        assert_eq!(b"abc", a.slice(&buffer));
        assert!(b.is_empty());
        assert_eq!(b"de", c.slice(&buffer));
        assert_eq!(2, c.len());

        let oob = Region { start: 4, end: 10 };
        assert!(oob.slice(&buffer).is_empty());
    }

    #[test]
    fn table_encode_layout_empty() {
        let table = Table::from_parts(vec![5], vec![SENTINEL], Slice::new(&[]), vec![]);
        let bytes = table.encode_into_vec().unwrap();

        // NOTE: The layout needs to be consistent across machines and compilations etc.
        assert_eq!(
            [
                1, 0, 0, 0, // seed count
                5, 0, 0, 0, 0, 0, 0, 0, // salt
                1, 0, 0, 0, // indices count
                0xFF, 0xFF, // sentinel
                0, 0, 0, 0, // entry count
            ],
            &*bytes
        );
    }

    #[test]
    fn table_encode_layout_entry() {
        let mut buffer = vec![];
        let key = Region::append(&mut buffer, b"k");
        let value = Region::append(&mut buffer, b"vv");

        let table = Table::from_parts(vec![1, 2], vec![1], buffer.into(), vec![Entry { key, value }]);
        let bytes = table.encode_into_vec().unwrap();

        assert_eq!(
            [
                2, 0, 0, 0, //
                1, 0, 0, 0, 0, 0, 0, 0, //
                2, 0, 0, 0, 0, 0, 0, 0, //
                1, 0, 0, 0, //
                1, 0, //
                1, 0, 0, 0, // entry count
                1, 0, 0, 0, // key len
                2, 0, 0, 0, // value len
                b'k', b'v', b'v',
            ],
            &*bytes
        );
    }

    #[test]
    fn table_strategies_agree() {
        let table = sample();
        let bytes = table.encode_into_vec().unwrap();

        let borrowed = Table::from_slice_with::<Borrowing>(&bytes).unwrap();
        let copied = Table::from_slice_with::<Copying>(&bytes).unwrap();
        let decoded = Table::decode_from(&mut bytes.as_slice()).unwrap();

        assert!(borrowed.is_borrowed());
        assert!(!decoded.is_borrowed());

        for other in [&borrowed, &copied, &decoded] {
            assert_eq!(table.seeds().collect::<Vec<_>>(), other.seeds().collect::<Vec<_>>());
            assert_eq!(table.indices().collect::<Vec<_>>(), other.indices().collect::<Vec<_>>());
            assert_eq!(table.iter().collect::<Vec<_>>(), other.iter().collect::<Vec<_>>());
            assert_eq!(Some(&b"3"[..]), other.get(b"three"));
            other.verify().unwrap();
        }
    }

    #[test]
    fn table_into_owned() {
        let bytes = sample().encode_into_vec().unwrap();
        let owned = Table::from_slice(&bytes).unwrap().into_owned();
        drop(bytes);

        assert!(!owned.is_borrowed());
        assert_eq!(4, owned.len());
        assert_eq!(Some(&b"4"[..]), owned.get(b"four"));
    }

    #[test]
    fn table_verify_detects_swapped_slots() {
        let table = sample();
        let mut entries = table.entries.clone();
        entries.swap(0, 1);

        let broken = Table {
            entries,
            ..table.clone()
        };

        assert!(matches!(
            broken.verify(),
            Err(DecodeError::Inconsistent { slot: 0 })
        ));
    }

    #[test]
    fn table_sentinel_bucket_is_absent() {
        let mut buffer = vec![];
        let key = Region::append(&mut buffer, b"k");
        let value = Region::append(&mut buffer, b"v");

        let table = Table::from_parts(
            vec![1, 2],
            vec![SENTINEL],
            buffer.into(),
            vec![Entry { key, value }],
        );

        assert_eq!(None, table.get(b"k"));
        assert!(table.verify().is_err());
    }
}
