// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Region;
use crate::coding::DecodeError;
use std::marker::PhantomData;

/// Fixed-width little-endian integer stored in a table array
pub trait LeInt: Copy {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Decodes from exactly `SIZE` bytes.
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;
}

impl LeInt for u16 {
    const SIZE: usize = std::mem::size_of::<Self>();

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self::from_le_bytes)
    }
}

impl LeInt for u64 {
    const SIZE: usize = std::mem::size_of::<Self>();

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self::from_le_bytes)
    }
}

/// An array of integers, either decoded into memory or viewed in place
///
/// A view keeps pointing into the source buffer and decodes single elements on access.
/// There is no alignment requirement on the source buffer.
#[derive(Clone, Debug)]
pub enum Array<'a, T> {
    /// Raw little-endian bytes inside the source buffer
    View(&'a [u8]),

    /// Decoded values
    Owned(Box<[T]>),
}

impl<T: LeInt> Array<'_, T> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::View(raw) => raw.len() / T::SIZE,
            Self::Owned(values) => values.len(),
        }
    }

    /// Returns `true` if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element at `idx`, if in bounds.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<T> {
        match self {
            Self::View(raw) => {
                let start = idx.checked_mul(T::SIZE)?;
                let end = start.checked_add(T::SIZE)?;
                raw.get(start..end).and_then(T::from_le_slice)
            }
            Self::Owned(values) => values.get(idx).copied(),
        }
    }

    /// Iterates over all elements.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + '_ {
        (0..self.len()).filter_map(|idx| self.get(idx))
    }

    /// Decodes a view into memory, detaching it from the source buffer.
    #[must_use]
    pub fn into_owned(self) -> Array<'static, T> {
        match self {
            Self::View(raw) => Array::Owned(Array::<T>::View(raw).iter().collect()),
            Self::Owned(values) => Array::Owned(values),
        }
    }
}

impl<T> From<Vec<T>> for Array<'static, T> {
    fn from(value: Vec<T>) -> Self {
        Self::Owned(value.into_boxed_slice())
    }
}

/// How typed arrays are materialized when reading a table from a byte buffer
pub trait Strategy {
    /// Materializes an array from its raw little-endian bytes.
    fn array<T: LeInt>(raw: &[u8]) -> Array<'_, T>;
}

/// Arrays are views into the source buffer; nothing is copied
#[derive(Copy, Clone, Debug, Default)]
pub struct Borrowing;

impl Strategy for Borrowing {
    fn array<T: LeInt>(raw: &[u8]) -> Array<'_, T> {
        Array::View(raw)
    }
}

/// Arrays are decoded and byte-swapped into owned memory
#[derive(Copy, Clone, Debug, Default)]
pub struct Copying;

impl Strategy for Copying {
    fn array<T: LeInt>(raw: &[u8]) -> Array<'_, T> {
        Array::Owned(
            raw.chunks_exact(T::SIZE)
                .filter_map(T::from_le_slice)
                .collect(),
        )
    }
}

/// Strategy matching the host: views on little-endian targets
#[cfg(target_endian = "little")]
pub type NativeStrategy = Borrowing;

/// Strategy matching the host: decoding on big-endian targets
#[cfg(not(target_endian = "little"))]
pub type NativeStrategy = Copying;

/// Reads values and typed arrays from a byte slice at increasing offsets
///
/// Every read is bounds-checked, so a truncated or corrupted buffer results
/// in [`DecodeError::Truncated`] instead of a panic.
pub struct SliceReader<'a, S> {
    bytes: &'a [u8],
    pos: usize,
    strategy: PhantomData<S>,
}

impl<'a, S: Strategy> SliceReader<'a, S> {
    /// Starts reading at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            strategy: PhantomData,
        }
    }

    /// Current offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn truncated(&self, needed: usize) -> DecodeError {
        DecodeError::Truncated {
            offset: self.pos,
            needed,
            available: self.bytes.len().saturating_sub(self.pos),
        }
    }

    /// Skips `len` bytes, returning their absolute offsets.
    pub fn region(&mut self, len: usize) -> Result<Region, DecodeError> {
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.truncated(len))?;

        self.pos = end;
        Ok(Region { start, end })
    }

    /// Reads the next `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let region = self.region(len)?;
        let bytes = self.bytes;

        bytes
            .get(region.start..region.end)
            .ok_or_else(|| self.truncated(len))
    }

    /// Reads a little-endian u32.
    ///
    /// All counts and lengths are stored as u32.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read(std::mem::size_of::<u32>())?;

        bytes
            .try_into()
            .map(u32::from_le_bytes)
            .map_err(|_| self.truncated(std::mem::size_of::<u32>()))
    }

    /// Reads a u32 length field.
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        self.read_u32().map(|len| len as usize)
    }

    /// Reads an array of `count` integers using the reader's strategy.
    pub fn read_array<T: LeInt>(&mut self, count: usize) -> Result<Array<'a, T>, DecodeError> {
        let len = count
            .checked_mul(T::SIZE)
            .ok_or_else(|| self.truncated(usize::MAX))?;

        self.read(len).map(S::array::<T>)
    }
}
