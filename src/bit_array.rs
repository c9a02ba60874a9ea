// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

const BIT_MASK: u8 = 0b1000_0000_u8;

/// Gets a bit from the byte.
fn get_bit(byte: u8, idx: usize) -> bool {
    let bit_mask = BIT_MASK >> idx;
    let masked = byte & bit_mask;
    masked > 0
}

/// Enables the given bit in the byte.
fn enable_bit(byte: u8, idx: usize) -> u8 {
    let bit_mask = BIT_MASK >> idx;
    byte | bit_mask
}

/// Fixed-size bit array
///
/// Tracks which table slots are already claimed while buckets are placed.
#[derive(Debug, Eq, PartialEq)]
pub struct BitArray(Box<[u8]>);

impl BitArray {
    /// Creates a new bit array that can hold `bits` bits, all disabled.
    #[must_use]
    pub fn with_bits(bits: usize) -> Self {
        let vec = vec![0; bits.div_ceil(8)];
        Self(vec.into_boxed_slice())
    }

    /// Sets the i-th bit to `true`.
    ///
    /// Out-of-range bits are ignored.
    pub fn enable(&mut self, idx: usize) {
        if let Some(byte) = self.0.get_mut(idx / 8) {
            *byte = enable_bit(*byte, idx % 8);
        }
    }

    /// Gets the i-th bit.
    ///
    /// Out-of-range bits read as `false`.
    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        self.0
            .get(idx / 8)
            .is_some_and(|byte| get_bit(*byte, idx % 8))
    }
}
