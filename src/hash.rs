// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// 64-bit FNV-1a hash of the given bytes.
///
/// The hash is part of the binary layout, so it must stay stable across
/// machines and releases.
#[must_use]
pub fn hash64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |h, &byte| {
        (h ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Maps a salted hash to its bucket.
pub(crate) fn bucket_position(salted: u64, bucket_count: u64) -> u64 {
    salted % bucket_count
}

/// Maps a salted hash and a displacement seed to its table slot.
pub(crate) fn slot_position(salted: u64, seed: u64, size: u64) -> u64 {
    (salted ^ seed) % size
}

/// Seed vector plus the table dimensions used during construction
///
/// `seeds[0]` is the global salt, the remaining seeds are displacement seeds
/// shared between buckets.
#[derive(Debug)]
pub struct Hasher {
    seeds: Vec<u64>,
    size: u64,
    buckets: u64,
}

impl Hasher {
    /// Creates a hasher for a table of `size` slots and `buckets` buckets.
    pub fn new(size: u64, buckets: u64, salt: u64) -> Self {
        Self {
            seeds: vec![salt],
            size,
            buckets,
        }
    }

    /// Returns the global salt.
    pub fn salt(&self) -> u64 {
        // NOTE: The salt is pushed in the constructor
        self.seeds.first().copied().unwrap_or_default()
    }

    /// Bucket index of a key.
    pub fn bucket_index(&self, key: &[u8]) -> u64 {
        bucket_position(hash64(key) ^ self.salt(), self.buckets)
    }

    /// Table index of a key under the given displacement seed.
    pub fn table_index(&self, seed: u64, key: &[u8]) -> u64 {
        slot_position(hash64(key) ^ self.salt(), seed, self.size)
    }

    /// Displacement seeds, excluding the salt, with their index into the seed vector.
    pub fn displacements(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.seeds.iter().copied().enumerate().skip(1)
    }

    /// Appends a displacement seed, returning its index.
    pub fn push(&mut self, seed: u64) -> usize {
        self.seeds.push(seed);
        self.seeds.len() - 1
    }

    /// Number of seeds, including the salt.
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// Returns the seed vector.
    pub fn into_seeds(self) -> Vec<u64> {
        self.seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn fnv1a_reference_values() {
        // NOTE: Hashes need to be consistent across machines and compilations etc.
        assert_eq!(0xcbf2_9ce4_8422_2325, hash64(b""));
        assert_eq!(0xaf63_dc4c_8601_ec8c, hash64(b"a"));
        assert_eq!(0x8594_4171_f739_67e8, hash64(b"foobar"));
    }

    #[test]
    fn hasher_salt_and_indices() {
        let hasher = Hasher::new(7, 3, 0xdead_beef);
        assert_eq!(0xdead_beef, hasher.salt());
        assert_eq!(1, hasher.len());

        let h = hash64(b"three") ^ 0xdead_beef;
        assert_eq!(h % 3, hasher.bucket_index(b"three"));
        assert_eq!((h ^ 42) % 7, hasher.table_index(42, b"three"));
    }

    #[test]
    fn hasher_displacements_skip_salt() {
        let mut hasher = Hasher::new(10, 5, 1);
        assert_eq!(1, hasher.push(100));
        assert_eq!(2, hasher.push(200));

        assert_eq!(
            vec![(1, 100), (2, 200)],
            hasher.displacements().collect::<Vec<_>>()
        );
        assert_eq!(vec![1, 100, 200], hasher.into_seeds());
    }
}
