// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    bit_array::BitArray,
    hash::Hasher,
    table::{Entry, Region, Table, MAX_SEEDS, SENTINEL},
    Config, Error, HashSet, Slice,
};
use rand::RngCore;
use std::time::Instant;

/// Number of bucket keys reported in [`Error::BuildExhausted`]
const SAMPLE_KEY_COUNT: usize = 5;

/// Keys that share a bucket, resolved together by one displacement seed
#[derive(Debug)]
struct Bucket {
    /// Bucket position in the indices vector
    index: usize,

    /// Positions of the bucket's items in the builder
    items: Vec<usize>,
}

/// A successful placement of a bucket
struct Placement {
    seed_idx: usize,
    slots: Vec<usize>,
}

/// Accumulates key-value pairs and compiles them into a [`Table`]
///
/// Builds use the compress-hash-displace (CHD) algorithm: keys are grouped into
/// `max(1, n / 2)` buckets, and buckets are placed largest first, each with a
/// displacement seed that moves all its keys into free slots.
///
/// Keys must be unique; duplicates are reported by [`Builder::build`], not when adding.
#[derive(Debug, Default)]
pub struct Builder {
    config: Config,
    items: Vec<(Slice, Slice)>,
}

impl Builder {
    /// Creates a builder with the default [`Config`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the given [`Config`].
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            items: Vec::new(),
        }
    }

    /// Adds a key-value pair.
    pub fn add<K: Into<Slice>, V: Into<Slice>>(&mut self, key: K, value: V) {
        self.items.push((key.into(), value.into()));
    }

    /// Returns the number of pairs added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no pairs were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Builds the table, drawing seeds from the configured random source.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a key was added twice, or if no collision-free
    /// displacement seed was found for some bucket.
    pub fn build(self) -> crate::Result<Table<'static>> {
        let mut rng = self.config.rng();
        self.build_with_rng(&mut rng)
    }

    fn check_duplicates(&self) -> crate::Result<()> {
        let mut keys = HashSet::<&[u8]>::default();
        keys.reserve(self.items.len());

        for (key, _) in &self.items {
            if !keys.insert(&**key) {
                return Err(Error::DuplicateKey(key.clone()));
            }
        }

        Ok(())
    }

    fn key(&self, item: usize) -> &[u8] {
        self.items.get(item).map(|(k, _)| &**k).unwrap_or_default()
    }

    /// Groups items by bucket, largest buckets first.
    ///
    /// Equally sized buckets stay ordered by bucket position.
    fn partition(&self, hasher: &Hasher, bucket_count: usize) -> Vec<Bucket> {
        let mut buckets = (0..bucket_count)
            .map(|index| Bucket {
                index,
                items: vec![],
            })
            .collect::<Vec<_>>();

        for (item, (key, _)) in self.items.iter().enumerate() {
            // NOTE: Reduced modulo bucket_count, which is a usize
            #[allow(clippy::cast_possible_truncation)]
            let pos = hasher.bucket_index(key) as usize;

            if let Some(bucket) = buckets.get_mut(pos) {
                bucket.items.push(item);
            }
        }

        buckets.retain(|bucket| !bucket.items.is_empty());
        buckets.sort_by(|a, b| b.items.len().cmp(&a.items.len()));
        buckets
    }

    /// Computes the slots of a bucket's keys under `seed`, if none of them
    /// collide with each other or with an already claimed slot.
    fn try_seed(&self, hasher: &Hasher, seen: &BitArray, bucket: &Bucket, seed: u64) -> Option<Vec<usize>> {
        let mut slots = Vec::with_capacity(bucket.items.len());

        for &item in &bucket.items {
            // NOTE: Reduced modulo the item count, which is a usize
            #[allow(clippy::cast_possible_truncation)]
            let slot = hasher.table_index(seed, self.key(item)) as usize;

            if seen.get(slot) || slots.contains(&slot) {
                return None;
            }
            slots.push(slot);
        }

        Some(slots)
    }

    /// Finds a seed for the bucket, preferring existing seeds over fresh ones.
    ///
    /// Returns the placement and how many fresh seeds were drawn.
    fn place<R: RngCore + ?Sized>(
        &self,
        hasher: &mut Hasher,
        seen: &BitArray,
        bucket: &Bucket,
        rng: &mut R,
    ) -> (Option<Placement>, u64) {
        let reused = {
            let hasher: &Hasher = hasher;

            hasher.displacements().find_map(|(seed_idx, seed)| {
                self.try_seed(hasher, seen, bucket, seed)
                    .map(|slots| Placement { seed_idx, slots })
            })
        };

        if reused.is_some() {
            return (reused, 0);
        }

        if hasher.len() >= MAX_SEEDS {
            return (None, 0);
        }

        for attempt in 1..=self.config.max_attempts {
            let seed = rng.next_u64();

            if let Some(slots) = self.try_seed(hasher, seen, bucket, seed) {
                let seed_idx = hasher.push(seed);
                return (Some(Placement { seed_idx, slots }), attempt);
            }
        }

        (None, self.config.max_attempts)
    }

    fn exhausted(&self, ordinal: usize, bucket_count: usize, bucket: &Bucket) -> Error {
        Error::BuildExhausted {
            bucket: ordinal,
            bucket_count,
            bucket_size: bucket.items.len(),
            sample_keys: bucket
                .items
                .iter()
                .take(SAMPLE_KEY_COUNT)
                .map(|&item| Slice::from(self.key(item)))
                .collect(),
        }
    }

    /// Builds the table, drawing seeds from `rng`.
    ///
    /// Passing a seeded generator makes builds reproducible.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a key was added twice, or if no collision-free
    /// displacement seed was found for some bucket.
    pub fn build_with_rng<R: RngCore + ?Sized>(self, rng: &mut R) -> crate::Result<Table<'static>> {
        let start = Instant::now();

        let item_count = self.items.len();
        let bucket_count = (item_count / 2).max(1);

        log::debug!("Building table from {item_count} items in {bucket_count} buckets");

        self.check_duplicates()?;

        let mut hasher = Hasher::new(item_count as u64, bucket_count as u64, rng.next_u64());
        let buckets = self.partition(&hasher, bucket_count);

        let mut indices = vec![SENTINEL; bucket_count];
        let mut seen = BitArray::with_bits(item_count);
        let mut slots: Vec<Option<usize>> = vec![None; item_count];
        let mut worst_attempts = 0;

        for (ordinal, bucket) in buckets.iter().enumerate() {
            let (placement, attempts) = self.place(&mut hasher, &seen, bucket, rng);
            worst_attempts = worst_attempts.max(attempts);

            let Some(Placement { seed_idx, slots: bucket_slots }) = placement else {
                log::warn!(
                    "Giving up on bucket {ordinal}/{} with {} entries after {attempts} fresh seeds",
                    buckets.len(),
                    bucket.items.len(),
                );
                return Err(self.exhausted(ordinal, buckets.len(), bucket));
            };

            if attempts > 0 {
                log::trace!(
                    "Bucket {ordinal} ({} entries) needed {attempts} fresh seeds",
                    bucket.items.len(),
                );
            }

            let Ok(seed_idx) = u16::try_from(seed_idx) else {
                return Err(self.exhausted(ordinal, buckets.len(), bucket));
            };

            for (&slot, &item) in bucket_slots.iter().zip(&bucket.items) {
                seen.enable(slot);

                if let Some(dst) = slots.get_mut(slot) {
                    *dst = Some(item);
                }
            }

            if let Some(dst) = indices.get_mut(bucket.index) {
                *dst = seed_idx;
            }
        }

        let data_size = self
            .items
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>();

        let mut buffer = Vec::with_capacity(data_size);
        let mut entries = Vec::with_capacity(item_count);

        for item in slots.into_iter().flatten() {
            if let Some((key, value)) = self.items.get(item) {
                entries.push(Entry {
                    key: Region::append(&mut buffer, key),
                    value: Region::append(&mut buffer, value),
                });
            }
        }

        debug_assert_eq!(item_count, entries.len(), "every slot should be filled");

        let seeds = hasher.into_seeds();

        log::debug!(
            "Built table with {item_count} entries and {} seeds in {:?} (worst bucket drew {worst_attempts} fresh seeds)",
            seeds.len(),
            start.elapsed(),
        );

        Ok(Table::from_parts(seeds, indices, Slice::from(buffer), entries))
    }
}

impl<K: Into<Slice>, V: Into<Slice>> Extend<(K, V)> for Builder {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use test_log::test;

    /// Yields the same value forever.
    struct Constant(u64);

    impl RngCore for Constant {
        fn next_u32(&mut self) -> u32 {
            #[allow(clippy::cast_possible_truncation)]
            let v = self.0 as u32;
            v
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn builder(items: &[(&str, &str)]) -> Builder {
        let mut builder = Builder::new();
        builder.extend(items.iter().copied());
        builder
    }

    #[test]
    fn builder_partition_largest_first() {
        let mut builder = Builder::new();
        builder.extend((0..100u32).map(|i| (i.to_string(), "")));

        let hasher = Hasher::new(100, 50, 1234);
        let buckets = builder.partition(&hasher, 50);

        assert!(buckets.iter().all(|b| !b.items.is_empty()));
        assert_eq!(100, buckets.iter().map(|b| b.items.len()).sum::<usize>());

        for pair in buckets.windows(2) {
            let [a, b] = pair else { unreachable!() };
            assert!(a.items.len() >= b.items.len());
            if a.items.len() == b.items.len() {
                assert!(a.index < b.index);
            }
        }
    }

    #[test]
    fn builder_try_seed_rejects_claimed_slot() {
        let builder = builder(&[("a", "1")]);
        let hasher = Hasher::new(4, 1, 0);
        let bucket = Bucket {
            index: 0,
            items: vec![0],
        };

        let seen = BitArray::with_bits(4);
        let slots = builder.try_seed(&hasher, &seen, &bucket, 99).unwrap();
        assert_eq!(1, slots.len());

        let mut seen = BitArray::with_bits(4);
        for slot in slots {
            seen.enable(slot);
        }
        assert!(builder.try_seed(&hasher, &seen, &bucket, 99).is_none());
    }

    #[test]
    fn builder_try_seed_rejects_internal_collision() {
        // NOTE: With a single slot, two keys always collide
        let builder = builder(&[("a", "1"), ("b", "2")]);
        let hasher = Hasher::new(1, 1, 0);
        let bucket = Bucket {
            index: 0,
            items: vec![0, 1],
        };

        let seen = BitArray::with_bits(1);
        assert!(builder.try_seed(&hasher, &seen, &bucket, 5).is_none());
    }

    #[test]
    fn builder_reuses_existing_seeds() {
        let mut builder = Builder::new();
        builder.extend((0..1_000u32).map(|i| (format!("key{i}"), format!("value{i}"))));

        let table = builder
            .build_with_rng(&mut StdRng::seed_from_u64(1))
            .unwrap();

        // NOTE: Most buckets are resolved by a previously drawn seed
        assert!(table.seed_count() < table.bucket_count());
        table.verify().unwrap();
    }

    #[test]
    fn builder_deterministic_with_seed() {
        let items = [("one", "1"), ("two", "2"), ("three", "3"), ("four", "4")];

        let a = builder(&items)
            .build_with_rng(&mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = builder(&items)
            .build_with_rng(&mut StdRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(a.seeds().collect::<Vec<_>>(), b.seeds().collect::<Vec<_>>());
        assert_eq!(a.indices().collect::<Vec<_>>(), b.indices().collect::<Vec<_>>());
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
    }

    #[test]
    fn builder_exhausted() {
        // NOTE: Three items share one bucket; with salt 0 and seed 0,
        // "a" and "b" both land in slot 1
        let mut builder = Builder::with_config(Config::default().max_attempts(10));
        builder.extend([("a", "1"), ("b", "2"), ("c", "3")]);

        match builder.build_with_rng(&mut Constant(0)) {
            Err(Error::BuildExhausted {
                bucket,
                bucket_count,
                bucket_size,
                sample_keys,
            }) => {
                assert_eq!(0, bucket);
                assert_eq!(1, bucket_count);
                assert_eq!(3, bucket_size);
                assert_eq!(3, sample_keys.len());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn builder_exhausted_zero_attempts() {
        let mut builder = Builder::with_config(Config::default().max_attempts(0));
        builder.add("k", "v");

        match builder.build_with_rng(&mut StdRng::seed_from_u64(3)) {
            Err(Error::BuildExhausted {
                bucket,
                bucket_count,
                bucket_size,
                sample_keys,
            }) => {
                assert_eq!(0, bucket);
                assert_eq!(1, bucket_count);
                assert_eq!(1, bucket_size);
                assert_eq!(vec![Slice::from("k")], sample_keys);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn builder_duplicate_key() {
        let builder = builder(&[("a", "1"), ("b", "2"), ("a", "3")]);

        match builder.build() {
            Err(Error::DuplicateKey(key)) => assert_eq!(key, b"a"),
            other => panic!("expected duplicate key, got {other:?}"),
        }
    }
}
