// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use rand::{rngs::StdRng, SeedableRng};

/// Default ceiling on fresh displacement seeds tried per bucket
pub const DEFAULT_MAX_ATTEMPTS: u64 = 10_000_000;

/// Table construction configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Fresh seeds tried per bucket before giving up
    #[doc(hidden)]
    pub max_attempts: u64,

    /// Fixed seed for the random source
    #[doc(hidden)]
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rng_seed: None,
        }
    }
}

impl Config {
    /// Sets how many fresh displacement seeds are tried for a single bucket
    /// before the build fails with [`crate::Error::BuildExhausted`].
    ///
    /// Existing seeds are always tried first and do not count against this limit.
    ///
    /// Defaults to 10 million.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Seeds the random source, making builds reproducible.
    ///
    /// By default, the random source is seeded from the operating system.
    #[must_use]
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub(crate) fn rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
