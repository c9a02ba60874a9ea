// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Immutable minimal perfect hash tables, built with the CHD (compress, hash, displace) algorithm.
//!
//! ##### About
//!
//! Given a fixed set of N distinct byte-string keys, a [`Builder`] produces a [`Table`]
//! that maps every key to its value using exactly N slots. A lookup costs two hash evaluations
//! and one key comparison, independent of N.
//!
//! Keys are hashed with 64-bit FNV-1a and salted with a random seed. Keys are grouped into
//! `max(1, N / 2)` buckets, and each bucket is assigned a displacement seed that moves
//! all of its keys into slots no other key occupies. Larger buckets are placed first.
//!
//! Tables are build-once, read-many: there is no insert or remove after construction.
//!
//! ##### Binary layout
//!
//! Tables serialize into a simple little-endian layout (see [`coding::Encode`]) that can be
//! read back without copying keys and values, e.g. from a memory-mapped file,
//! using [`Table::from_slice`]. Streams are read with [`coding::Decode`].
//!
//! ```text
//! u32 seed count, u64 seeds[]
//! u32 bucket count, u16 seed index per bucket (0xFFFF = empty bucket)
//! u32 entry count, then per entry: u32 key len, u32 value len, key bytes, value bytes
//! ```
//!
//! The layout carries no magic number or checksum. Malformed buffers are rejected
//! through bounds checks; [`Table::verify`] additionally checks that every key
//! hashes to its own slot.
//!
//! Keys and values are limited to 2^32 bytes each.

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub(crate) type HashSet<K> = std::collections::HashSet<K, rustc_hash::FxBuildHasher>;

mod bit_array;
mod builder;

#[doc(hidden)]
pub mod coding;

mod config;

mod error;

#[doc(hidden)]
pub mod hash;

mod slice;

/// Compiled tables and their readers
pub mod table;

pub use {
    builder::Builder,
    config::{Config, DEFAULT_MAX_ATTEMPTS},
    error::{Error, Result},
    slice::Slice,
    table::{Iter, Keys, Table, Values},
};
