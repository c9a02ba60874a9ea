// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{DecodeError, EncodeError},
    Slice,
};

/// Represents errors that can occur when building, writing or reading a table
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed (truncated or malformed input)
    Decode(DecodeError),

    /// The same key was added to the builder more than once
    DuplicateKey(Slice),

    /// No collision-free displacement seed was found for a bucket
    BuildExhausted {
        /// Position of the bucket in placement order
        bucket: usize,

        /// Number of non-empty buckets
        bucket_count: usize,

        /// Number of keys in the bucket
        bucket_size: usize,

        /// Some keys of the bucket, for diagnostics
        sample_keys: Vec<Slice>,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => {
                write!(f, "ChdError: duplicate key {:?}", String::from_utf8_lossy(key))
            }
            Self::BuildExhausted {
                bucket,
                bucket_count,
                bucket_size,
                sample_keys,
            } => {
                write!(
                    f,
                    "ChdError: no collision-free seed for bucket {bucket}/{bucket_count} with {bucket_size} entries: ["
                )?;

                for (idx, key) in sample_keys.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", String::from_utf8_lossy(key))?;
                }

                write!(f, "]")
            }
            e => write!(f, "ChdError: {e:?}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::DuplicateKey(_) | Self::BuildExhausted { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Table result
pub type Result<T> = std::result::Result<T, Error>;
