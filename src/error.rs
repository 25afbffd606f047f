//! Error types
//!
//! Build-time shape errors are fatal for the descriptor that produced them:
//! a spec is either built completely or not at all.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a descriptor into a [`CallSpec`](crate::CallSpec)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("unsupported field shape: {descriptor}.{field} is {shape}")]
    UnsupportedShape {
        descriptor: String,
        field: String,
        shape: String,
    },

    #[error("only one return field allowed in {descriptor}: found {first} and {second}")]
    MultipleReturns {
        descriptor: String,
        first: String,
        second: String,
    },

    #[error("unknown type override '{name}' on {descriptor}.{field}")]
    UnknownTypeOverride {
        descriptor: String,
        field: String,
        name: String,
    },

    #[error("type override '{name}' needs {needed} bytes but {descriptor}.{field} has {available}")]
    OverrideTooWide {
        descriptor: String,
        field: String,
        name: String,
        needed: usize,
        available: usize,
    },

    #[error("unknown annotation '{annotation}' on {descriptor}.{field}")]
    UnknownAnnotation {
        descriptor: String,
        field: String,
        annotation: String,
    },

    #[error("offset {offset} of {descriptor}.{field} does not fit a 16-bit slot offset")]
    OffsetOverflow {
        descriptor: String,
        field: String,
        offset: usize,
    },

    #[error("slot {descriptor}.{field} spans bytes {offset}..{end} past block size {size}")]
    SlotOutOfBounds {
        descriptor: String,
        field: String,
        offset: usize,
        end: usize,
        size: usize,
    },
}

/// Errors reported by the executor in checked mode
///
/// The unchecked fast path never produces these; a mismatched block there is
/// undefined behavior.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("argument block is {actual} bytes, spec was built for {expected}")]
    BlockSizeMismatch { expected: usize, actual: usize },

    #[error("argument block layout of {descriptor} does not match the spec's shape")]
    ShapeMismatch { descriptor: String },
}

/// Typed access outside an [`ArgBlock`](crate::ArgBlock)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access of {width} bytes at offset {offset} exceeds block of {len} bytes")]
pub struct BlockError {
    pub offset: usize,
    pub width: usize,
    pub len: usize,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Result alias for spec building
pub type Result<T> = std::result::Result<T, SpecError>;
