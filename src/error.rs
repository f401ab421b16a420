//! Error types for the cordyceps_avl crate

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = core::result::Result<T, Error>;

/// Any error reported by this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A serialized tree could not be decoded
    #[error(transparent)]
    CorruptStream(#[from] CorruptStream),

    /// An order statistic was requested outside the tree
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    /// A tree failed validation
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// `select` was called with an index outside `1..=len`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("index {index} out of range for a tree of {len} elements")]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

/// Reasons a byte stream is not a valid serialized tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptStream {
    /// The stream ended in the middle of the header or of a record
    #[error("unexpected end of stream: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// The stream does not start with the format magic
    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// The header names a format version this crate cannot read
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    /// The header's node count is above the configured limit
    #[error("node count {count} exceeds the limit of {limit}")]
    CountExceedsLimit { count: u32, limit: usize },

    /// The header's node count needs more bytes than the stream holds
    #[error("node count {count} needs more than the {remaining} bytes remaining")]
    CountExceedsStream { count: u32, remaining: usize },

    /// A flags byte has bits set other than `has_left` and `has_right`
    #[error("invalid flags {flags:#04x} in record {index}")]
    InvalidFlags { flags: u8, index: usize },

    /// The flags describe more records than the header announced
    #[error("records describe more than the {count} nodes announced")]
    TooManyRecords { count: usize },

    /// The records describe fewer nodes than the header announced
    #[error("header announced {declared} nodes but records describe {actual}")]
    CountMismatch { declared: usize, actual: usize },

    /// A key does not fit between the keys of its ancestors
    #[error("key {key} in record {index} breaks search order")]
    OutOfOrder { key: i32, index: usize },

    /// A node's subtrees differ in height by more than one
    #[error("subtree rooted at key {key} (record {index}) is not height-balanced")]
    Unbalanced { key: i32, index: usize },

    /// The records nest deeper than the configured limit
    #[error("records nest deeper than {max_depth} levels")]
    TooDeep { max_depth: usize },

    /// Bytes were left over after the last record
    #[error("{0} trailing bytes after the last record")]
    TrailingBytes(usize),
}

/// The first broken invariant found by [`AvlTree::check`](crate::AvlTree::check)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A key is not strictly between the keys of its ancestors
    #[error("key {key} is out of search order")]
    Order { key: String },

    /// A node's subtrees differ in height by more than one
    #[error("key {key} has balance factor {factor}")]
    Balance { key: String, factor: i16 },

    /// A stored height does not match the recomputed one
    #[error("key {key} stores height {stored}, actual {actual}")]
    Height { key: String, stored: u8, actual: u8 },

    /// A stored subtree size does not match the recomputed one
    #[error("key {key} stores size {stored}, actual {actual}")]
    Size { key: String, stored: usize, actual: usize },

    /// A child's parent link does not point back at its parent
    #[error("child of key {key} has a stale parent link")]
    Parent { key: String },

    /// The root has a parent link
    #[error("root has a parent link")]
    RootHasParent,
}
