use thiserror::Error;

/// Construction-time index errors.
/// These are fatal to the operation that raised them; no partial state is
/// rolled back by the caller because none was committed.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A name was inserted twice into the same store.
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    /// Adding the edge would make the category hierarchy cyclic.
    #[error("hierarchy edge {child} -> {parent} would close a cycle")]
    HierarchyCycle { child: u32, parent: u32 },
    /// A referenced category ID is outside the dense 0..M range.
    #[error("unknown category id: {0}")]
    UnknownCategory(u32),
    /// A referenced document ID is outside the dense 0..N range.
    #[error("unknown document id: {0}")]
    UnknownDocument(u32),
    /// A referenced feature ID is outside the dense 0..F range.
    #[error("unknown feature id: {0}")]
    UnknownFeature(u32),
}

/// Errors from saving/loading a classifier runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config codec: {0}")]
    Codec(#[from] serde_cbor::Error),
}

/// Errors from threshold/parameter optimization.
/// A failure at any grid point aborts the whole run.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("optimization grid is empty (check k and margin ranges)")]
    EmptyGrid,
    #[error("no validation documents to evaluate")]
    EmptyValidation,
}
