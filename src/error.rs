//! Error types for the unitig construction engine.

use thiserror::Error;

/// Top-level error type returned by fallible engine operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("checkpoint mismatch: {0}")]
    CheckpointMismatch(String),

    #[error("store corruption: {0}")]
    StoreCorruption(String),

    #[error("algorithmic anomaly: {0}")]
    AlgorithmicAnomaly(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] Box<bincode::ErrorKind>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is fatal to the whole run (spec.md §7: configuration,
    /// store corruption and out-of-memory are the only fatal conditions).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::StoreCorruption(_) | Error::OutOfMemory(_)
        )
    }
}

/// Per-phase counters for non-fatal algorithmic anomalies (spec.md §7's
/// propagation policy: local failures are logged and counted, never fatal).
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureTally {
    pub anomalies: u64,
    pub placement_failures: u64,
    pub join_failures: u64,
    pub bubble_failures: u64,
}

impl FailureTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.anomalies + self.placement_failures + self.join_failures + self.bubble_failures
    }

    pub fn merge(&mut self, other: &FailureTally) {
        self.anomalies += other.anomalies;
        self.placement_failures += other.placement_failures;
        self.join_failures += other.join_failures;
        self.bubble_failures += other.bubble_failures;
    }
}
