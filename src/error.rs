//! Error types for cipherfed.

use thiserror::Error;

/// All possible errors in cipherfed.
#[derive(Error, Debug)]
pub enum FlError {
    /// Aggregation technique name not recognized at startup.
    #[error("unrecognized aggregation technique: {0:?}")]
    UnknownMethod(String),

    /// Attack policy name not recognized at startup.
    #[error("unrecognized attack policy: {0:?}")]
    UnknownAttackPolicy(String),

    /// Krum requires strictly more than `2f + 2` participants.
    #[error("insufficient honest clients: {participants} participants with byzantine bound {bound} (krum needs n > 2f + 2)")]
    InsufficientHonestClients {
        /// Number of participating updates.
        participants: usize,
        /// Byzantine bound `f` the aggregator was invoked with.
        bound: usize,
    },

    /// Flat vector length disagrees with the reshape template.
    #[error("shape mismatch: flat vector has {actual} elements, template expects {expected}")]
    ShapeMismatch {
        /// Element count the template requires.
        expected: usize,
        /// Element count actually provided.
        actual: usize,
    },

    /// Key or parameter setup failure in the encryption collaborator,
    /// or a homomorphic operation rejected by the scheme.
    #[error("encryption context error: {0}")]
    EncryptionContext(String),

    /// No updates were provided for aggregation.
    #[error("empty updates provided")]
    EmptyUpdates,

    /// Updates have inconsistent dimensions or parameter sets.
    #[error("dimension mismatch in updates")]
    DimensionMismatch,

    /// A collaborator (trainer, attack, evaluator) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// Log sink I/O failure.
    #[error("log sink error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<fhe::Error> for FlError {
    fn from(e: fhe::Error) -> Self {
        FlError::EncryptionContext(e.to_string())
    }
}

impl From<ndarray::ShapeError> for FlError {
    fn from(_: ndarray::ShapeError) -> Self {
        FlError::DimensionMismatch
    }
}
