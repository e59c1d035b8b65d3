//! Errors reported by graph construction.

use thiserror::Error;

/// Invalid input rejected by [`MassDawg::insert`](crate::dawg::MassDawg::insert).
///
/// The graph is left untouched whenever one of these is returned. Queries
/// never fail: an unmatched query simply yields no k-mers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DawgError {
    /// The singly and doubly charged sequences differ in length.
    #[error("singly and doubly sequences differ in length: {singly} != {doubly}")]
    LengthMismatch {
        /// Length of the singly charged sequence.
        singly: usize,
        /// Length of the doubly charged sequence.
        doubly: usize,
    },

    /// The sequences contain no masses.
    #[error("cannot insert an empty mass sequence")]
    EmptySequence,

    /// A mass is NaN or infinite.
    #[error("mass at position {index} is not finite: {mass}")]
    NonFiniteMass {
        /// Position of the offending mass.
        index: usize,
        /// The offending value.
        mass: f64,
    },

    /// A mass is too large for the configured epsilon to key it exactly.
    #[error("mass at position {index} is out of range: |{mass}| > {limit}")]
    MassOutOfRange {
        /// Position of the offending mass.
        index: usize,
        /// The offending value.
        mass: f64,
        /// Largest magnitude accepted under the configured epsilon.
        limit: f64,
    },
}

/// Result type of fallible graph operations.
pub type Result<T> = std::result::Result<T, DawgError>;
