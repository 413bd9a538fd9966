//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error)]
pub enum EomapsTypesError {
    /// Geometry conversion error.
    #[error("invalid input geometry: {0}")]
    Conversion(String),
    /// The coordinate system is not known to the transformer.
    #[error("no transformation available from {from} to {to}")]
    UnknownCrs {
        /// Source coordinate system.
        from: String,
        /// Target coordinate system.
        to: String,
    },
}
