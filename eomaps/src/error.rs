//! Error types used by the crate.

use eomaps_types::error::EomapsTypesError;
use thiserror::Error;

use crate::layer_name::LayerNameError;
use crate::render::DrawError;

/// Error returned by a user callback. Callback errors are logged and never abort the dispatch.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a user callback.
pub type CallbackResult = Result<(), CallbackError>;

/// EOmaps error type.
#[derive(Debug, Error)]
pub enum EomapsError {
    /// Malformed layer name or transparency suffix.
    #[error(transparent)]
    LayerName(#[from] LayerNameError),
    /// Callback name that cannot be used as an identifier.
    #[error("invalid callback method name: {0:?}")]
    InvalidPickMethod(String),
    /// The map-view has no dataset attached.
    #[error("no dataset is attached to the map-view")]
    NoDataset,
    /// The dataset has no plotted collection that could be picked.
    #[error("the dataset has not been plotted yet")]
    NotPickable,
    /// A callback identifier could not be parsed.
    #[error("invalid callback id: {0:?}")]
    InvalidCallbackId(String),
    /// No callback with the given identifier is attached.
    #[error("callback not found: {0}")]
    CallbackNotFound(String),
    /// The map-view handle refers to a map-view that was removed.
    #[error("the map-view does not exist anymore")]
    DeadMaps,
    /// Drawing failed.
    #[error(transparent)]
    Draw(#[from] DrawError),
    /// Coordinate transformation failed.
    #[error(transparent)]
    Transform(#[from] EomapsTypesError),
    /// Generic error - details are inside.
    #[error("{0}")]
    Generic(String),
}
