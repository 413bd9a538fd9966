//! Contracts of the host canvas and its drawable objects.
//!
//! EOmaps does not rasterize anything itself. The host toolkit implements [`Canvas`] (draw an
//! artist into its buffer, copy a pixel region, restore a pixel region, present the buffer) and
//! hands out [`Artist`]s, which the [`BlitManager`](crate::BlitManager) sorts into layers and
//! caches.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use eomaps_types::cartesian::{Rect, Size};
use maybe_sync::{MaybeSend, MaybeSync};
use thiserror::Error;

mod raster;

pub use raster::Raster;

/// Shared reference to an artist owned by the host canvas.
pub type ArtistRef = Arc<dyn Artist>;

/// A drawable object of the host toolkit (a collection, a line, a text, an image...).
///
/// Artists use interior mutability: the host keeps its own references to them.
pub trait Artist: Debug + MaybeSend + MaybeSync {
    /// Animated artists are excluded from the host's regular draw pass; EOmaps draws them
    /// explicitly when fetching backgrounds or updating the canvas.
    fn set_animated(&self, animated: bool);
    /// Stacking order. Artists with higher values are drawn on top.
    fn zorder(&self) -> f64;
    /// Returns true if the artist changed since it was drawn last time.
    fn is_stale(&self) -> bool;
    /// Returns true if the artist is visible.
    fn is_visible(&self) -> bool;
    /// Shows or hides the artist.
    fn set_visible(&self, visible: bool);
    /// Label of the axes the artist belongs to, if it belongs to one.
    ///
    /// Artists whose axes label starts with [`INSET_AXES_LABEL`] belong to an inset map and are
    /// always drawn after the artists of the parent map.
    fn axes_label(&self) -> Option<String> {
        None
    }
    /// Returns false if the artist was removed from its axes by the host.
    fn has_axes(&self) -> bool {
        true
    }
    /// Enables the default picker of the artist.
    fn set_pickable(&self, _pickable: bool) {}
    /// Removes the artist from its figure. Called when EOmaps drops the artist for good.
    fn detach(&self) {}
    /// Used for downcasting into the host's concrete artist type.
    fn as_any(&self) -> &dyn Any;
}

/// Label prefix of the axes of inset maps.
pub const INSET_AXES_LABEL: &str = "inset_map";

/// Returns true if both references point to the same artist.
pub fn same_artist(a: &ArtistRef, b: &ArtistRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

pub(crate) fn is_inset_artist(artist: &dyn Artist) -> bool {
    artist
        .axes_label()
        .is_some_and(|label| label.starts_with(INSET_AXES_LABEL))
}

/// Error of drawing a single artist.
#[derive(Debug, Error)]
#[error("failed to draw {artist}: {reason}")]
pub struct DrawError {
    /// Description of the artist.
    pub artist: String,
    /// What went wrong.
    pub reason: String,
}

/// Events of the host canvas EOmaps connects to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CanvasEvent {
    /// The host finished a full draw of the figure.
    Draw,
}

/// Identifier of a connection to a [`CanvasEvent`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// The host canvas.
pub trait Canvas {
    /// Size of the canvas in pixels.
    fn size(&self) -> Size;
    /// Returns false if the canvas has no renderer to draw with at the moment.
    fn has_renderer(&self) -> bool;
    /// Returns true while the figure is exported into a vector format. Background fetching is
    /// skipped then, as the host's own draw path is used for the export.
    fn is_saving(&self) -> bool {
        false
    }
    /// Returns true while an interactive toolbar mode (pan, zoom) is active.
    fn toolbar_active(&self) -> bool {
        false
    }
    /// Clears the drawing buffer of the renderer.
    fn clear(&mut self);
    /// Shows or hides the background patches of all axes so they are not composited twice.
    fn set_axes_patches_visible(&mut self, _visible: bool) {}
    /// Draws the artist into the drawing buffer.
    fn draw_artist(&mut self, artist: &dyn Artist) -> Result<(), DrawError>;
    /// Copies a region (or the whole buffer if `bbox` is `None`) of the drawing buffer.
    fn copy_region(&mut self, bbox: Option<Rect>) -> Raster;
    /// Writes a previously copied raster back into the drawing buffer.
    fn restore_region(&mut self, raster: &Raster);
    /// Connects to a canvas event.
    fn connect(&mut self, event: CanvasEvent) -> ConnectionId;
    /// Removes a connection created with [`Canvas::connect`].
    fn disconnect(&mut self, id: ConnectionId);
    /// Presents the drawing buffer on the screen (blocking). `bbox` restricts the update to a
    /// sub-region.
    fn present(&mut self, bbox: Option<Rect>);
}
