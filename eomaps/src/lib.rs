//! EOmaps core: layered map plotting with cached backgrounds and interactive callbacks.
//!
//! The crate does not draw anything by itself. A host toolkit provides a [`Canvas`] that can
//! draw [`Artist`]s, copy and restore pixel regions and present its buffer. On top of it EOmaps
//! manages:
//!
//! * named layers, including combined layers like `"ocean|clouds{0.5}"`, whose backgrounds
//!   are drawn once and cached by the [`BlitManager`];
//! * datasets attached to map-views, re-sliced to the visible extent and turned into
//!   collections by a [`Shape`](data_manager::Shape) when their layer is fetched;
//! * a nearest-neighbour [`SearchTree`](search_tree::SearchTree) used to pick data points;
//! * click, move, pick and keypress [`callbacks`](control) dispatched to the map-views under
//!   the pointer, with optional forwarding of events between map-views.
//!
//! Everything is tied together by the [`Figure`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eomaps::control::AttachOptions;
//! use eomaps::eomaps_types::geo::Crs;
//! use eomaps::render::Canvas;
//! use eomaps::view::AxesId;
//! use eomaps::{BlitManagerConfig, Figure};
//!
//! fn build(canvas: Box<dyn Canvas>) -> Result<Figure, eomaps::EomapsError> {
//!     let mut figure = Figure::new(canvas, BlitManagerConfig::default());
//!     let maps = figure.new_maps("ocean", Crs::WEB_MERCATOR, AxesId(0))?;
//!     if let Some(maps) = figure.maps_mut(maps) {
//!         maps.click_mut()
//!             .attach_print_to_console(AttachOptions::default().with_modifier("control"));
//!     }
//!     figure.show_layer(["ocean"])?;
//!     Ok(figure)
//! }
//! ```

pub mod blit;
mod color;
pub mod control;
pub mod data_manager;
pub mod error;
mod figure;
pub mod layer_name;
mod maps;
mod messenger;
pub mod render;
pub mod search_tree;
pub mod view;

#[cfg(test)]
mod tests;

pub use blit::{BlitManager, BlitManagerConfig, UpdateRequest};
pub use color::Color;
pub use error::EomapsError;
pub use figure::Figure;
pub use maps::{Maps, MapsHandle};
pub use messenger::{DummyMessenger, Messenger};
pub use render::{Artist, ArtistRef, Canvas};
pub use view::{AxesId, MapView};

// Reexport eomaps_types
pub use eomaps_types;
