//! Test doubles of the host canvas and its artists.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eomaps_types::cartesian::{Rect, Size};
use parking_lot::Mutex;

use crate::color::Color;
use crate::data_manager::{DataSubset, Dataset, Shape};
use crate::error::EomapsError;
use crate::messenger::Messenger;
use crate::render::{Artist, ArtistRef, Canvas, CanvasEvent, ConnectionId, DrawError, Raster};

const CANVAS_SIZE: u32 = 4;

/// Canvas that fills its buffer with the colour of every drawn artist and records all calls.
#[derive(Debug)]
pub struct TestCanvas {
    buffer: Raster,
    draws: Vec<String>,
    next_connection: u64,
    pub copies: usize,
    pub restores: usize,
    pub presents: Vec<Option<Rect>>,
    pub connections: Vec<ConnectionId>,
    pub disconnects: usize,
    pub saving: bool,
    pub renderer: bool,
    pub toolbar: bool,
}

impl Default for TestCanvas {
    fn default() -> Self {
        Self {
            buffer: Raster::transparent(CANVAS_SIZE, CANVAS_SIZE),
            draws: vec![],
            next_connection: 0,
            copies: 0,
            restores: 0,
            presents: vec![],
            connections: vec![],
            disconnects: 0,
            saving: false,
            renderer: true,
            toolbar: false,
        }
    }
}

impl TestCanvas {
    /// Names of all successfully drawn artists in drawing order.
    pub fn drawn(&self) -> Vec<String> {
        self.draws.clone()
    }

    /// Current content of the drawing buffer.
    pub fn buffer(&self) -> &Raster {
        &self.buffer
    }
}

impl Canvas for TestCanvas {
    fn size(&self) -> Size {
        Size::new(CANVAS_SIZE as f64, CANVAS_SIZE as f64)
    }

    fn has_renderer(&self) -> bool {
        self.renderer
    }

    fn is_saving(&self) -> bool {
        self.saving
    }

    fn toolbar_active(&self) -> bool {
        self.toolbar
    }

    fn clear(&mut self) {
        self.buffer = Raster::transparent(CANVAS_SIZE, CANVAS_SIZE);
    }

    fn draw_artist(&mut self, artist: &dyn Artist) -> Result<(), DrawError> {
        let Some(artist) = artist.as_any().downcast_ref::<TestArtist>() else {
            return Err(DrawError {
                artist: format!("{artist:?}"),
                reason: "unknown artist type".into(),
            });
        };

        if artist.failing {
            return Err(DrawError {
                artist: artist.name.clone(),
                reason: "artist always fails".into(),
            });
        }

        if !artist.is_visible() {
            return Ok(());
        }

        self.buffer
            .composite(&Raster::filled(CANVAS_SIZE, CANVAS_SIZE, artist.color), 1.0);
        self.draws.push(artist.name.clone());
        artist.state.lock().stale = false;

        Ok(())
    }

    fn copy_region(&mut self, bbox: Option<Rect>) -> Raster {
        self.copies += 1;
        self.buffer.clone().with_bbox(bbox)
    }

    fn restore_region(&mut self, raster: &Raster) {
        self.restores += 1;
        self.buffer = raster.clone();
    }

    fn connect(&mut self, _event: CanvasEvent) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.push(id);
        id
    }

    fn disconnect(&mut self, id: ConnectionId) {
        self.connections.retain(|c| *c != id);
        self.disconnects += 1;
    }

    fn present(&mut self, bbox: Option<Rect>) {
        self.presents.push(bbox);
    }
}

#[derive(Debug)]
struct ArtistState {
    animated: bool,
    visible: bool,
    stale: bool,
    detached: bool,
    pickable: bool,
}

impl Default for ArtistState {
    fn default() -> Self {
        Self {
            animated: false,
            visible: true,
            stale: false,
            detached: false,
            pickable: false,
        }
    }
}

/// Artist drawn as a flat fill of its colour.
#[derive(Debug)]
pub struct TestArtist {
    name: String,
    color: Color,
    zorder: f64,
    label: Option<String>,
    failing: bool,
    state: Mutex<ArtistState>,
}

impl Default for TestArtist {
    fn default() -> Self {
        Self::new("artist")
    }
}

impl TestArtist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Color::RED,
            zorder: 0.0,
            label: None,
            failing: false,
            state: Mutex::new(ArtistState::default()),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_zorder(mut self, zorder: f64) -> Self {
        self.zorder = zorder;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Drawing the artist always fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    pub fn is_pickable(&self) -> bool {
        self.state.lock().pickable
    }

    pub fn is_animated(&self) -> bool {
        self.state.lock().animated
    }

    pub fn set_stale(&self, stale: bool) {
        self.state.lock().stale = stale;
    }
}

impl Artist for TestArtist {
    fn set_animated(&self, animated: bool) {
        self.state.lock().animated = animated;
    }

    fn zorder(&self) -> f64 {
        self.zorder
    }

    fn is_stale(&self) -> bool {
        self.state.lock().stale
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn set_visible(&self, visible: bool) {
        self.state.lock().visible = visible;
    }

    fn axes_label(&self) -> Option<String> {
        self.label.clone()
    }

    fn has_axes(&self) -> bool {
        !self.state.lock().detached
    }

    fn set_pickable(&self, pickable: bool) {
        self.state.lock().pickable = pickable;
    }

    fn detach(&self) {
        self.state.lock().detached = true;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shape with a fixed radius creating a [`TestArtist`] collection named after the number of
/// points it shows.
#[derive(Debug)]
pub struct TestShape {
    radius: f64,
}

impl TestShape {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl Shape for TestShape {
    fn name(&self) -> &str {
        "test"
    }

    fn radius(&self, _dataset: &Dataset) -> Option<(f64, f64)> {
        Some((self.radius, self.radius))
    }

    fn create_collection(&self, subset: &DataSubset, _n: usize) -> Result<ArtistRef, EomapsError> {
        Ok(Arc::new(TestArtist::new(format!(
            "collection_{}",
            subset.len()
        ))))
    }

    fn value_color(&self, value: f64) -> Option<Color> {
        let v = (value.clamp(0.0, 1.0) * 255.0) as u8;
        Some(Color::gray(v))
    }
}

/// Messenger counting redraw requests.
#[derive(Debug, Clone, Default)]
pub struct TestMessenger(Arc<AtomicUsize>);

impl TestMessenger {
    pub fn requests(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl Messenger for TestMessenger {
    fn request_redraw(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Enables log output of the tests (`RUST_LOG=debug cargo test`).
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
