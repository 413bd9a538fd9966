//! Background-blit manager.
//!
//! Artists are grouped into named layers. Background artists of a layer are drawn once into a
//! cached raster; on every update the cached raster of the active layer is restored to the
//! canvas, dynamic artists are drawn on top and the result is presented. Combined layers
//! (`"A|B{0.5}"`) are composited from the cached rasters of their parts.

mod artists;
mod cache;
mod layer_callbacks;

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
pub use artists::{sort_by_stacking, ArtistRegistry};
pub use cache::{BackgroundCache, DEFAULT_COMBINE_MEMO_CAPACITY};
use eomaps_types::cartesian::Rect;
pub use layer_callbacks::{LayerCallback, LayerCallbackId, LayerCallbacks, LayerChange};
use log::{debug, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CallbackResult, EomapsError};
use crate::layer_name::{
    inset_layer, is_combined, is_private, is_subset, parse_multi, simple_names, ALL_LAYER,
    BG_LAYER, SPINES_LAYER,
};
use crate::messenger::{DummyMessenger, Messenger};
use crate::render::{same_artist, ArtistRef, Canvas, CanvasEvent, ConnectionId, Raster};
use crate::view::{AxesId, MapView};

/// Name of the layer that is active when a blit manager is created.
pub const DEFAULT_LAYER: &str = "base";

/// Configuration of a [`BlitManager`].
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlitManagerConfig {
    combine_memo_capacity: usize,
    clear_on_layer_change: bool,
    transparent_background: bool,
}

impl Default for BlitManagerConfig {
    fn default() -> Self {
        Self {
            combine_memo_capacity: DEFAULT_COMBINE_MEMO_CAPACITY,
            clear_on_layer_change: false,
            transparent_background: false,
        }
    }
}

impl BlitManagerConfig {
    /// Number of composited combined-layer rasters kept in memory.
    pub fn combine_memo_capacity(&self) -> usize {
        self.combine_memo_capacity
    }

    /// Sets the number of composited combined-layer rasters kept in memory.
    pub fn with_combine_memo_capacity(mut self, capacity: usize) -> Self {
        self.combine_memo_capacity = capacity;
        self
    }

    /// Sets the number of composited combined-layer rasters kept in memory.
    pub fn set_combine_memo_capacity(&mut self, capacity: usize) {
        self.combine_memo_capacity = capacity;
    }

    /// If set, temporary artists (markers, annotations) are removed when the layer changes.
    pub fn clear_on_layer_change(&self) -> bool {
        self.clear_on_layer_change
    }

    /// Sets whether temporary artists are removed when the layer changes.
    pub fn with_clear_on_layer_change(mut self, clear: bool) -> Self {
        self.clear_on_layer_change = clear;
        self
    }

    /// Sets whether temporary artists are removed when the layer changes.
    pub fn set_clear_on_layer_change(&mut self, clear: bool) {
        self.clear_on_layer_change = clear;
    }

    /// If set, the figure background layer is not part of the shown layer.
    pub fn transparent_background(&self) -> bool {
        self.transparent_background
    }

    /// Sets whether the figure background layer is omitted.
    pub fn with_transparent_background(mut self, transparent: bool) -> Self {
        self.transparent_background = transparent;
        self
    }

    /// Sets whether the figure background layer is omitted.
    pub fn set_transparent_background(&mut self, transparent: bool) {
        self.transparent_background = transparent;
    }
}

/// Action executed before the background of a layer is drawn.
///
/// Hooks can add or remove background artists of the layer, e.g. to re-slice a dataset to the
/// current extent.
pub trait FetchHook {
    /// Called with the name of the simple layer that is about to be fetched.
    fn before_fetch(&mut self, layer: &str, bm: &mut BlitManager);
}

/// Identifier of a hook or observer registered with a [`BlitManager`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HookId(u64);

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(0);

impl HookId {
    fn next() -> Self {
        Self(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Single-shot action executed with the canvas during an update.
pub type CanvasAction = Box<dyn FnOnce(&mut dyn Canvas)>;

type UpdateHook = Box<dyn FnMut(&mut BlitManager)>;

/// Kind of change reported to artist observers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArtistEventKind {
    /// The artist was added.
    Added,
    /// The artist was removed.
    Removed,
}

/// Change of the background artists of a layer.
#[derive(Debug, Clone)]
pub struct ArtistEvent {
    /// The changed artist.
    pub artist: ArtistRef,
    /// Layer of the artist.
    pub layer: String,
    /// Whether the artist was added or removed.
    pub kind: ArtistEventKind,
}

type ArtistObserver = Box<dyn FnMut(&ArtistEvent)>;

/// Hooks that can be taken out while they run and restored afterwards, keeping hooks that were
/// added or removed in between.
struct Hooks<T> {
    entries: Vec<(HookId, T)>,
    running: bool,
    removed: Vec<HookId>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            entries: vec![],
            running: false,
            removed: vec![],
        }
    }
}

impl<T> Hooks<T> {
    fn add(&mut self, hook: T) -> HookId {
        let id = HookId::next();
        self.entries.push((id, hook));
        id
    }

    fn remove(&mut self, id: HookId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        if self.entries.len() != before {
            return true;
        }

        if self.running {
            self.removed.push(id);
            return true;
        }

        false
    }

    fn take(&mut self) -> Vec<(HookId, T)> {
        self.running = true;
        std::mem::take(&mut self.entries)
    }

    fn restore(&mut self, mut taken: Vec<(HookId, T)>) {
        taken.append(&mut self.entries);
        let removed = std::mem::take(&mut self.removed);
        taken.retain(|(id, _)| !removed.contains(id));
        self.entries = taken;
        self.running = false;
    }
}

/// Parameters of [`BlitManager::update`].
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    layers: Option<Vec<String>>,
    artists: Vec<ArtistRef>,
    clear: Option<String>,
    blit: bool,
    bbox: Option<Rect>,
}

impl Default for UpdateRequest {
    fn default() -> Self {
        Self {
            layers: None,
            artists: vec![],
            clear: None,
            blit: true,
            bbox: None,
        }
    }
}

impl UpdateRequest {
    /// Draws the dynamic artists of the given layers instead of the active ones.
    pub fn with_layers(mut self, layers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.layers = Some(layers.into_iter().map(Into::into).collect());
        self
    }

    /// Additionally draws the given artists.
    pub fn with_artists(mut self, artists: impl IntoIterator<Item = ArtistRef>) -> Self {
        self.artists = artists.into_iter().collect();
        self
    }

    /// Removes the temporary artists of the given interaction method before updating.
    pub fn with_clear(mut self, method: impl Into<String>) -> Self {
        self.clear = Some(method.into());
        self
    }

    /// Sets whether the canvas is presented after the update.
    pub fn with_blit(mut self, blit: bool) -> Self {
        self.blit = blit;
        self
    }

    /// Restricts the presented region.
    pub fn with_bbox(mut self, bbox: Rect) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Manages the layers of a figure and the cached backgrounds of the layers.
pub struct BlitManager {
    config: BlitManagerConfig,
    bg_artists: ArtistRegistry,
    artists: ArtistRegistry,
    cache: BackgroundCache,
    bg_layer: String,
    refetch_all: bool,
    refetch_layers: Vec<String>,
    layer_callbacks: LayerCallbacks,
    layer_change_running: bool,
    removed_layer_callbacks: Vec<LayerCallbackId>,
    fetch_hooks: Hooks<Box<dyn FetchHook>>,
    update_hooks: Hooks<UpdateHook>,
    after_restore: VecDeque<CanvasAction>,
    after_update: VecDeque<CanvasAction>,
    temp_artists: AHashMap<String, Vec<(ArtistRef, String)>>,
    layer_bound: Vec<(ArtistRef, String)>,
    observers: Hooks<ArtistObserver>,
    messenger: Box<dyn Messenger>,
    draw_connection: Option<ConnectionId>,
    full_redraw: bool,
    views: AHashMap<AxesId, MapView>,
    layout_editing: bool,
}

impl std::fmt::Debug for BlitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlitManager")
            .field("config", &self.config)
            .field("bg_layer", &self.bg_layer)
            .field("bg_artists", &self.bg_artists)
            .field("artists", &self.artists)
            .field("cache", &self.cache)
            .field("layer_callbacks", &self.layer_callbacks)
            .finish()
    }
}

impl Default for BlitManager {
    fn default() -> Self {
        Self::new(BlitManagerConfig::default())
    }
}

impl BlitManager {
    /// Creates a new blit manager with [`DEFAULT_LAYER`] active.
    pub fn new(config: BlitManagerConfig) -> Self {
        Self {
            config,
            bg_artists: ArtistRegistry::default(),
            artists: ArtistRegistry::default(),
            cache: BackgroundCache::new(config.combine_memo_capacity),
            bg_layer: DEFAULT_LAYER.to_string(),
            refetch_all: false,
            refetch_layers: vec![],
            layer_callbacks: LayerCallbacks::default(),
            layer_change_running: false,
            removed_layer_callbacks: vec![],
            fetch_hooks: Hooks::default(),
            update_hooks: Hooks::default(),
            after_restore: VecDeque::new(),
            after_update: VecDeque::new(),
            temp_artists: AHashMap::new(),
            layer_bound: vec![],
            observers: Hooks::default(),
            messenger: Box::new(DummyMessenger),
            draw_connection: None,
            full_redraw: true,
            views: AHashMap::new(),
            layout_editing: false,
        }
    }

    /// Configuration of the blit manager.
    pub fn config(&self) -> BlitManagerConfig {
        self.config
    }

    /// Sets the messenger used to request redraws from the host. `None` resets it to a
    /// [`DummyMessenger`].
    pub fn set_messenger(&mut self, messenger: Option<Box<dyn Messenger>>) {
        self.messenger = messenger.unwrap_or_else(|| Box::new(DummyMessenger));
    }

    /// Requests an idle redraw from the host.
    pub fn request_redraw(&self) {
        self.messenger.request_redraw();
    }

    /// The cached backgrounds.
    pub fn cache(&self) -> &BackgroundCache {
        &self.cache
    }

    /// Adds a background artist to the layer.
    ///
    /// The cached backgrounds of the layer and of all combined layers containing it are dropped
    /// immediately. If `draw` is set, a redraw is requested from the host.
    pub fn add_bg_artist(&mut self, artist: ArtistRef, layer: &str, draw: bool) {
        artist.set_animated(true);
        if !self.bg_artists.add(artist.clone(), layer) {
            return;
        }

        self.cache.invalidate_layer(layer);
        self.notify_observers(ArtistEvent {
            artist,
            layer: layer.to_string(),
            kind: ArtistEventKind::Added,
        });

        if draw {
            self.request_redraw();
        }
    }

    /// Removes a background artist. If `layer` is `None`, the artist is looked up in all layers.
    ///
    /// Returns false if the artist is not a background artist of the layer.
    pub fn remove_bg_artist(&mut self, artist: &ArtistRef, layer: Option<&str>, draw: bool) -> bool {
        let Some(layer) = self.bg_artists.remove(artist, layer) else {
            return false;
        };

        self.cache.invalidate_layer(&layer);
        self.notify_observers(ArtistEvent {
            artist: artist.clone(),
            layer,
            kind: ArtistEventKind::Removed,
        });

        if draw {
            self.request_redraw();
        }

        true
    }

    /// Adds a dynamic artist to the layer. Dynamic artists are drawn on every update.
    pub fn add_artist(&mut self, artist: ArtistRef, layer: &str) {
        artist.set_animated(true);
        self.artists.add(artist, layer);
    }

    /// Removes a dynamic artist. If `layer` is `None`, the artist is looked up in all layers.
    pub fn remove_artist(&mut self, artist: &ArtistRef, layer: Option<&str>) -> bool {
        self.artists.remove(artist, layer).is_some()
    }

    /// Adds a dynamic artist that is removed when the temporary artists of `method` are
    /// cleared (see [`BlitManager::clear_temp_artists`]).
    pub fn add_temp_artist(&mut self, artist: ArtistRef, layer: &str, method: &str) {
        self.add_artist(artist.clone(), layer);
        self.temp_artists
            .entry(method.to_string())
            .or_default()
            .push((artist, layer.to_string()));
    }

    /// Adds an artist (a colorbar or a legend) that is only visible while its layer is part of
    /// the active layer.
    pub fn add_layer_bound_artist(&mut self, artist: ArtistRef, layer: &str) {
        artist.set_visible(self.is_layer_visible(layer));
        self.layer_bound.push((artist, layer.to_string()));
    }

    /// Removes a layer-bound artist.
    pub fn remove_layer_bound_artist(&mut self, artist: &ArtistRef) -> bool {
        let before = self.layer_bound.len();
        self.layer_bound.retain(|(a, _)| !same_artist(a, artist));
        self.layer_bound.len() != before
    }

    /// Background artists of the layer in drawing order.
    pub fn get_bg_artists(&self, layer: &str) -> Vec<ArtistRef> {
        self.bg_artists.sorted(layer)
    }

    /// Dynamic artists of the layer in drawing order.
    pub fn get_artists(&self, layer: &str) -> Vec<ArtistRef> {
        self.artists.sorted(layer)
    }

    /// Names of all public layers that have artists, sorted.
    pub fn all_layers(&self) -> Vec<String> {
        let mut layers: Vec<String> = self
            .bg_artists
            .layers()
            .chain(self.artists.layers())
            .chain(std::iter::once(self.bg_layer.as_str()))
            .filter(|layer| !is_private(layer) && !is_combined(layer))
            .map(str::to_string)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        layers.sort();
        layers
    }

    /// Simple layers of the active layer.
    pub fn active_layers(&self) -> Vec<String> {
        simple_names(&self.bg_layer)
    }

    /// Names of all layers with a cached background, sorted.
    pub fn cached_layers(&self) -> Vec<String> {
        let mut layers: Vec<String> = self.cache.layers().map(str::to_string).collect();
        layers.sort();
        layers
    }

    /// The active (possibly combined) layer.
    pub fn bg_layer(&self) -> &str {
        &self.bg_layer
    }

    /// Activates a layer.
    ///
    /// The next presentation redraws the whole canvas. Layer-change callbacks are executed,
    /// layer-bound artists are shown or hidden and, if configured, temporary artists are
    /// removed.
    pub fn set_bg_layer(&mut self, layer: &str) -> Result<(), EomapsError> {
        parse_multi(layer)?;

        let previous = std::mem::replace(&mut self.bg_layer, layer.to_string());
        let changed = simple_names(&previous).into_iter().collect::<HashSet<_>>()
            != simple_names(layer).into_iter().collect::<HashSet<_>>();

        self.full_redraw = true;
        self.run_layer_callbacks(LayerChange {
            layer: layer.to_string(),
            previous,
            changed,
        });

        for (artist, bound_layer) in &self.layer_bound {
            artist.set_visible(self.is_layer_visible(bound_layer));
        }

        if self.config.clear_on_layer_change {
            self.clear_temp_artists("on_layer_change");
        }

        self.request_redraw();
        Ok(())
    }

    fn is_layer_visible(&self, layer: &str) -> bool {
        layer == ALL_LAYER || is_subset(layer, &self.bg_layer)
    }

    /// Registers a layer-change callback.
    ///
    /// With `layer == None` the callback is executed on every layer activation, otherwise only
    /// when the given simple layer is part of the activated layer. Single-shot callbacks
    /// (`persistent == false`) are removed after their first execution.
    pub fn on_layer(
        &mut self,
        callback: impl FnMut(&LayerChange, &mut BlitManager) -> CallbackResult + 'static,
        layer: Option<&str>,
        persistent: bool,
    ) -> LayerCallbackId {
        self.layer_callbacks
            .add(Box::new(callback), layer, persistent)
    }

    /// Removes a layer-change callback.
    pub fn remove_layer_callback(&mut self, id: LayerCallbackId) -> bool {
        if self.layer_callbacks.remove(id) {
            return true;
        }

        if self.layer_change_running {
            self.removed_layer_callbacks.push(id);
            return true;
        }

        false
    }

    fn run_layer_callbacks(&mut self, change: LayerChange) {
        if self.layer_change_running {
            debug!(
                "Layer change to {:?} while layer callbacks are running; callbacks skipped",
                change.layer
            );
            return;
        }

        let mut callbacks = std::mem::take(&mut self.layer_callbacks);
        self.layer_change_running = true;
        callbacks.run(&change, self);
        self.layer_change_running = false;

        let added = std::mem::replace(&mut self.layer_callbacks, callbacks);
        self.layer_callbacks.merge(added);
        for id in std::mem::take(&mut self.removed_layer_callbacks) {
            self.layer_callbacks.remove(id);
        }
    }

    /// Executes the single-shot layer-change callbacks for a layer that is fetched as a part
    /// of a combined layer.
    fn run_layer_activation(&mut self, layer: &str) {
        self.run_layer_callbacks(LayerChange {
            layer: layer.to_string(),
            previous: self.bg_layer.clone(),
            changed: false,
        });
    }

    /// Registers a hook executed before the background of a simple layer is drawn.
    pub fn add_fetch_hook(&mut self, hook: impl FetchHook + 'static) -> HookId {
        self.fetch_hooks.add(Box::new(hook))
    }

    /// Removes a before-fetch hook.
    pub fn remove_fetch_hook(&mut self, id: HookId) -> bool {
        self.fetch_hooks.remove(id)
    }

    fn run_fetch_hooks(&mut self, layer: &str) {
        let mut hooks = self.fetch_hooks.take();
        for (_, hook) in hooks.iter_mut() {
            hook.before_fetch(layer, self);
        }
        self.fetch_hooks.restore(hooks);
    }

    /// Registers a hook executed at the beginning of every update.
    pub fn add_update_hook(&mut self, hook: impl FnMut(&mut BlitManager) + 'static) -> HookId {
        self.update_hooks.add(Box::new(hook))
    }

    /// Removes a before-update hook.
    pub fn remove_update_hook(&mut self, id: HookId) -> bool {
        self.update_hooks.remove(id)
    }

    fn run_update_hooks(&mut self) {
        let mut hooks = self.update_hooks.take();
        for (_, hook) in hooks.iter_mut() {
            hook(self);
        }
        self.update_hooks.restore(hooks);
    }

    /// Registers an observer of added and removed background artists.
    pub fn add_artist_observer(&mut self, observer: impl FnMut(&ArtistEvent) + 'static) -> HookId {
        self.observers.add(Box::new(observer))
    }

    /// Removes an artist observer.
    pub fn remove_artist_observer(&mut self, id: HookId) -> bool {
        self.observers.remove(id)
    }

    fn notify_observers(&mut self, event: ArtistEvent) {
        for (_, observer) in self.observers.entries.iter_mut() {
            observer(&event);
        }
    }

    /// Queues an action executed once after the background is restored during the next update.
    pub fn after_restore(&mut self, action: impl FnOnce(&mut dyn Canvas) + 'static) {
        self.after_restore.push_back(Box::new(action));
    }

    /// Queues an action executed once at the end of the next update.
    pub fn after_update(&mut self, action: impl FnOnce(&mut dyn Canvas) + 'static) {
        self.after_update.push_back(Box::new(action));
    }

    /// Sets the view of an axes. Changing the extent drops all cached backgrounds.
    pub fn set_view(&mut self, axes: AxesId, view: MapView) {
        let changed = self
            .views
            .get(&axes)
            .map_or(true, |current| current.extent() != view.extent());

        self.views.insert(axes, view);
        if changed {
            self.refetch_all();
            self.request_redraw();
        }
    }

    /// View of the axes.
    pub fn view(&self, axes: AxesId) -> Option<&MapView> {
        self.views.get(&axes)
    }

    /// Returns true while the host's layout editor is active. Datasets are not re-sliced then.
    pub fn layout_editing(&self) -> bool {
        self.layout_editing
    }

    /// Sets whether the host's layout editor is active.
    pub fn set_layout_editing(&mut self, editing: bool) {
        self.layout_editing = editing;
    }

    /// Drops the cached background of the layer on the next draw event or update.
    pub fn refetch_layer(&mut self, layer: &str) {
        if layer == ALL_LAYER {
            self.refetch_all();
        } else if !self.refetch_layers.iter().any(|l| l == layer) {
            self.refetch_layers.push(layer.to_string());
        }
    }

    /// Drops all cached backgrounds on the next draw event or update.
    pub fn refetch_all(&mut self) {
        self.refetch_all = true;
    }

    fn apply_refetch(&mut self) {
        if self.refetch_all {
            self.cache.clear();
            self.refetch_all = false;
            self.refetch_layers.clear();
            return;
        }

        while let Some(layer) = self.refetch_layers.pop() {
            self.cache.invalidate_layer(&layer);
        }
    }

    /// Connects the draw event of the canvas to the blit manager.
    pub fn connect(&mut self, canvas: &mut dyn Canvas) {
        if self.draw_connection.is_none() {
            self.draw_connection = Some(canvas.connect(CanvasEvent::Draw));
        }
    }

    /// Disconnects the draw event of the canvas.
    pub fn disconnect(&mut self, canvas: &mut dyn Canvas) {
        if let Some(id) = self.draw_connection.take() {
            canvas.disconnect(id);
        }
    }

    /// Returns true if the draw event is connected.
    pub fn is_connected(&self) -> bool {
        self.draw_connection.is_some()
    }

    /// Handles a draw event of the canvas.
    ///
    /// Pending refetches are applied and the background of the shown layer is prepared for the
    /// next presentation. Events received while a background is fetched are ignored.
    pub fn on_draw(&mut self, canvas: &mut dyn Canvas) {
        if self.draw_connection.is_none() {
            return;
        }

        self.update(canvas, UpdateRequest::default().with_blit(false));
    }

    /// Name of the layer restored on update: the active layer together with the figure
    /// background, the inset maps of the active layers and the axes spines.
    pub fn show_layer_name(&self) -> String {
        let mut parts = vec![];
        if !self.config.transparent_background {
            parts.push(BG_LAYER.to_string());
        }

        parts.push(self.bg_layer.clone());
        for layer in simple_names(&self.bg_layer) {
            let inset = inset_layer(&layer);
            if self.bg_artists.contains_layer(&inset) {
                parts.push(inset);
            }
        }
        parts.push(SPINES_LAYER.to_string());

        parts.join("|")
    }

    /// Draws the background of the layer into the cache.
    ///
    /// Does nothing if the layer is cached already (unless a `bbox` is given), if the host is
    /// saving the figure or if no renderer is available. Combined layers are composited from
    /// their parts.
    pub fn fetch_bg(&mut self, canvas: &mut dyn Canvas, layer: Option<&str>, bbox: Option<Rect>) {
        let layer = layer.map_or_else(|| self.bg_layer.clone(), str::to_string);
        if bbox.is_none() && self.cache.contains(&layer) {
            return;
        }

        if canvas.is_saving() || !canvas.has_renderer() {
            return;
        }

        if is_combined(&layer) {
            self.combine_bgs(canvas, &layer);
        } else {
            self.fetch_simple(canvas, &layer, bbox);
        }
    }

    fn fetch_simple(&mut self, canvas: &mut dyn Canvas, layer: &str, bbox: Option<Rect>) {
        let connection = self.draw_connection.take();
        if let Some(id) = connection {
            canvas.disconnect(id);
        }

        canvas.clear();
        canvas.set_axes_patches_visible(false);

        self.run_fetch_hooks(layer);

        let artists = self.sorted_bg_artists(layer);
        let any_stale = artists.iter().any(|artist| artist.is_stale());

        if any_stale || !self.cache.contains(layer) {
            for artist in &artists {
                if let Err(err) = canvas.draw_artist(artist.as_ref()) {
                    debug!("Skipping artist {artist:?} of layer {layer:?}: {err}");
                }
            }

            let raster = canvas.copy_region(bbox);
            self.cache.insert(layer, raster);
        }

        canvas.set_axes_patches_visible(true);
        if connection.is_some() {
            self.draw_connection = Some(canvas.connect(CanvasEvent::Draw));
        }
    }

    fn sorted_bg_artists(&self, layer: &str) -> Vec<ArtistRef> {
        let mut artists = self.bg_artists.get(layer).to_vec();
        if layer != ALL_LAYER && !is_private(layer) {
            artists.extend_from_slice(self.bg_artists.get(ALL_LAYER));
        }
        sort_by_stacking(&mut artists);
        artists
    }

    /// Composites the cached backgrounds of the parts of a combined layer.
    ///
    /// Missing parts are fetched first, after executing their single-shot layer-change
    /// callbacks. The result is memoized until a part's background changes.
    pub fn combine_bgs(&mut self, canvas: &mut dyn Canvas, layer: &str) {
        let (names, alphas) = match parse_multi(layer) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Cannot combine layer {layer:?}: {err}");
                return;
            }
        };

        if let Some(raster) = self.cache.memo_get(layer).cloned() {
            self.cache.insert(layer, raster);
            return;
        }

        for name in &names {
            if !self.cache.contains(name) {
                self.run_layer_activation(name);
                self.fetch_bg(canvas, Some(name), None);
            }
        }

        let mut combined: Option<Raster> = None;
        for (name, alpha) in names.iter().zip(&alphas) {
            let Some(raster) = self.cache.get(name) else {
                debug!("Layer {name:?} is not cached, skipped in {layer:?}");
                continue;
            };

            combined
                .get_or_insert_with(|| Raster::transparent(raster.width(), raster.height()))
                .composite(raster, *alpha);
        }

        if let Some(raster) = combined {
            self.cache.memo_insert(layer, raster.clone());
            self.cache.insert(layer, raster);
        }
    }

    /// Fetches the backgrounds of the given layers without showing them.
    pub fn fetch_layers<'a>(
        &mut self,
        canvas: &mut dyn Canvas,
        layers: impl IntoIterator<Item = &'a str>,
    ) {
        for layer in layers {
            self.fetch_bg(canvas, Some(layer), None);
        }
    }

    /// Updates the canvas.
    ///
    /// Restores the background of the shown layer, executes the queued after-restore actions,
    /// draws the dynamic artists of the active layers and of the `all` layer, presents the
    /// canvas and executes the queued after-update actions.
    pub fn update(&mut self, canvas: &mut dyn Canvas, request: UpdateRequest) {
        self.run_update_hooks();
        self.apply_refetch();

        if let Some(method) = &request.clear {
            self.clear_temp_artists(method);
        }

        let show_layer = self.show_layer_name();
        self.fetch_bg(canvas, Some(&show_layer), None);
        if let Some(raster) = self.cache.get(&show_layer) {
            canvas.restore_region(raster);
        }

        while let Some(action) = self.after_restore.pop_front() {
            action(canvas);
        }

        let layers = request
            .layers
            .unwrap_or_else(|| simple_names(&self.bg_layer));
        let mut artists = self.dynamic_artists(&layers);
        for artist in request.artists {
            if !artists.iter().any(|a| same_artist(a, &artist)) {
                artists.push(artist);
            }
        }

        self.draw_artists(canvas, &artists);

        if request.blit {
            let bbox = if self.full_redraw { None } else { request.bbox };
            canvas.present(bbox);
            self.full_redraw = false;
        }

        while let Some(action) = self.after_update.pop_front() {
            action(canvas);
        }
    }

    /// Restores the background of the shown layer, draws only the given artists and presents
    /// the canvas.
    pub fn blit_artists(&mut self, canvas: &mut dyn Canvas, artists: &[ArtistRef], bbox: Option<Rect>) {
        let show_layer = self.show_layer_name();
        self.fetch_bg(canvas, Some(&show_layer), None);
        if let Some(raster) = self.cache.get(&show_layer) {
            canvas.restore_region(raster);
        }

        self.draw_artists(canvas, artists);
        canvas.present(bbox);
    }

    fn draw_artists(&self, canvas: &mut dyn Canvas, artists: &[ArtistRef]) {
        for artist in artists {
            if let Err(err) = canvas.draw_artist(artist.as_ref()) {
                debug!("Skipping dynamic artist {artist:?}: {err}");
            }
        }
    }

    fn dynamic_artists(&self, layers: &[String]) -> Vec<ArtistRef> {
        let mut names: Vec<&str> = vec![];
        for layer in layers.iter().map(String::as_str).chain([ALL_LAYER]) {
            if !names.contains(&layer) {
                names.push(layer);
            }
        }

        let mut result: Vec<ArtistRef> = vec![];
        for layer in names {
            for artist in self.artists.sorted(layer) {
                if !result.iter().any(|a| same_artist(a, &artist)) {
                    result.push(artist);
                }
            }
        }

        result
    }

    /// Removes and detaches the temporary artists of an interaction method.
    ///
    /// Clearing `pick` also clears `click`; clearing `on_layer_change` also clears `pick`,
    /// `click` and `move`.
    pub fn clear_temp_artists(&mut self, method: &str) {
        let methods: &[&str] = match method {
            "pick" => &["pick", "click"],
            "on_layer_change" => &["on_layer_change", "pick", "click", "move"],
            _ => &[method],
        };

        for method in methods {
            let Some(entries) = self.temp_artists.remove(*method) else {
                continue;
            };

            for (artist, layer) in entries {
                self.artists.remove(&artist, Some(&layer));
                artist.detach();
            }
        }
    }

    /// Number of temporary artists registered for the interaction method.
    pub fn temp_artists_count(&self, method: &str) -> usize {
        self.temp_artists.get(method).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use eomaps_types::geo::Crs;
    use parking_lot::Mutex;

    use super::*;
    use crate::color::Color;
    use crate::render::Artist;
    use crate::tests::{TestArtist, TestCanvas, TestMessenger};

    fn artist(name: &str, color: Color) -> ArtistRef {
        Arc::new(TestArtist::new(name).with_color(color))
    }

    struct DataHook(Arc<Mutex<Vec<String>>>);

    impl FetchHook for DataHook {
        fn before_fetch(&mut self, layer: &str, bm: &mut BlitManager) {
            self.0.lock().push(layer.to_string());
            if layer == "A" {
                bm.add_bg_artist(Arc::new(TestArtist::new("data")), "A", false);
            }
        }
    }

    #[test]
    fn fetch_is_idempotent() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("a", Color::RED), "A", false);

        bm.fetch_bg(&mut canvas, Some("A"), None);
        bm.fetch_bg(&mut canvas, Some("A"), None);

        assert_eq!(canvas.drawn(), vec!["a".to_string()]);
        assert_eq!(canvas.copies, 1);
    }

    #[test]
    fn adding_artist_invalidates_layer() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("a", Color::RED), "A", false);
        bm.add_bg_artist(artist("b", Color::BLUE), "B", false);

        bm.fetch_bg(&mut canvas, Some("A|B"), None);
        assert_eq!(bm.cached_layers(), vec!["A", "A|B", "B"]);

        bm.add_bg_artist(artist("c", Color::GREEN), "A", false);
        assert_eq!(bm.cached_layers(), vec!["B"]);

        bm.fetch_bg(&mut canvas, Some("A"), None);
        assert!(bm.cache().contains("A"));
    }

    #[test]
    fn combined_layers_are_blended() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("a", Color::RED), "A", false);
        bm.add_bg_artist(artist("b", Color::BLUE), "B", false);

        bm.fetch_bg(&mut canvas, Some("A|B{0.5}"), None);
        let raster = bm.cache().get("A|B{0.5}").expect("combined layer is cached");
        for (x, y) in [(0, 0), (1, 2), (3, 3)] {
            let pixel = raster.pixel(x, y).expect("pixel inside the raster");
            assert_abs_diff_eq!(pixel.r() as f64, 128.0, epsilon = 1.0);
            assert_eq!(pixel.g(), 0);
            assert_abs_diff_eq!(pixel.b() as f64, 128.0, epsilon = 1.0);
            assert_eq!(pixel.a(), 255);
        }
    }

    #[test]
    fn combine_memo_is_bounded() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        for i in 0..11 {
            bm.add_bg_artist(artist("a", Color::RED), &format!("A{i}"), false);
            bm.add_bg_artist(artist("b", Color::BLUE), &format!("B{i}"), false);
        }
        for i in 0..11 {
            bm.fetch_bg(&mut canvas, Some(&format!("A{i}")), None);
            bm.fetch_bg(&mut canvas, Some(&format!("B{i}")), None);
        }
        for i in 0..11 {
            bm.fetch_bg(&mut canvas, Some(&format!("A{i}|B{i}")), None);
        }

        let cache = bm.cache();
        assert_eq!(cache.memo_len(), DEFAULT_COMBINE_MEMO_CAPACITY);
        assert!(cache.memo_peek("A0|B0").is_none());
        assert!(cache.memo_peek("A1|B1").is_some());
        assert!(cache.memo_peek("A10|B10").is_some());
    }

    #[test]
    fn memo_is_reused_until_constituent_changes() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("a", Color::RED), "A", false);
        bm.add_bg_artist(artist("b", Color::BLUE), "B", false);

        bm.fetch_bg(&mut canvas, Some("A|B"), None);
        assert_eq!(bm.cache().memo_len(), 1);

        bm.fetch_bg(&mut canvas, Some("A|B"), None);
        assert_eq!(canvas.drawn(), vec!["a", "b"]);

        bm.refetch_layer("B");
        bm.update(&mut canvas, UpdateRequest::default());
        assert_eq!(bm.cache().memo_len(), 0);
        assert!(!bm.cache().contains("A|B"));
        assert!(bm.cache().contains("A"));

        bm.fetch_bg(&mut canvas, Some("A|B"), None);
        assert_eq!(canvas.drawn(), vec!["a", "b", "b"]);
        assert!(bm.cache().memo_peek("A|B").is_some());
    }

    #[test]
    fn fetch_is_skipped_without_renderer() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("a", Color::RED), "A", false);

        canvas.saving = true;
        bm.fetch_bg(&mut canvas, Some("A"), None);
        canvas.saving = false;
        canvas.renderer = false;
        bm.fetch_bg(&mut canvas, Some("A"), None);

        assert!(canvas.drawn().is_empty());
        assert!(bm.cached_layers().is_empty());
    }

    #[test]
    fn failing_artist_does_not_abort_fetch() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(
            Arc::new(TestArtist::new("broken").with_zorder(1.0).failing()),
            "A",
            false,
        );
        bm.add_bg_artist(artist("ok", Color::RED), "A", false);

        bm.fetch_bg(&mut canvas, Some("A"), None);
        assert_eq!(canvas.drawn(), vec!["ok".to_string()]);
        assert!(bm.cache().contains("A"));
    }

    #[test]
    fn fetch_draws_all_layer_and_sorts_by_zorder() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(
            Arc::new(TestArtist::new("top").with_zorder(10.0)),
            "A",
            false,
        );
        bm.add_bg_artist(Arc::new(TestArtist::new("coastline")), "all", false);
        bm.add_bg_artist(Arc::new(TestArtist::new("patch")), BG_LAYER, false);

        bm.fetch_bg(&mut canvas, Some("A"), None);
        assert_eq!(canvas.drawn(), vec!["coastline", "top"]);

        bm.fetch_bg(&mut canvas, Some(BG_LAYER), None);
        assert_eq!(canvas.drawn(), vec!["coastline", "top", "patch"]);
    }

    #[test]
    fn fetch_disconnects_draw_event() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.connect(&mut canvas);
        bm.add_bg_artist(artist("a", Color::RED), "A", false);

        bm.fetch_bg(&mut canvas, Some("A"), None);
        assert!(bm.is_connected());
        assert_eq!(canvas.connections.len(), 1);
        assert_eq!(canvas.disconnects, 1);
    }

    #[test]
    fn fetch_hooks_run_before_drawing() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        let calls = Arc::new(Mutex::new(vec![]));
        let id = bm.add_fetch_hook(DataHook(calls.clone()));

        bm.fetch_bg(&mut canvas, Some("A"), None);
        assert_eq!(*calls.lock(), vec!["A".to_string()]);
        assert_eq!(canvas.drawn(), vec!["data"]);
        assert!(bm.cache().contains("A"));

        assert!(bm.remove_fetch_hook(id));
        bm.fetch_bg(&mut canvas, Some("B"), None);
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn layer_callback_order() {
        let mut bm = BlitManager::default();
        let calls = Arc::new(Mutex::new(vec![]));

        let c = calls.clone();
        bm.on_layer(
            move |_, _| {
                c.lock().push("P1");
                Ok(())
            },
            None,
            true,
        );
        let c = calls.clone();
        bm.on_layer(
            move |_, _| {
                c.lock().push("S1");
                Ok(())
            },
            None,
            false,
        );
        let c = calls.clone();
        bm.on_layer(
            move |_, _| {
                c.lock().push("P2");
                Ok(())
            },
            Some("X"),
            true,
        );

        bm.set_bg_layer("X").expect("valid layer");
        assert_eq!(*calls.lock(), vec!["P1", "S1", "P2"]);

        bm.set_bg_layer("X").expect("valid layer");
        assert_eq!(*calls.lock(), vec!["P1", "S1", "P2"]);

        bm.set_bg_layer("X{0.5}").expect("valid layer");
        assert_eq!(*calls.lock(), vec!["P1", "S1", "P2"]);

        bm.set_bg_layer("Y").expect("valid layer");
        assert_eq!(*calls.lock(), vec!["P1", "S1", "P2", "P1"]);
    }

    #[test]
    fn extent_change_keeps_persistent_layer_callbacks_quiet() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.connect(&mut canvas);
        bm.add_bg_artist(artist("a", Color::RED), "A", false);
        let view = MapView::new(Rect::new(0.0, 0.0, 10.0, 10.0), Crs::WEB_MERCATOR);
        bm.set_view(AxesId(0), view.clone());

        let calls = Arc::new(Mutex::new(vec![]));
        let c = calls.clone();
        bm.on_layer(
            move |change, _| {
                c.lock().push(change.layer.clone());
                Ok(())
            },
            None,
            true,
        );

        bm.set_bg_layer("A").expect("valid layer");
        bm.update(&mut canvas, UpdateRequest::default());
        assert_eq!(*calls.lock(), vec!["A".to_string()]);

        bm.set_view(AxesId(0), view.with_extent(Rect::new(0.0, 0.0, 5.0, 5.0)));
        bm.update(&mut canvas, UpdateRequest::default());
        bm.on_draw(&mut canvas);
        assert_eq!(*calls.lock(), vec!["A".to_string()]);
        assert!(bm.cache().contains("A"));
    }

    #[test]
    fn layer_callbacks_order_within_groups() {
        let mut bm = BlitManager::default();
        let calls = Arc::new(Mutex::new(vec![]));

        for (name, layer, persistent) in [
            ("g1", None, true),
            ("g2", None, true),
            ("s1", None, false),
            ("s2", None, false),
            ("x1", Some("X"), false),
            ("x2", Some("X"), false),
            ("y1", Some("Y"), true),
        ] {
            let c = calls.clone();
            bm.on_layer(
                move |_, _| {
                    c.lock().push(name);
                    Ok(())
                },
                layer,
                persistent,
            );
        }

        bm.set_bg_layer("X|Y{0.5}").expect("valid layer");
        assert_eq!(
            *calls.lock(),
            vec!["g2", "g1", "s1", "s2", "y1", "x1", "x2"]
        );
    }

    #[test]
    fn failing_layer_callback_does_not_stop_others() {
        let mut bm = BlitManager::default();
        let calls = Arc::new(Mutex::new(vec![]));

        bm.on_layer(|_, _| Err("broken".into()), None, false);
        let c = calls.clone();
        bm.on_layer(
            move |change, _| {
                c.lock().push(change.layer.clone());
                Ok(())
            },
            None,
            false,
        );

        bm.set_bg_layer("A").expect("valid layer");
        assert_eq!(*calls.lock(), vec!["A".to_string()]);
    }

    #[test]
    fn layer_callbacks_can_register_callbacks() {
        let mut bm = BlitManager::default();
        let calls = Arc::new(Mutex::new(vec![]));

        let c = calls.clone();
        bm.on_layer(
            move |_, bm| {
                let c = c.clone();
                bm.on_layer(
                    move |change, _| {
                        c.lock().push(change.layer.clone());
                        Ok(())
                    },
                    None,
                    false,
                );
                Ok(())
            },
            None,
            false,
        );

        bm.set_bg_layer("A").expect("valid layer");
        assert!(calls.lock().is_empty());
        bm.set_bg_layer("B").expect("valid layer");
        assert_eq!(*calls.lock(), vec!["B".to_string()]);
    }

    #[test]
    fn invalid_layer_is_rejected() {
        let mut bm = BlitManager::default();
        assert_matches!(bm.set_bg_layer("A{0.5"), Err(EomapsError::LayerName(_)));
        assert_eq!(bm.bg_layer(), DEFAULT_LAYER);
    }

    #[test]
    fn show_layer_name_includes_private_layers() {
        let mut bm = BlitManager::default();
        bm.set_bg_layer("A|B{0.5}").expect("valid layer");
        bm.add_bg_artist(artist("inset", Color::RED), &inset_layer("B"), false);

        assert_eq!(bm.show_layer_name(), "__BG__|A|B{0.5}|__inset_B|__SPINES__");

        let bm = BlitManager::new(BlitManagerConfig::default().with_transparent_background(true));
        assert_eq!(bm.show_layer_name(), "base|__SPINES__");
    }

    #[test]
    fn update_restores_background_and_draws_dynamic_artists() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("bg", Color::BLUE), DEFAULT_LAYER, false);
        bm.add_artist(Arc::new(TestArtist::new("marker").with_zorder(2.0)), DEFAULT_LAYER);
        bm.add_artist(Arc::new(TestArtist::new("cursor")), ALL_LAYER);
        bm.add_artist(Arc::new(TestArtist::new("hidden")), "other");

        let order = Arc::new(Mutex::new(vec![]));
        let o = order.clone();
        bm.after_restore(move |_| o.lock().push("restore"));
        let o = order.clone();
        bm.after_update(move |_| o.lock().push("update"));

        bm.update(&mut canvas, UpdateRequest::default().with_bbox(Rect::new(0.0, 0.0, 1.0, 1.0)));

        assert_eq!(canvas.drawn(), vec!["bg", "marker", "cursor"]);
        assert_eq!(canvas.restores, 1);
        assert_eq!(*order.lock(), vec!["restore", "update"]);
        assert_eq!(canvas.presents, vec![None]);

        bm.update(&mut canvas, UpdateRequest::default().with_bbox(Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(
            canvas.presents,
            vec![None, Some(Rect::new(0.0, 0.0, 1.0, 1.0))]
        );
        assert_eq!(order.lock().len(), 2);
    }

    #[test]
    fn update_draws_extra_artists_once() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        let marker: ArtistRef = Arc::new(TestArtist::new("marker"));
        bm.add_artist(marker.clone(), DEFAULT_LAYER);

        bm.update(
            &mut canvas,
            UpdateRequest::default()
                .with_artists([marker.clone(), artist("extra", Color::RED)])
                .with_blit(false),
        );
        assert_eq!(canvas.drawn(), vec!["marker", "extra"]);
        assert!(canvas.presents.is_empty());
    }

    #[test]
    fn on_draw_applies_refetch() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        bm.connect(&mut canvas);
        bm.add_bg_artist(artist("a", Color::RED), DEFAULT_LAYER, false);
        bm.add_bg_artist(artist("b", Color::BLUE), "B", false);
        bm.fetch_bg(&mut canvas, Some("B"), None);

        bm.on_draw(&mut canvas);
        assert_eq!(canvas.drawn(), vec!["b", "a"]);

        bm.on_draw(&mut canvas);
        assert_eq!(canvas.drawn().len(), 2);

        bm.refetch_layer(DEFAULT_LAYER);
        bm.on_draw(&mut canvas);
        assert_eq!(canvas.drawn(), vec!["b", "a", "a"]);
        assert!(bm.cache().contains("B"));

        bm.refetch_all();
        bm.on_draw(&mut canvas);
        assert!(!bm.cache().contains("B"));

        bm.disconnect(&mut canvas);
        let draws = canvas.drawn().len();
        bm.refetch_all();
        bm.on_draw(&mut canvas);
        assert_eq!(canvas.drawn().len(), draws);
    }

    #[test]
    fn temp_artists_cascade() {
        let mut bm = BlitManager::default();
        let click = Arc::new(TestArtist::new("click"));
        let pick = Arc::new(TestArtist::new("pick"));
        let motion = Arc::new(TestArtist::new("move"));
        bm.add_temp_artist(click.clone(), "A", "click");
        bm.add_temp_artist(pick.clone(), "A", "pick");
        bm.add_temp_artist(motion.clone(), "A", "move");

        bm.clear_temp_artists("pick");
        assert!(click.is_detached());
        assert!(pick.is_detached());
        assert!(!motion.is_detached());
        assert_eq!(bm.get_artists("A").len(), 1);

        bm.clear_temp_artists("on_layer_change");
        assert!(motion.is_detached());
        assert!(bm.get_artists("A").is_empty());
    }

    #[test]
    fn temp_artists_cleared_on_layer_change() {
        let mut bm =
            BlitManager::new(BlitManagerConfig::default().with_clear_on_layer_change(true));
        let marker = Arc::new(TestArtist::new("marker"));
        bm.add_temp_artist(marker.clone(), "A", "click");

        bm.set_bg_layer("B").expect("valid layer");
        assert!(marker.is_detached());
        assert_eq!(bm.temp_artists_count("click"), 0);
    }

    #[test]
    fn layer_bound_artists_follow_layer() {
        let mut bm = BlitManager::default();
        let colorbar = Arc::new(TestArtist::new("colorbar"));
        let legend = Arc::new(TestArtist::new("legend"));
        bm.add_layer_bound_artist(colorbar.clone(), "A");
        bm.add_layer_bound_artist(legend.clone(), ALL_LAYER);
        assert!(!colorbar.is_visible());
        assert!(legend.is_visible());

        bm.set_bg_layer("B|A{0.3}").expect("valid layer");
        assert!(colorbar.is_visible());

        bm.set_bg_layer("B").expect("valid layer");
        assert!(!colorbar.is_visible());
        assert!(legend.is_visible());
    }

    #[test]
    fn observers_and_redraw_requests() {
        let mut bm = BlitManager::default();
        let messenger = TestMessenger::default();
        bm.set_messenger(Some(Box::new(messenger.clone())));

        let events = Arc::new(Mutex::new(vec![]));
        let e = events.clone();
        bm.add_artist_observer(move |event| e.lock().push((event.layer.clone(), event.kind)));

        let a = artist("a", Color::RED);
        bm.add_bg_artist(a.clone(), "A", true);
        bm.add_bg_artist(a.clone(), "A", true);
        assert!(bm.remove_bg_artist(&a, None, false));
        assert!(!bm.remove_bg_artist(&a, None, false));

        assert_eq!(
            *events.lock(),
            vec![
                ("A".to_string(), ArtistEventKind::Added),
                ("A".to_string(), ArtistEventKind::Removed)
            ]
        );
        assert_eq!(messenger.requests(), 1);
    }

    #[test]
    fn extent_change_refetches_all() {
        let mut canvas = TestCanvas::default();
        let mut bm = BlitManager::default();
        let messenger = TestMessenger::default();
        bm.set_messenger(Some(Box::new(messenger.clone())));
        bm.add_bg_artist(artist("a", Color::RED), "A", false);

        let view = MapView::new(Rect::new(0.0, 0.0, 10.0, 10.0), Crs::WEB_MERCATOR);
        bm.set_view(AxesId(0), view.clone());
        bm.update(&mut canvas, UpdateRequest::default());
        bm.fetch_bg(&mut canvas, Some("A"), None);
        bm.set_view(AxesId(0), view.clone());
        bm.update(&mut canvas, UpdateRequest::default());
        assert!(bm.cache().contains("A"));
        assert_eq!(messenger.requests(), 1);

        bm.set_view(AxesId(0), view.with_extent(Rect::new(0.0, 0.0, 5.0, 5.0)));
        bm.update(&mut canvas, UpdateRequest::default());
        assert!(!bm.cache().contains("A"));
        assert_eq!(messenger.requests(), 2);

        bm.set_messenger(None);
        bm.set_view(AxesId(0), view);
        bm.update(&mut canvas, UpdateRequest::default());
        assert_eq!(messenger.requests(), 2);
    }

    #[test]
    fn layers_listing() {
        let mut bm = BlitManager::default();
        bm.add_bg_artist(artist("a", Color::RED), "A", false);
        bm.add_artist(artist("b", Color::RED), "B");
        bm.add_bg_artist(artist("bg", Color::RED), BG_LAYER, false);
        bm.set_bg_layer("A|B").expect("valid layer");

        assert_eq!(bm.all_layers(), vec!["A", "B"]);
        assert_eq!(bm.active_layers(), vec!["A", "B"]);
    }
}
