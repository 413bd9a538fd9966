use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eomaps_types::cartesian::{CartesianPoint2d, Point2d};
use log::{debug, info};
use parking_lot::Mutex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::callback::{
    layer_is_active, validate_callback_name, CallbackId, CallbackKind, CallbackRegistry,
    CallbackTarget, Cleanup,
};
use super::click::{draw_marker, MarkerFactory, PermanentMarkers};
use super::{AttachOptions, CallbackContext, ClickConfig, ClickEvent, ClickKind};
use crate::blit::BlitManager;
use crate::color::Color;
use crate::data_manager::{DataId, DataManager, SharedDataManager};
use crate::error::{CallbackResult, EomapsError};
use crate::maps::MapsHandle;
use crate::search_tree::{SearchRadius, SearchTree};

/// Callback executed when data points are picked.
pub type PickCallback = Box<dyn FnMut(&PickEvent, &mut CallbackContext<'_>) -> CallbackResult>;

/// Configuration of a pick container.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PickConfig {
    n: usize,
    consecutive: bool,
    pick_relative_to_closest: bool,
    search_radius: SearchRadius,
    click: ClickConfig,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            n: 1,
            consecutive: true,
            pick_relative_to_closest: true,
            search_radius: SearchRadius::default(),
            click: ClickConfig::default(),
        }
    }
}

impl PickConfig {
    /// Number of points picked with a single click.
    ///
    /// Default value: 1
    pub fn n(&self) -> usize {
        self.n
    }

    /// Sets [`PickConfig::n`].
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Sets [`PickConfig::n`].
    pub fn set_n(&mut self, n: usize) {
        self.n = n;
    }

    /// If set, callbacks are executed once for every picked point. Otherwise they are executed
    /// once with all picked points.
    ///
    /// Default value: true
    pub fn consecutive(&self) -> bool {
        self.consecutive
    }

    /// Sets [`PickConfig::consecutive`].
    pub fn with_consecutive(mut self, consecutive: bool) -> Self {
        self.consecutive = consecutive;
        self
    }

    /// Sets [`PickConfig::consecutive`].
    pub fn set_consecutive(&mut self, consecutive: bool) {
        self.consecutive = consecutive;
    }

    /// If set, multiple points are picked around the point closest to the click instead of
    /// around the click position.
    ///
    /// Default value: true
    pub fn pick_relative_to_closest(&self) -> bool {
        self.pick_relative_to_closest
    }

    /// Sets [`PickConfig::pick_relative_to_closest`].
    pub fn with_pick_relative_to_closest(mut self, relative: bool) -> Self {
        self.pick_relative_to_closest = relative;
        self
    }

    /// Sets [`PickConfig::pick_relative_to_closest`].
    pub fn set_pick_relative_to_closest(&mut self, relative: bool) {
        self.pick_relative_to_closest = relative;
    }

    /// Radius around the click in which points are picked.
    ///
    /// Default value: 50 times the estimated radius of the plotted shapes
    pub fn search_radius(&self) -> SearchRadius {
        self.search_radius
    }

    /// Sets [`PickConfig::search_radius`].
    pub fn with_search_radius(mut self, radius: impl Into<SearchRadius>) -> Self {
        self.search_radius = radius.into();
        self
    }

    /// Sets [`PickConfig::search_radius`].
    pub fn set_search_radius(&mut self, radius: impl Into<SearchRadius>) {
        self.search_radius = radius.into();
    }

    /// Toolbar and sticky modifier settings.
    pub fn click(&self) -> &ClickConfig {
        &self.click
    }

    /// Sets [`PickConfig::click`].
    pub fn with_click(mut self, click: ClickConfig) -> Self {
        self.click = click;
        self
    }

    /// Sets [`PickConfig::click`].
    pub fn set_click(&mut self, click: ClickConfig) {
        self.click = click;
    }
}

/// A picked data point.
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    /// Identifier of the point.
    pub id: DataId,
    /// Index of the point in the dataset.
    pub index: usize,
    /// Position of the point in plot-projection units.
    pub position: Point2d,
    /// Data value.
    pub value: f64,
    /// Colour the value is drawn with.
    pub value_color: Option<Color>,
}

/// Result of a pick query.
#[derive(Debug, Clone, PartialEq)]
pub enum PickResult {
    /// Points inside of the search radius, closest first.
    Hit(Vec<PickHit>),
    /// No point inside of the search radius.
    Miss,
}

/// Event passed to pick callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct PickEvent {
    /// The click that triggered the pick.
    pub click: ClickEvent,
    /// Picked points. Contains exactly one point if callbacks are executed consecutively.
    pub hits: Vec<PickHit>,
}

/// Values collected by the `get_values` callback of a pick container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickedValues {
    /// Positions of the picked points.
    pub positions: Vec<Point2d>,
    /// Identifiers of the picked points.
    pub ids: Vec<DataId>,
    /// Values of the picked points.
    pub values: Vec<f64>,
    /// Dataset indices of the picked points.
    pub indices: Vec<usize>,
}

/// Pick callbacks of one map-view.
///
/// Picking requires a dataset. Callbacks can be attached before the dataset is drawn, in that
/// case the container starts picking once the first collection for the dataset is created.
pub struct PickContainer {
    layer: String,
    config: PickConfig,
    callbacks: CallbackRegistry<PickCallback>,
    data: Option<SharedDataManager>,
    picker_ready: Arc<AtomicBool>,
    picker_pending: bool,
    markers: PermanentMarkers,
    forward_to: Vec<MapsHandle>,
}

impl std::fmt::Debug for PickContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickContainer")
            .field("layer", &self.layer)
            .field("config", &self.config)
            .field("callbacks", &self.callbacks.ids())
            .field("picker_ready", &self.is_ready())
            .finish()
    }
}

impl PickContainer {
    /// Creates a pick container for a map-view on the given layer.
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            config: PickConfig::default(),
            callbacks: CallbackRegistry::default(),
            data: None,
            picker_ready: Arc::new(AtomicBool::new(false)),
            picker_pending: false,
            markers: PermanentMarkers::default(),
            forward_to: vec![],
        }
    }

    /// Configuration of the container.
    pub fn config(&self) -> &PickConfig {
        &self.config
    }

    /// Sets the configuration of the container.
    pub fn set_config(&mut self, config: PickConfig) {
        self.config = config;
    }

    /// Returns true if the collection of the dataset can be picked.
    pub fn is_ready(&self) -> bool {
        self.picker_ready.load(Ordering::Relaxed)
    }

    /// Sets the data manager whose dataset is picked.
    pub(crate) fn set_data_manager(&mut self, data: SharedDataManager) -> Result<(), EomapsError> {
        self.data = Some(data);
        self.picker_ready.store(false, Ordering::Relaxed);
        self.picker_pending = false;

        if self.callbacks.is_empty() {
            Ok(())
        } else {
            self.init_picker()
        }
    }

    /// Makes the dataset pickable, immediately if its collection exists or as soon as the
    /// collection is created.
    fn init_picker(&mut self) -> Result<(), EomapsError> {
        if self.is_ready() || self.picker_pending {
            return Ok(());
        }

        let data = self.data.as_ref().ok_or(EomapsError::NoDataset)?;
        let mut dm = data.write();
        if dm.dataset().is_none() {
            return Err(EomapsError::NoDataset);
        }

        dm.set_pickable(true);
        if dm.collection().is_some() {
            self.picker_ready.store(true, Ordering::Relaxed);
        } else {
            let ready = self.picker_ready.clone();
            dm.on_next_collection(move |_| ready.store(true, Ordering::Relaxed));
            self.picker_pending = true;
            debug!(
                "Picker of layer {:?} is initialized with the next collection",
                self.layer
            );
        }

        Ok(())
    }

    /// Attaches a custom callback.
    ///
    /// Fails with [`EomapsError::NoDataset`] if the map-view has no dataset.
    pub fn attach(
        &mut self,
        name: &str,
        callback: impl FnMut(&PickEvent, &mut CallbackContext<'_>) -> CallbackResult + 'static,
        options: AttachOptions,
    ) -> Result<CallbackId, EomapsError> {
        validate_callback_name(name)?;
        self.add(name, Box::new(callback), options, None)
    }

    fn add(
        &mut self,
        name: &str,
        callback: PickCallback,
        options: AttachOptions,
        cleanup: Option<Cleanup>,
    ) -> Result<CallbackId, EomapsError> {
        self.init_picker()?;

        let layer = options.layer.clone().unwrap_or_else(|| self.layer.clone());
        Ok(self.callbacks.add(
            name,
            &layer,
            options.target(),
            callback,
            cleanup,
            false,
        ))
    }

    /// Attaches the `get_values` callback collecting the picked points. The values are dropped
    /// when the callback is removed.
    pub fn attach_get_values(
        &mut self,
        options: AttachOptions,
    ) -> Result<(CallbackId, Arc<Mutex<PickedValues>>), EomapsError> {
        let values = Arc::new(Mutex::new(PickedValues::default()));
        let collected = values.clone();
        let callback = move |event: &PickEvent, _: &mut CallbackContext<'_>| {
            let mut values = collected.lock();
            for hit in &event.hits {
                values.positions.push(hit.position);
                values.ids.push(hit.id.clone());
                values.values.push(hit.value);
                values.indices.push(hit.index);
            }
            Ok(())
        };

        let cleared = values.clone();
        let cleanup: Cleanup = Box::new(move |_: &mut BlitManager| {
            *cleared.lock() = PickedValues::default();
        });

        let id = self.add(
            CallbackKind::GET_VALUES.name,
            Box::new(callback),
            options,
            Some(cleanup),
        )?;
        Ok((id, values))
    }

    /// Attaches the `print_to_console` callback logging the picked points.
    pub fn attach_print_to_console(
        &mut self,
        options: AttachOptions,
    ) -> Result<CallbackId, EomapsError> {
        let callback = |event: &PickEvent, _: &mut CallbackContext<'_>| {
            for hit in &event.hits {
                info!(
                    "picked {} at x={:.4} y={:.4} ({}), value {}",
                    hit.id, hit.position.x, hit.position.y, event.click.crs, hit.value
                );
            }
            Ok(())
        };

        self.add(
            CallbackKind::PRINT_TO_CONSOLE.name,
            Box::new(callback),
            options,
            None,
        )
    }

    /// Attaches the `mark` callback drawing a marker at every picked point.
    pub fn attach_mark(
        &mut self,
        marker: MarkerFactory,
        permanent: bool,
        options: AttachOptions,
    ) -> Result<CallbackId, EomapsError> {
        let markers = permanent.then(|| self.markers.clone());
        let callback = move |event: &PickEvent, ctx: &mut CallbackContext<'_>| {
            for hit in &event.hits {
                draw_marker(marker(hit.position), markers.as_ref(), "pick", ctx);
            }
            Ok(())
        };

        self.add(CallbackKind::MARK.name, Box::new(callback), options, None)
    }

    /// Attaches the `clear_markers` callback removing all permanent markers of the container.
    pub fn attach_clear_markers(
        &mut self,
        options: AttachOptions,
    ) -> Result<CallbackId, EomapsError> {
        let markers = self.markers.clone();
        let callback = move |_: &PickEvent, ctx: &mut CallbackContext<'_>| {
            markers.clear(ctx.bm);
            Ok(())
        };

        self.add(
            CallbackKind::CLEAR_MARKERS.name,
            Box::new(callback),
            options,
            None,
        )
    }

    /// Number of permanent markers currently drawn by the container.
    pub fn permanent_markers(&self) -> usize {
        self.markers.len()
    }

    /// Removes all permanent markers of the container.
    pub fn clear_markers(&self, bm: &mut BlitManager) {
        self.markers.clear(bm);
    }

    /// Removes a callback and executes its cleanup action.
    pub fn remove(&mut self, id: &CallbackId, bm: &mut BlitManager) -> Result<(), EomapsError> {
        self.callbacks.remove(id, bm)
    }

    /// Identifiers of the attached callbacks in attachment order.
    pub fn attached_callbacks(&self) -> Vec<CallbackId> {
        self.callbacks.ids()
    }

    /// Map-views receiving a copy of every event dispatched to this container.
    pub fn forward_targets(&self) -> &[MapsHandle] {
        &self.forward_to
    }

    /// Forwards the events of this container to the pick container of `target`.
    pub fn add_forward_target(&mut self, target: MapsHandle) {
        if !self.forward_to.contains(&target) {
            self.forward_to.push(target);
        }
    }

    /// Stops forwarding events to `target`.
    pub fn remove_forward_target(&mut self, target: MapsHandle) -> bool {
        let before = self.forward_to.len();
        self.forward_to.retain(|handle| *handle != target);
        self.forward_to.len() != before
    }

    /// Picks the points closest to the event position.
    pub fn pick(&self, position: Point2d, tree: &mut SearchTree) -> PickResult {
        let Some(data) = &self.data else {
            return PickResult::Miss;
        };

        if tree.search_radius() != self.config.search_radius {
            tree.set_search_radius(self.config.search_radius);
        }

        let Some(indices) = tree.query(
            position,
            self.config.n.max(1),
            None,
            self.config.pick_relative_to_closest,
        ) else {
            return PickResult::Miss;
        };

        let dm = data.read();
        let mut hits: Vec<PickHit> = indices
            .into_iter()
            .filter_map(|index| hit(&dm, index))
            .collect();
        hits.sort_by(|a, b| {
            a.position
                .distance_sq(&position)
                .total_cmp(&b.position.distance_sq(&position))
        });

        if hits.is_empty() {
            PickResult::Miss
        } else {
            PickResult::Hit(hits)
        }
    }

    /// Picks points and executes the callbacks attached to the click. Returns the number of
    /// executed callbacks.
    pub(crate) fn dispatch(
        &mut self,
        event: &ClickEvent,
        sticky: Option<&str>,
        tree: &mut SearchTree,
        ctx: &mut CallbackContext<'_>,
    ) -> usize {
        if !self.is_ready() || event.kind == ClickKind::Release {
            return 0;
        }

        if ctx.canvas.toolbar_active() && !self.config.click.execute_during_toolbar_action() {
            return 0;
        }

        let modifier = self
            .config
            .click
            .resolve_modifier(event.modifier.as_deref(), sticky);
        let click = event.with_modifier(modifier.clone());
        let target = CallbackTarget::Mouse {
            kind: click.kind,
            button: click.button,
            modifier,
        };

        let active = ctx.bm.bg_layer().to_string();
        let order = self.callbacks.execution_order(|entry| {
            entry.id.target == target && layer_is_active(&entry.id.layer, &active)
        });
        if order.is_empty() {
            return 0;
        }

        let PickResult::Hit(hits) = self.pick(click.position, tree) else {
            return 0;
        };

        let events: Vec<PickEvent> = if self.config.consecutive {
            hits.into_iter()
                .map(|hit| PickEvent {
                    click: click.clone(),
                    hits: vec![hit],
                })
                .collect()
        } else {
            vec![PickEvent { click, hits }]
        };

        for event in &events {
            for &index in &order {
                let Some(entry) = self.callbacks.get_mut(index) else {
                    continue;
                };
                if let Err(err) = (entry.callback)(event, ctx) {
                    debug!("Pick callback {} failed: {err}", entry.id);
                }
            }
        }

        order.len()
    }
}

fn hit(dm: &DataManager, index: usize) -> Option<PickHit> {
    let dataset = dm.dataset()?;
    let value = dataset.values.get(index).copied()?;
    Some(PickHit {
        id: dataset.ids.get(index)?.clone(),
        index,
        position: dataset.coords.position(index)?,
        value,
        value_color: dm.shape().and_then(|shape| shape.value_color(value)),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use eomaps_types::geo::Crs;

    use super::*;
    use crate::control::MouseButton;
    use crate::data_manager::{Coordinates, Dataset};
    use crate::render::ArtistRef;
    use crate::tests::{TestArtist, TestCanvas, TestShape};
    use crate::view::{AxesId, MapView};
    use eomaps_types::cartesian::Rect;

    fn dataset() -> Dataset {
        Dataset::with_ids(
            Coordinates::scattered(vec![0.0, 10.0, 0.0], vec![0.0, 0.0, 10.0])
                .expect("same length"),
            vec![1.0, 2.0, 3.0],
            vec![DataId::from("a"), DataId::from("b"), DataId::from("c")],
        )
        .expect("valid dataset")
    }

    fn tree() -> SearchTree {
        let mut tree = SearchTree::new();
        tree.set_coordinates(dataset().coords);
        tree
    }

    fn setup() -> (BlitManager, SharedDataManager) {
        let mut bm = BlitManager::default();
        bm.set_view(
            AxesId(0),
            MapView::new(Rect::new(-20.0, -20.0, 20.0, 20.0), Crs::WEB_MERCATOR),
        );
        let data = DataManager::new_shared("base", AxesId(0));
        data.write()
            .set_dataset(dataset(), Arc::new(TestShape::new(0.5)), &mut bm);
        (bm, data)
    }

    fn click_at(x: f64, y: f64) -> ClickEvent {
        ClickEvent {
            axes: Some(AxesId(0)),
            position: Point2d::new(x, y),
            crs: Crs::WEB_MERCATOR,
            screen_position: Point2d::new(0.0, 0.0),
            kind: ClickKind::Single,
            button: Some(MouseButton::Left),
            modifier: None,
            forwarded: false,
        }
    }

    fn fetch(bm: &mut BlitManager, data: &SharedDataManager) {
        let mut hook = data.clone();
        crate::blit::FetchHook::before_fetch(&mut hook, "base", bm);
    }

    #[test]
    fn attach_requires_dataset() {
        let mut container = PickContainer::new("base");
        assert_matches!(
            container.attach("cb", |_, _| Ok(()), AttachOptions::default()),
            Err(EomapsError::NoDataset)
        );

        let data = DataManager::new_shared("base", AxesId(0));
        container.set_data_manager(data).expect("no callbacks");
        assert_matches!(
            container.attach_print_to_console(AttachOptions::default()),
            Err(EomapsError::NoDataset)
        );
    }

    #[test]
    fn picker_initialization_is_deferred() {
        let (mut bm, data) = setup();
        let mut container = PickContainer::new("base");
        container.set_data_manager(data.clone()).expect("no callbacks");
        container
            .attach("cb", |_, _| Ok(()), AttachOptions::default())
            .expect("dataset is attached");
        assert!(!container.is_ready());

        fetch(&mut bm, &data);
        assert!(container.is_ready());

        let collection = data.read().collection().cloned().expect("collection created");
        let artist = collection
            .as_any()
            .downcast_ref::<TestArtist>()
            .expect("test artist");
        assert!(artist.is_pickable());
    }

    #[test]
    fn picking_nearest_point() {
        let (_, data) = setup();
        let mut container = PickContainer::new("base");
        container.set_config(PickConfig::default().with_search_radius(5.0));
        container.set_data_manager(data).expect("no callbacks");

        let mut tree = tree();
        let result = container.pick(Point2d::new(0.1, 0.1), &mut tree);
        assert_matches!(result, PickResult::Hit(hits) if hits.len() == 1 && hits[0].id == DataId::from("a"));
        assert_eq!(container.pick(Point2d::new(5.0, 0.0), &mut tree), PickResult::Miss);
    }

    #[test]
    fn consecutive_and_batched_callbacks() {
        let (mut bm, data) = setup();
        fetch(&mut bm, &data);
        bm.set_bg_layer("base").expect("valid layer");

        let mut container = PickContainer::new("base");
        container.set_config(
            PickConfig::default()
                .with_search_radius(20.0)
                .with_n(3),
        );
        container.set_data_manager(data).expect("no callbacks");

        let calls = Arc::new(Mutex::new(vec![]));
        let log = calls.clone();
        container
            .attach(
                "count",
                move |event: &PickEvent, _: &mut CallbackContext<'_>| {
                    log.lock().push(event.hits.len());
                    Ok(())
                },
                AttachOptions::default(),
            )
            .expect("dataset is attached");
        let (_, values) = container
            .attach_get_values(AttachOptions::default())
            .expect("dataset is attached");
        assert!(container.is_ready());

        let mut tree = tree();
        let mut canvas = TestCanvas::default();
        let mut ctx = CallbackContext {
            bm: &mut bm,
            canvas: &mut canvas,
            maps: MapsHandle::default(),
            layer: "base",
        };

        assert_eq!(container.dispatch(&click_at(0.1, 0.1), None, &mut tree, &mut ctx), 2);
        assert_eq!(*calls.lock(), vec![1, 1, 1]);
        assert_eq!(values.lock().ids[0], DataId::from("a"));

        let mut config = container.config().clone();
        config.set_consecutive(false);
        container.set_config(config);
        container.dispatch(&click_at(0.1, 0.1), None, &mut tree, &mut ctx);
        assert_eq!(*calls.lock(), vec![1, 1, 1, 3]);
        assert_eq!(values.lock().values.len(), 6);

        assert_eq!(
            container.dispatch(&click_at(100.0, 100.0), None, &mut tree, &mut ctx),
            0
        );
    }

    #[test]
    fn pick_markers_are_temporary() {
        let (mut bm, data) = setup();
        fetch(&mut bm, &data);
        bm.set_bg_layer("base").expect("valid layer");

        let mut container = PickContainer::new("base");
        container.set_config(PickConfig::default().with_search_radius(5.0));
        container.set_data_manager(data).expect("no callbacks");
        container
            .attach_mark(
                Arc::new(|_| Arc::new(TestArtist::new("marker")) as ArtistRef),
                false,
                AttachOptions::default(),
            )
            .expect("dataset is attached");

        let mut tree = tree();
        let mut canvas = TestCanvas::default();
        let mut ctx = CallbackContext {
            bm: &mut bm,
            canvas: &mut canvas,
            maps: MapsHandle::default(),
            layer: "base",
        };
        container.dispatch(&click_at(0.1, 0.1), None, &mut tree, &mut ctx);
        assert_eq!(bm.temp_artists_count("pick"), 1);

        bm.clear_temp_artists("pick");
        assert_eq!(bm.temp_artists_count("pick"), 0);
    }
}
