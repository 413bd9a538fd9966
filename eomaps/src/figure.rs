//! The figure: canvas, blit manager and map-views tied together.

use std::sync::Arc;

use eomaps_types::cartesian::Rect;
use eomaps_types::geo::{BuiltinTransformer, Crs, Transformer};
use log::debug;

use crate::blit::{BlitManager, BlitManagerConfig, UpdateRequest};
use crate::control::{
    CallbackContext, CallbackId, CallbackTarget, ClickEvent, ClickKind, EventCategory,
    EventProcessor, KeyEvent, MouseButton, MouseEvent, RawUserEvent, UserEvent,
};
use crate::data_manager::{DataManager, Dataset, Shape};
use crate::error::EomapsError;
use crate::layer_name::{combine, validate_name, LayerInput, LayerSegment};
use crate::maps::{Maps, MapsHandle, MapsRegistry};
use crate::messenger::Messenger;
use crate::render::Canvas;
use crate::view::{AxesId, MapView};

/// A figure with one or more map axes.
///
/// The figure owns the host canvas and the [`BlitManager`] caching the layer backgrounds. Every
/// map-view ([`Maps`]) shows one layer in one axes; map-views are referenced by
/// [`MapsHandle`]s. Input events of the host are passed to [`Figure::handle_event`] and
/// dispatched to the callbacks of the map-views under the pointer.
pub struct Figure {
    canvas: Box<dyn Canvas>,
    bm: BlitManager,
    registry: MapsRegistry,
    transformer: Box<dyn Transformer>,
    processor: EventProcessor,
}

impl std::fmt::Debug for Figure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Figure")
            .field("bm", &self.bm)
            .field("registry", &self.registry)
            .field("processor", &self.processor)
            .finish()
    }
}

impl Figure {
    /// Creates a figure drawing into the canvas. The blit manager is connected to the draw
    /// event of the canvas.
    pub fn new(mut canvas: Box<dyn Canvas>, config: BlitManagerConfig) -> Self {
        let mut bm = BlitManager::new(config);
        bm.connect(canvas.as_mut());

        Self {
            canvas,
            bm,
            registry: MapsRegistry::default(),
            transformer: Box::new(BuiltinTransformer::default()),
            processor: EventProcessor::default(),
        }
    }

    /// Sets the transformer used to re-project events forwarded between map-views.
    pub fn with_transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Box::new(transformer);
        self
    }

    /// Sets the messenger notified when the figure needs to be redrawn.
    pub fn set_messenger(&mut self, messenger: Option<Box<dyn Messenger>>) {
        self.bm.set_messenger(messenger);
    }

    /// Blit manager of the figure.
    pub fn blit_manager(&self) -> &BlitManager {
        &self.bm
    }

    /// Blit manager of the figure.
    pub fn blit_manager_mut(&mut self) -> &mut BlitManager {
        &mut self.bm
    }

    /// Host canvas.
    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    /// Host canvas.
    pub fn canvas_mut(&mut self) -> &mut dyn Canvas {
        self.canvas.as_mut()
    }

    /// Event processor turning raw input into clicks, motion and key presses.
    pub fn event_processor_mut(&mut self) -> &mut EventProcessor {
        &mut self.processor
    }

    /// Sets the view of the axes.
    pub fn set_view(&mut self, axes: AxesId, view: MapView) {
        self.bm.set_view(axes, view);
    }

    /// View of the axes.
    pub fn view(&self, axes: AxesId) -> Option<&MapView> {
        self.bm.view(axes)
    }

    /// Changes the visible extent of the axes. All cached backgrounds are dropped and a redraw
    /// is requested.
    pub fn set_extent(&mut self, axes: AxesId, extent: Rect) -> Result<(), EomapsError> {
        let view = self
            .bm
            .view(axes)
            .ok_or_else(|| EomapsError::Generic(format!("axes {axes:?} has no view")))?
            .with_extent(extent);
        self.bm.set_view(axes, view);
        Ok(())
    }

    /// Sets whether the host's layout editor is active. Collections are not re-created while
    /// the layout is edited.
    pub fn set_layout_editing(&mut self, editing: bool) {
        self.bm.set_layout_editing(editing);
    }

    /// Creates a map-view on the given layer of the axes.
    pub fn new_maps(
        &mut self,
        layer: impl Into<LayerInput>,
        crs: Crs,
        axes: AxesId,
    ) -> Result<MapsHandle, EomapsError> {
        let layer = validate_name(layer)?;
        debug!("New map-view on layer {layer:?} of axes {axes:?}");
        Ok(self.registry.insert(Maps::new(layer, crs, axes)))
    }

    /// Creates a map-view on another layer of the axes of `parent`.
    pub fn new_layer(
        &mut self,
        parent: MapsHandle,
        layer: impl Into<LayerInput>,
    ) -> Result<MapsHandle, EomapsError> {
        let parent = self.registry.get(parent).ok_or(EomapsError::DeadMaps)?;
        let (crs, axes) = (parent.crs.clone(), parent.axes);
        self.new_maps(layer, crs, axes)
    }

    /// Removes the map-view together with its dataset and permanent markers.
    pub fn remove_maps(&mut self, handle: MapsHandle) -> Result<(), EomapsError> {
        let mut maps = self.registry.remove(handle).ok_or(EomapsError::DeadMaps)?;

        if let Some(id) = maps.fetch_hook.take() {
            self.bm.remove_fetch_hook(id);
        }
        if let Some(data) = maps.data.take() {
            data.write().cleanup(&mut self.bm);
        }
        maps.click.clear_markers(&mut self.bm);
        maps.pick.clear_markers(&mut self.bm);

        for other in self.registry.handles() {
            if let Some(other) = self.registry.get_mut(other) {
                other.forget_target(handle);
            }
        }

        self.bm.request_redraw();
        Ok(())
    }

    /// Returns the map-view, or `None` if it was removed.
    pub fn maps(&self, handle: MapsHandle) -> Option<&Maps> {
        self.registry.get(handle)
    }

    /// Returns the map-view, or `None` if it was removed.
    pub fn maps_mut(&mut self, handle: MapsHandle) -> Option<&mut Maps> {
        self.registry.get_mut(handle)
    }

    /// Handles of all map-views of the figure.
    pub fn maps_handles(&self) -> Vec<MapsHandle> {
        self.registry.handles()
    }

    /// Attaches a dataset to the map-view, replacing the previous one.
    ///
    /// The collection representing the dataset is created the next time the layer of the
    /// map-view is fetched.
    pub fn set_data(
        &mut self,
        handle: MapsHandle,
        dataset: Dataset,
        shape: Arc<dyn Shape>,
    ) -> Result<(), EomapsError> {
        let maps = self.registry.get_mut(handle).ok_or(EomapsError::DeadMaps)?;

        let data = match &maps.data {
            Some(data) => data.clone(),
            None => {
                let data = DataManager::new_shared(maps.layer.clone(), maps.axes);
                maps.fetch_hook = Some(self.bm.add_fetch_hook(data.clone()));
                maps.data = Some(data.clone());
                data
            }
        };

        maps.tree.set_coordinates(dataset.coords.clone());
        maps.tree.set_estimated_radius(shape.radius(&dataset));
        maps.tree.set_search_radius(maps.pick.config().search_radius());

        data.write().set_dataset(dataset, shape, &mut self.bm);
        maps.pick.set_data_manager(data)?;

        self.bm.request_redraw();
        Ok(())
    }

    /// Attaches the dataset and shape of `parent` to `child`. The data arrays are shared.
    ///
    /// Fails with [`EomapsError::NoDataset`] if `parent` has no dataset yet.
    pub fn inherit_data(&mut self, child: MapsHandle, parent: MapsHandle) -> Result<(), EomapsError> {
        let data = self
            .registry
            .get(parent)
            .ok_or(EomapsError::DeadMaps)?
            .data
            .clone()
            .ok_or(EomapsError::NoDataset)?;

        let (dataset, shape) = {
            let data = data.read();
            match (data.dataset(), data.shape()) {
                (Some(dataset), Some(shape)) => (dataset.clone(), shape.clone()),
                _ => return Err(EomapsError::NoDataset),
            }
        };

        self.set_data(child, dataset, shape)
    }

    /// Shows the given layers on top of each other.
    ///
    /// ```
    /// # use eomaps::{BlitManagerConfig, Figure};
    /// # fn show(figure: &mut Figure) -> Result<(), eomaps::EomapsError> {
    /// figure.show_layer([("ocean", 1.0), ("clouds", 0.5)])?;
    /// assert_eq!(figure.blit_manager().bg_layer(), "ocean|clouds{0.5}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn show_layer<I, S>(&mut self, layers: I) -> Result<(), EomapsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<LayerSegment>,
    {
        let layer = combine(layers)?;
        self.bm.set_bg_layer(&layer)
    }

    /// Draws the backgrounds of the layers into the cache without showing them.
    pub fn fetch_layers<'a>(&mut self, layers: impl IntoIterator<Item = &'a str>) {
        self.bm.fetch_layers(self.canvas.as_mut(), layers);
    }

    /// Must be called by the host after every full draw of the canvas.
    pub fn on_draw(&mut self) {
        self.bm.on_draw(self.canvas.as_mut());
    }

    /// Restores the shown background and redraws the dynamic artists.
    pub fn update(&mut self, request: UpdateRequest) {
        self.bm.update(self.canvas.as_mut(), request);
    }

    /// Forwards events of one category from `source` to `target`. Event positions are
    /// transformed into the projection of `target`.
    pub fn forward_events(
        &mut self,
        source: MapsHandle,
        target: MapsHandle,
        category: EventCategory,
    ) -> Result<(), EomapsError> {
        if source == target {
            return Ok(());
        }
        if !self.registry.is_alive(target) {
            return Err(EomapsError::DeadMaps);
        }

        self.registry
            .get_mut(source)
            .ok_or(EomapsError::DeadMaps)?
            .add_forward_target(category, target);
        Ok(())
    }

    /// Forwards events of one category between two map-views in both directions.
    pub fn share_events(
        &mut self,
        a: MapsHandle,
        b: MapsHandle,
        category: EventCategory,
    ) -> Result<(), EomapsError> {
        self.forward_events(a, b, category)?;
        self.forward_events(b, a, category)
    }

    /// Removes a callback of the map-view by its identifier.
    ///
    /// Keypress callbacks are identified by the identifier alone. Mouse callbacks are searched
    /// in the container of `category`, or in the click, move and pick containers if no category
    /// is given.
    pub fn remove_callback(
        &mut self,
        handle: MapsHandle,
        category: Option<EventCategory>,
        id: &str,
    ) -> Result<(), EomapsError> {
        let id: CallbackId = id.parse()?;
        let maps = self.registry.get_mut(handle).ok_or(EomapsError::DeadMaps)?;

        if let CallbackTarget::Key(_) = id.target {
            return maps.keypress.remove(&id, &mut self.bm);
        }

        let categories = match category {
            Some(category) => vec![category],
            None => vec![EventCategory::Click, EventCategory::Move, EventCategory::Pick],
        };

        for category in categories {
            let result = match category {
                EventCategory::Click => maps.click.remove(&id, &mut self.bm),
                EventCategory::Move => maps.motion.remove(&id, &mut self.bm),
                EventCategory::Pick => maps.pick.remove(&id, &mut self.bm),
            };
            if result.is_ok() {
                return Ok(());
            }
        }

        Err(EomapsError::CallbackNotFound(id.to_string()))
    }

    /// Processes a raw input event of the host.
    pub fn handle_event(&mut self, event: RawUserEvent) {
        for event in self.processor.process(event) {
            self.dispatch(event);
        }
    }

    /// Dispatches a processed input event to the callbacks of the map-views. Returns the number
    /// of executed callbacks.
    ///
    /// The canvas is updated if any callback was executed or temporary artists were removed.
    pub fn dispatch(&mut self, event: UserEvent) -> usize {
        let (executed, cleared) = match event {
            UserEvent::Click(kind, button, mouse) => {
                let cleared = if kind == ClickKind::Release {
                    false
                } else {
                    self.clear_temp_artists("pick")
                };
                let categories: &[EventCategory] = match kind {
                    ClickKind::Release => &[EventCategory::Click],
                    _ => &[EventCategory::Click, EventCategory::Pick],
                };
                let executed = self.dispatch_pointer(kind, Some(button), mouse, categories, false);
                (executed, cleared)
            }
            UserEvent::Motion(Some(button), mouse) => {
                let executed = self.dispatch_pointer(
                    ClickKind::Single,
                    Some(button),
                    mouse,
                    &[EventCategory::Click],
                    true,
                );
                (executed, false)
            }
            UserEvent::Motion(None, mouse) => {
                let cleared = self.clear_temp_artists("move");
                let executed = self.dispatch_pointer(
                    ClickKind::Single,
                    None,
                    mouse,
                    &[EventCategory::Move],
                    true,
                );
                (executed, cleared)
            }
            UserEvent::KeyPress(key) => (self.dispatch_key(KeyEvent { key }), false),
            UserEvent::KeyRelease(_) => (0, false),
        };

        if executed > 0 || cleared {
            self.bm.update(self.canvas.as_mut(), UpdateRequest::default());
        }

        executed
    }

    fn clear_temp_artists(&mut self, method: &str) -> bool {
        let before = self.bm.temp_artists_count(method);
        self.bm.clear_temp_artists(method);
        before > 0
    }

    fn dispatch_pointer(
        &mut self,
        kind: ClickKind,
        button: Option<MouseButton>,
        mouse: MouseEvent,
        categories: &[EventCategory],
        motion: bool,
    ) -> usize {
        let Some(axes) = mouse.axes else {
            return 0;
        };
        let Some(view) = self.bm.view(axes) else {
            return 0;
        };

        let event = ClickEvent {
            axes: Some(axes),
            position: view.screen_to_map(mouse.screen_position),
            crs: view.crs().clone(),
            screen_position: mouse.screen_position,
            kind,
            button,
            modifier: mouse.modifier,
            forwarded: false,
        };

        let candidates = self.registry.candidates(axes);
        let mut executed = 0;

        for &category in categories {
            let mut forwarded: Vec<MapsHandle> = vec![];

            for &handle in &candidates {
                executed += self.dispatch_to(handle, category, &event, motion);

                let Some(maps) = self.registry.get(handle) else {
                    continue;
                };
                let targets = maps.forward_targets(category).to_vec();

                for target in targets {
                    if candidates.contains(&target) || forwarded.contains(&target) {
                        continue;
                    }
                    forwarded.push(target);

                    let event = ClickEvent {
                        forwarded: true,
                        ..event.clone()
                    };
                    executed += self.dispatch_to(target, category, &event, motion);
                }
            }
        }

        executed
    }

    fn dispatch_to(
        &mut self,
        handle: MapsHandle,
        category: EventCategory,
        event: &ClickEvent,
        motion: bool,
    ) -> usize {
        let Some(maps) = self.registry.get_mut(handle) else {
            return 0;
        };

        let event = if maps.crs == event.crs {
            event.clone()
        } else {
            match self
                .transformer
                .transform(&event.crs, &maps.crs, event.position)
            {
                Ok(position) => event.reprojected(position, maps.crs.clone()),
                Err(err) => {
                    debug!(
                        "Event at {:?} cannot be transformed to {}: {err}",
                        event.position, maps.crs
                    );
                    return 0;
                }
            }
        };

        let sticky = maps.keypress.sticky_modifier().map(str::to_string);
        let sticky = sticky.as_deref();
        let layer = maps.layer.clone();
        let mut ctx = CallbackContext {
            bm: &mut self.bm,
            canvas: self.canvas.as_mut(),
            maps: handle,
            layer: &layer,
        };

        match category {
            EventCategory::Click if motion => maps.click.dispatch_motion(&event, sticky, &mut ctx),
            EventCategory::Click => maps.click.dispatch(&event, sticky, &mut ctx),
            EventCategory::Move => maps.motion.dispatch_motion(&event, sticky, &mut ctx),
            EventCategory::Pick => maps.pick.dispatch(&event, sticky, &mut maps.tree, &mut ctx),
        }
    }

    fn dispatch_key(&mut self, event: KeyEvent) -> usize {
        let mut executed = 0;
        for handle in self.registry.handles() {
            let Some(maps) = self.registry.get_mut(handle) else {
                continue;
            };

            let layer = maps.layer.clone();
            let mut ctx = CallbackContext {
                bm: &mut self.bm,
                canvas: self.canvas.as_mut(),
                maps: handle,
                layer: &layer,
            };
            executed += maps.keypress.dispatch(&event, &mut ctx);
        }
        executed
    }
}
