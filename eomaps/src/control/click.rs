use std::sync::Arc;

use eomaps_types::cartesian::Point2d;
use log::{debug, info};
use parking_lot::Mutex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::callback::{
    layer_is_active, validate_callback_name, CallbackId, CallbackKind, CallbackRegistry,
    CallbackTarget,
};
use super::{CallbackContext, ClickEvent, ClickKind, MouseButton};
use crate::blit::BlitManager;
use crate::error::{CallbackResult, EomapsError};
use crate::maps::MapsHandle;
use crate::render::ArtistRef;

/// Callback executed on a click or on pointer motion.
pub type ClickCallback = Box<dyn FnMut(&ClickEvent, &mut CallbackContext<'_>) -> CallbackResult>;

/// Creates the marker artist drawn at the given plot position.
pub type MarkerFactory = Arc<dyn Fn(Point2d) -> ArtistRef>;

/// Configuration of a click, move or pick container.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClickConfig {
    execute_during_toolbar_action: bool,
    sticky_modifiers: Vec<String>,
}

impl ClickConfig {
    /// If set, callbacks are executed even while a toolbar action (pan, zoom) is active.
    ///
    /// Default value: false
    pub fn execute_during_toolbar_action(&self) -> bool {
        self.execute_during_toolbar_action
    }

    /// Sets [`ClickConfig::execute_during_toolbar_action`].
    pub fn with_execute_during_toolbar_action(mut self, execute: bool) -> Self {
        self.execute_during_toolbar_action = execute;
        self
    }

    /// Sets [`ClickConfig::execute_during_toolbar_action`].
    pub fn set_execute_during_toolbar_action(&mut self, execute: bool) {
        self.execute_during_toolbar_action = execute;
    }

    /// Keys that stay active as modifier after they were pressed, until they are pressed again
    /// or another key is pressed.
    ///
    /// Default value: empty
    pub fn sticky_modifiers(&self) -> &[String] {
        &self.sticky_modifiers
    }

    /// Sets [`ClickConfig::sticky_modifiers`].
    pub fn with_sticky_modifiers(
        mut self,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.set_sticky_modifiers(keys);
        self
    }

    /// Sets [`ClickConfig::sticky_modifiers`].
    pub fn set_sticky_modifiers(&mut self, keys: impl IntoIterator<Item = impl Into<String>>) {
        self.sticky_modifiers = keys.into_iter().map(Into::into).collect();
    }

    /// Modifier used to look up callbacks: the pressed key, or the sticky key if nothing is
    /// pressed and the sticky key is enabled for this container.
    pub(crate) fn resolve_modifier(
        &self,
        pressed: Option<&str>,
        sticky: Option<&str>,
    ) -> Option<String> {
        match (pressed, sticky) {
            (Some(key), _) => Some(key.to_string()),
            (None, Some(key)) if self.sticky_modifiers.iter().any(|k| k == key) => {
                Some(key.to_string())
            }
            _ => None,
        }
    }
}

/// Event a callback is attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachOptions {
    /// Mouse button. `None` attaches a move callback executed without a pressed button.
    pub button: Option<MouseButton>,
    /// Modifier key that must be pressed (or sticky).
    pub modifier: Option<String>,
    /// Kind of the click.
    pub kind: ClickKind,
    /// Also execute the callback on pointer motion while the button is held.
    pub on_motion: bool,
    /// Layer the callback is executed on. Defaults to the layer of the map-view.
    pub layer: Option<String>,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            button: Some(MouseButton::Left),
            modifier: None,
            kind: ClickKind::Single,
            on_motion: true,
            layer: None,
        }
    }
}

impl AttachOptions {
    /// Options for a move callback.
    pub fn motion() -> Self {
        Self {
            button: None,
            ..Default::default()
        }
    }

    /// Sets the mouse button.
    pub fn with_button(mut self, button: Option<MouseButton>) -> Self {
        self.button = button;
        self
    }

    /// Sets the modifier.
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    /// Sets the click kind.
    pub fn with_kind(mut self, kind: ClickKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets whether the callback is also executed on motion.
    pub fn with_on_motion(mut self, on_motion: bool) -> Self {
        self.on_motion = on_motion;
        self
    }

    /// Sets the layer the callback is executed on.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub(crate) fn target(&self) -> CallbackTarget {
        CallbackTarget::Mouse {
            kind: self.kind,
            button: self.button,
            modifier: self.modifier.clone(),
        }
    }
}

/// Positions collected by the `get_values` callback of a click container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickedPositions {
    /// Clicked positions in plot-projection units.
    pub positions: Vec<Point2d>,
    /// Clicked positions in pixels.
    pub screen_positions: Vec<Point2d>,
}

/// Markers drawn permanently by `mark` callbacks, shared between the `mark` and
/// `clear_markers` callbacks of a container.
#[derive(Debug, Clone, Default)]
pub(crate) struct PermanentMarkers(Arc<Mutex<Vec<(ArtistRef, String)>>>);

impl PermanentMarkers {
    pub fn add(&self, artist: ArtistRef, layer: &str, bm: &mut BlitManager) {
        bm.add_bg_artist(artist.clone(), layer, true);
        self.0.lock().push((artist, layer.to_string()));
    }

    pub fn clear(&self, bm: &mut BlitManager) {
        let markers = std::mem::take(&mut *self.0.lock());
        for (artist, layer) in markers {
            bm.remove_bg_artist(&artist, Some(&layer), true);
            artist.detach();
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Draws a marker, either as a temporary artist of the interaction method or as a permanent
/// background artist.
pub(crate) fn draw_marker(
    marker: ArtistRef,
    permanent: Option<&PermanentMarkers>,
    method: &str,
    ctx: &mut CallbackContext<'_>,
) {
    match permanent {
        Some(markers) => markers.add(marker, ctx.layer, ctx.bm),
        None => ctx.bm.add_temp_artist(marker, ctx.layer, method),
    }
}

/// Click or move callbacks of one map-view.
pub struct ClickContainer {
    layer: String,
    method: &'static str,
    config: ClickConfig,
    callbacks: CallbackRegistry<ClickCallback>,
    markers: PermanentMarkers,
    forward_to: Vec<MapsHandle>,
}

impl std::fmt::Debug for ClickContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickContainer")
            .field("layer", &self.layer)
            .field("method", &self.method)
            .field("config", &self.config)
            .field("callbacks", &self.callbacks.ids())
            .finish()
    }
}

impl ClickContainer {
    /// Creates a container for click callbacks of a map-view on the given layer.
    pub fn click(layer: impl Into<String>) -> Self {
        Self::new(layer.into(), "click")
    }

    /// Creates a container for move callbacks of a map-view on the given layer.
    pub fn motion(layer: impl Into<String>) -> Self {
        Self::new(layer.into(), "move")
    }

    fn new(layer: String, method: &'static str) -> Self {
        Self {
            layer,
            method,
            config: ClickConfig::default(),
            callbacks: CallbackRegistry::default(),
            markers: PermanentMarkers::default(),
            forward_to: vec![],
        }
    }

    /// Name of the interaction method temporary artists of this container are registered with.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Configuration of the container.
    pub fn config(&self) -> &ClickConfig {
        &self.config
    }

    /// Sets the configuration of the container.
    pub fn set_config(&mut self, config: ClickConfig) {
        self.config = config;
    }

    /// Attaches a custom callback.
    pub fn attach(
        &mut self,
        name: &str,
        callback: impl FnMut(&ClickEvent, &mut CallbackContext<'_>) -> CallbackResult + 'static,
        options: AttachOptions,
    ) -> Result<CallbackId, EomapsError> {
        validate_callback_name(name)?;
        Ok(self.add(name, Box::new(callback), options, None))
    }

    fn add(
        &mut self,
        name: &str,
        callback: ClickCallback,
        options: AttachOptions,
        cleanup: Option<super::Cleanup>,
    ) -> CallbackId {
        let layer = options.layer.clone().unwrap_or_else(|| self.layer.clone());
        self.callbacks.add(
            name,
            &layer,
            options.target(),
            callback,
            cleanup,
            options.on_motion,
        )
    }

    /// Attaches the `get_values` callback collecting the clicked positions. The positions are
    /// dropped when the callback is removed.
    pub fn attach_get_values(
        &mut self,
        options: AttachOptions,
    ) -> (CallbackId, Arc<Mutex<ClickedPositions>>) {
        let values = Arc::new(Mutex::new(ClickedPositions::default()));
        let collected = values.clone();
        let callback = move |event: &ClickEvent, _: &mut CallbackContext<'_>| {
            let mut values = collected.lock();
            values.positions.push(event.position);
            values.screen_positions.push(event.screen_position);
            Ok(())
        };

        let cleared = values.clone();
        let cleanup = Box::new(move |_: &mut BlitManager| {
            *cleared.lock() = ClickedPositions::default();
        });

        let id = self.add(
            CallbackKind::GET_VALUES.name,
            Box::new(callback),
            options,
            Some(cleanup),
        );
        (id, values)
    }

    /// Attaches the `print_to_console` callback logging the clicked position.
    pub fn attach_print_to_console(&mut self, options: AttachOptions) -> CallbackId {
        let callback = |event: &ClickEvent, _: &mut CallbackContext<'_>| {
            info!(
                "clicked at x={:.4} y={:.4} ({}), screen position {:.1}, {:.1}",
                event.position.x,
                event.position.y,
                event.crs,
                event.screen_position.x,
                event.screen_position.y
            );
            Ok(())
        };

        self.add(
            CallbackKind::PRINT_TO_CONSOLE.name,
            Box::new(callback),
            options,
            None,
        )
    }

    /// Attaches the `mark` callback drawing a marker at the clicked position.
    ///
    /// Temporary markers are removed on the next click, permanent ones stay on the layer until
    /// `clear_markers` is executed.
    pub fn attach_mark(
        &mut self,
        marker: MarkerFactory,
        permanent: bool,
        options: AttachOptions,
    ) -> CallbackId {
        let markers = permanent.then(|| self.markers.clone());
        let method = self.method;
        let callback = move |event: &ClickEvent, ctx: &mut CallbackContext<'_>| {
            draw_marker(marker(event.position), markers.as_ref(), method, ctx);
            Ok(())
        };

        self.add(CallbackKind::MARK.name, Box::new(callback), options, None)
    }

    /// Attaches the `clear_markers` callback removing all permanent markers of the container.
    pub fn attach_clear_markers(&mut self, options: AttachOptions) -> CallbackId {
        let markers = self.markers.clone();
        let callback = move |_: &ClickEvent, ctx: &mut CallbackContext<'_>| {
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

    /// Returns true if there are no callbacks attached.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Map-views receiving a copy of every event dispatched to this container.
    pub fn forward_targets(&self) -> &[MapsHandle] {
        &self.forward_to
    }

    /// Forwards the events of this container to the container of the same kind of `target`.
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

    /// Executes the callbacks attached to the click. Returns the number of executed callbacks.
    pub(crate) fn dispatch(
        &mut self,
        event: &ClickEvent,
        sticky: Option<&str>,
        ctx: &mut CallbackContext<'_>,
    ) -> usize {
        self.run(event, sticky, ctx, false)
    }

    /// Executes the motion callbacks: callbacks attached with `on_motion` to the single click
    /// of the pressed button, or move callbacks if no button is pressed.
    pub(crate) fn dispatch_motion(
        &mut self,
        event: &ClickEvent,
        sticky: Option<&str>,
        ctx: &mut CallbackContext<'_>,
    ) -> usize {
        self.run(event, sticky, ctx, true)
    }

    fn run(
        &mut self,
        event: &ClickEvent,
        sticky: Option<&str>,
        ctx: &mut CallbackContext<'_>,
        motion: bool,
    ) -> usize {
        if ctx.canvas.toolbar_active() && !self.config.execute_during_toolbar_action {
            return 0;
        }

        let modifier = self
            .config
            .resolve_modifier(event.modifier.as_deref(), sticky);
        let event = event.with_modifier(modifier.clone());
        let target = CallbackTarget::Mouse {
            kind: if motion {
                ClickKind::Single
            } else {
                event.kind
            },
            button: event.button,
            modifier,
        };

        let active = ctx.bm.bg_layer().to_string();
        let order = self.callbacks.execution_order(|entry| {
            entry.id.target == target
                && (!motion || entry.on_motion)
                && layer_is_active(&entry.id.layer, &active)
        });

        for &index in &order {
            let Some(entry) = self.callbacks.get_mut(index) else {
                continue;
            };
            if let Err(err) = (entry.callback)(&event, ctx) {
                debug!("Click callback {} failed: {err}", entry.id);
            }
        }

        order.len()
    }
}
