use log::debug;

use super::callback::{
    layer_is_active, validate_callback_name, CallbackId, CallbackKind, CallbackRegistry,
    CallbackTarget,
};
use super::CallbackContext;
use crate::blit::BlitManager;
use crate::error::{CallbackResult, EomapsError};

/// Callback executed on a key press.
pub type KeyCallback = Box<dyn FnMut(&KeyEvent, &mut CallbackContext<'_>) -> CallbackResult>;

/// Event passed to keypress callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Name of the pressed key.
    pub key: String,
}

/// Keypress callbacks of one map-view.
///
/// The container also keeps the sticky modifier: the last pressed key stays active as modifier
/// of click, pick and move callbacks until it is pressed again or another key is pressed.
/// Containers only consult it for the keys listed in their sticky modifiers.
#[derive(Default)]
pub struct KeypressContainer {
    layer: String,
    callbacks: CallbackRegistry<KeyCallback>,
    sticky: Option<String>,
}

impl std::fmt::Debug for KeypressContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypressContainer")
            .field("layer", &self.layer)
            .field("callbacks", &self.callbacks.ids())
            .field("sticky", &self.sticky)
            .finish()
    }
}

impl KeypressContainer {
    /// Creates a container for a map-view on the given layer.
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            ..Default::default()
        }
    }

    /// Currently active sticky modifier.
    pub fn sticky_modifier(&self) -> Option<&str> {
        self.sticky.as_deref()
    }

    /// Attaches a callback executed when `key` is pressed, or on any key if `key` is `None`.
    pub fn attach(
        &mut self,
        name: &str,
        callback: impl FnMut(&KeyEvent, &mut CallbackContext<'_>) -> CallbackResult + 'static,
        key: Option<&str>,
        layer: Option<&str>,
    ) -> Result<CallbackId, EomapsError> {
        validate_callback_name(name)?;
        Ok(self.add(name, Box::new(callback), key, layer))
    }

    fn add(
        &mut self,
        name: &str,
        callback: KeyCallback,
        key: Option<&str>,
        layer: Option<&str>,
    ) -> CallbackId {
        let layer = layer.unwrap_or(&self.layer).to_string();
        self.callbacks.add(
            name,
            &layer,
            CallbackTarget::Key(key.map(str::to_string)),
            callback,
            None,
            false,
        )
    }

    /// Attaches the `switch_layer` callback showing `show` when `key` is pressed.
    ///
    /// The layer name is validated when the callback is attached.
    pub fn attach_switch_layer(
        &mut self,
        key: &str,
        show: &str,
        layer: Option<&str>,
    ) -> Result<CallbackId, EomapsError> {
        crate::layer_name::parse_multi(show)?;

        let show = show.to_string();
        let callback = move |_: &KeyEvent, ctx: &mut CallbackContext<'_>| {
            ctx.bm.set_bg_layer(&show)?;
            Ok(())
        };

        Ok(self.add(
            CallbackKind::SWITCH_LAYER.name,
            Box::new(callback),
            Some(key),
            layer,
        ))
    }

    /// Attaches the `fetch_layers` callback drawing the backgrounds of `layers` into the cache
    /// when `key` is pressed.
    pub fn attach_fetch_layers(
        &mut self,
        key: &str,
        layers: impl IntoIterator<Item = impl Into<String>>,
        layer: Option<&str>,
    ) -> CallbackId {
        let layers: Vec<String> = layers.into_iter().map(Into::into).collect();
        let callback = move |_: &KeyEvent, ctx: &mut CallbackContext<'_>| {
            ctx.bm
                .fetch_layers(&mut *ctx.canvas, layers.iter().map(String::as_str));
            Ok(())
        };

        self.add(
            CallbackKind::FETCH_LAYERS.name,
            Box::new(callback),
            Some(key),
            layer,
        )
    }

    /// Removes a callback.
    pub fn remove(&mut self, id: &CallbackId, bm: &mut BlitManager) -> Result<(), EomapsError> {
        self.callbacks.remove(id, bm)
    }

    /// Identifiers of the attached callbacks in attachment order.
    pub fn attached_callbacks(&self) -> Vec<CallbackId> {
        self.callbacks.ids()
    }

    /// Updates the sticky modifier: pressing the sticky key again releases it, any other key
    /// replaces it.
    pub(crate) fn update_sticky(&mut self, key: &str) {
        if self.sticky.as_deref() == Some(key) {
            self.sticky = None;
        } else {
            self.sticky = Some(key.to_string());
        }
    }

    /// Executes the callbacks attached to the key. Returns the number of executed callbacks.
    pub(crate) fn dispatch(&mut self, event: &KeyEvent, ctx: &mut CallbackContext<'_>) -> usize {
        self.update_sticky(&event.key);

        let active = ctx.bm.bg_layer().to_string();
        let order = self.callbacks.execution_order(|entry| {
            let key_matches = match &entry.id.target {
                CallbackTarget::Key(None) => true,
                CallbackTarget::Key(Some(key)) => *key == event.key,
                CallbackTarget::Mouse { .. } => false,
            };
            key_matches && layer_is_active(&entry.id.layer, &active)
        });

        for &index in &order {
            let Some(entry) = self.callbacks.get_mut(index) else {
                continue;
            };
            if let Err(err) = (entry.callback)(event, ctx) {
                debug!("Keypress callback {} failed: {err}", entry.id);
            }
        }

        order.len()
    }
}
