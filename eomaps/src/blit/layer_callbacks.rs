use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use log::debug;

use super::BlitManager;
use crate::error::CallbackResult;
use crate::layer_name::simple_names;

/// Identifier of a layer-change callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayerCallbackId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

impl LayerCallbackId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Description of a layer activation passed to layer-change callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerChange {
    /// The activated (possibly combined) layer.
    pub layer: String,
    /// The layer that was active before.
    pub previous: String,
    /// False if the same set of simple layers was activated again.
    pub changed: bool,
}

/// Callback executed when a layer is activated.
pub type LayerCallback = Box<dyn FnMut(&LayerChange, &mut BlitManager) -> CallbackResult>;

type Entry = (LayerCallbackId, LayerCallback);

/// Layer-change observers.
///
/// On every activation the callbacks are executed in the following order:
/// 1. persistent global callbacks, most recently registered first;
/// 2. single-shot global callbacks in registration order;
/// 3. persistent callbacks of each activated simple layer, most recently registered first, only
///    if the set of simple layers changed;
/// 4. single-shot callbacks of each activated simple layer in registration order.
///
/// Single-shot callbacks are removed before they are executed.
#[derive(Default)]
pub struct LayerCallbacks {
    global_persistent: Vec<Entry>,
    global_single: VecDeque<Entry>,
    layer_persistent: AHashMap<String, Vec<Entry>>,
    layer_single: AHashMap<String, VecDeque<Entry>>,
}

impl std::fmt::Debug for LayerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCallbacks")
            .field("len", &self.len())
            .finish()
    }
}

impl LayerCallbacks {
    /// Registers a callback for any layer (`layer == None`) or for one simple layer.
    pub fn add(
        &mut self,
        callback: LayerCallback,
        layer: Option<&str>,
        persistent: bool,
    ) -> LayerCallbackId {
        let id = LayerCallbackId::next();
        match (layer, persistent) {
            (None, true) => self.global_persistent.push((id, callback)),
            (None, false) => self.global_single.push_back((id, callback)),
            (Some(layer), true) => self
                .layer_persistent
                .entry(layer.to_string())
                .or_default()
                .push((id, callback)),
            (Some(layer), false) => self
                .layer_single
                .entry(layer.to_string())
                .or_default()
                .push_back((id, callback)),
        }

        id
    }

    /// Removes the callback. Returns false if it is not registered.
    pub fn remove(&mut self, id: LayerCallbackId) -> bool {
        let before = self.len();
        self.global_persistent.retain(|(i, _)| *i != id);
        self.global_single.retain(|(i, _)| *i != id);
        for entries in self.layer_persistent.values_mut() {
            entries.retain(|(i, _)| *i != id);
        }
        for entries in self.layer_single.values_mut() {
            entries.retain(|(i, _)| *i != id);
        }

        self.len() != before
    }

    /// Total number of registered callbacks.
    pub fn len(&self) -> usize {
        self.global_persistent.len()
            + self.global_single.len()
            + self.layer_persistent.values().map(Vec::len).sum::<usize>()
            + self.layer_single.values().map(VecDeque::len).sum::<usize>()
    }

    /// Returns true if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves callbacks registered in `other` into `self`, keeping their registration order.
    pub(super) fn merge(&mut self, other: LayerCallbacks) {
        self.global_persistent.extend(other.global_persistent);
        self.global_single.extend(other.global_single);
        for (layer, entries) in other.layer_persistent {
            self.layer_persistent.entry(layer).or_default().extend(entries);
        }
        for (layer, entries) in other.layer_single {
            self.layer_single.entry(layer).or_default().extend(entries);
        }
    }

    /// Executes the callbacks for the activation. Failing callbacks are logged and do not stop
    /// the remaining ones.
    ///
    /// Persistent callbacks run only if the set of simple layer names changed.
    pub(super) fn run(&mut self, change: &LayerChange, bm: &mut BlitManager) {
        if change.changed {
            for (id, callback) in self.global_persistent.iter_mut().rev() {
                invoke(*id, callback, change, bm);
            }
        }

        while let Some((id, mut callback)) = self.global_single.pop_front() {
            invoke(id, &mut callback, change, bm);
        }

        let names = simple_names(&change.layer);
        if change.changed {
            for name in &names {
                if let Some(entries) = self.layer_persistent.get_mut(name) {
                    for (id, callback) in entries.iter_mut().rev() {
                        invoke(*id, callback, change, bm);
                    }
                }
            }
        }

        for name in &names {
            if let Some(mut entries) = self.layer_single.remove(name) {
                while let Some((id, mut callback)) = entries.pop_front() {
                    invoke(id, &mut callback, change, bm);
                }
            }
        }
    }
}

fn invoke(
    id: LayerCallbackId,
    callback: &mut LayerCallback,
    change: &LayerChange,
    bm: &mut BlitManager,
) {
    if let Err(err) = callback(change, bm) {
        debug!(
            "Layer-change callback {id:?} failed for layer {:?}: {err}",
            change.layer
        );
    }
}
