//! Map-views and the registry that owns them.

use eomaps_types::geo::Crs;

use crate::blit::HookId;
use crate::control::{ClickContainer, EventCategory, KeypressContainer, PickContainer};
use crate::data_manager::SharedDataManager;
use crate::layer_name::ALL_LAYER;
use crate::search_tree::SearchTree;
use crate::view::AxesId;

/// Weak handle of a map-view registered in a [`Figure`](crate::Figure).
///
/// The handle stays valid until the map-view is removed. Handles of removed map-views never
/// become valid again, even if their slot is reused.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MapsHandle {
    index: usize,
    generation: u64,
}

/// A map-view: one layer of one map axes with an optional dataset and its callbacks.
#[derive(Debug)]
pub struct Maps {
    pub(crate) layer: String,
    pub(crate) crs: Crs,
    pub(crate) axes: AxesId,
    pub(crate) data: Option<SharedDataManager>,
    pub(crate) fetch_hook: Option<HookId>,
    pub(crate) tree: SearchTree,
    pub(crate) click: ClickContainer,
    pub(crate) motion: ClickContainer,
    pub(crate) pick: PickContainer,
    pub(crate) keypress: KeypressContainer,
}

impl Maps {
    pub(crate) fn new(layer: String, crs: Crs, axes: AxesId) -> Self {
        Self {
            click: ClickContainer::click(layer.clone()),
            motion: ClickContainer::motion(layer.clone()),
            pick: PickContainer::new(layer.clone()),
            keypress: KeypressContainer::new(layer.clone()),
            layer,
            crs,
            axes,
            data: None,
            fetch_hook: None,
            tree: SearchTree::new(),
        }
    }

    /// Layer of the map-view.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Plot projection of the map-view.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Axes the map-view is drawn in.
    pub fn axes(&self) -> AxesId {
        self.axes
    }

    /// Data manager of the attached dataset.
    pub fn data(&self) -> Option<&SharedDataManager> {
        self.data.as_ref()
    }

    /// Search tree used by pick callbacks.
    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    /// Search tree used by pick callbacks.
    pub fn tree_mut(&mut self) -> &mut SearchTree {
        &mut self.tree
    }

    /// Click callbacks.
    pub fn click(&self) -> &ClickContainer {
        &self.click
    }

    /// Click callbacks.
    pub fn click_mut(&mut self) -> &mut ClickContainer {
        &mut self.click
    }

    /// Move callbacks.
    pub fn motion(&self) -> &ClickContainer {
        &self.motion
    }

    /// Move callbacks.
    pub fn motion_mut(&mut self) -> &mut ClickContainer {
        &mut self.motion
    }

    /// Pick callbacks.
    pub fn pick(&self) -> &PickContainer {
        &self.pick
    }

    /// Pick callbacks.
    pub fn pick_mut(&mut self) -> &mut PickContainer {
        &mut self.pick
    }

    /// Keypress callbacks.
    pub fn keypress(&self) -> &KeypressContainer {
        &self.keypress
    }

    /// Keypress callbacks.
    pub fn keypress_mut(&mut self) -> &mut KeypressContainer {
        &mut self.keypress
    }

    pub(crate) fn forward_targets(&self, category: EventCategory) -> &[MapsHandle] {
        match category {
            EventCategory::Click => self.click.forward_targets(),
            EventCategory::Move => self.motion.forward_targets(),
            EventCategory::Pick => self.pick.forward_targets(),
        }
    }

    pub(crate) fn add_forward_target(&mut self, category: EventCategory, target: MapsHandle) {
        match category {
            EventCategory::Click => self.click.add_forward_target(target),
            EventCategory::Move => self.motion.add_forward_target(target),
            EventCategory::Pick => self.pick.add_forward_target(target),
        }
    }

    pub(crate) fn forget_target(&mut self, target: MapsHandle) {
        self.click.remove_forward_target(target);
        self.motion.remove_forward_target(target);
        self.pick.remove_forward_target(target);
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    maps: Option<Maps>,
}

/// Storage of the map-views of a figure.
#[derive(Debug, Default)]
pub struct MapsRegistry {
    slots: Vec<Slot>,
}

impl MapsRegistry {
    /// Stores the map-view and returns its handle.
    pub fn insert(&mut self, maps: Maps) -> MapsHandle {
        if let Some(index) = self.slots.iter().position(|slot| slot.maps.is_none()) {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.maps = Some(maps);
            return MapsHandle {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 1,
            maps: Some(maps),
        });
        MapsHandle {
            index: self.slots.len() - 1,
            generation: 1,
        }
    }

    /// Removes the map-view. Returns `None` if the handle is dead.
    pub fn remove(&mut self, handle: MapsHandle) -> Option<Maps> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.maps.take()
    }

    /// Returns the map-view, or `None` if it was removed.
    pub fn get(&self, handle: MapsHandle) -> Option<&Maps> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.maps.as_ref())
    }

    /// Returns the map-view, or `None` if it was removed.
    pub fn get_mut(&mut self, handle: MapsHandle) -> Option<&mut Maps> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.maps.as_mut())
    }

    /// Returns true if the handle refers to a registered map-view.
    pub fn is_alive(&self, handle: MapsHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Handles of all registered map-views.
    pub fn handles(&self) -> Vec<MapsHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.maps.is_some())
            .map(|(index, slot)| MapsHandle {
                index,
                generation: slot.generation,
            })
            .collect()
    }

    /// Number of registered map-views.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.maps.is_some()).count()
    }

    /// Returns true if no map-view is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map-views of the axes that receive its pointer events. Map-views on the `all` layer
    /// come after the others.
    pub fn candidates(&self, axes: AxesId) -> Vec<MapsHandle> {
        let (mut specific, universal): (Vec<_>, Vec<_>) = self
            .handles()
            .into_iter()
            .filter_map(|handle| self.get(handle).map(|maps| (handle, maps)))
            .filter(|(_, maps)| maps.axes == axes)
            .partition(|(_, maps)| maps.layer != ALL_LAYER);

        specific.extend(universal);
        specific.into_iter().map(|(handle, _)| handle).collect()
    }
}
