use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use super::{ClickKind, MouseButton};
use crate::blit::BlitManager;
use crate::error::EomapsError;
use crate::layer_name::{is_subset, ALL_LAYER};

/// Static description of a built-in callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallbackKind {
    /// Name used in callback identifiers.
    pub name: &'static str,
    /// Short description of what the callback does.
    pub description: &'static str,
}

impl CallbackKind {
    /// Collects the clicked positions (and picked values).
    pub const GET_VALUES: CallbackKind = CallbackKind {
        name: "get_values",
        description: "Collect the positions, ids and values of clicked or picked points.",
    };
    /// Logs the event.
    pub const PRINT_TO_CONSOLE: CallbackKind = CallbackKind {
        name: "print_to_console",
        description: "Log the position, id and value of clicked or picked points.",
    };
    /// Draws a marker.
    pub const MARK: CallbackKind = CallbackKind {
        name: "mark",
        description: "Draw a marker at the clicked or picked position.",
    };
    /// Removes permanent markers.
    pub const CLEAR_MARKERS: CallbackKind = CallbackKind {
        name: "clear_markers",
        description: "Remove all permanent markers of the container.",
    };
    /// Activates a layer.
    pub const SWITCH_LAYER: CallbackKind = CallbackKind {
        name: "switch_layer",
        description: "Show the given layer when the key is pressed.",
    };
    /// Fetches layer backgrounds in advance.
    pub const FETCH_LAYERS: CallbackKind = CallbackKind {
        name: "fetch_layers",
        description: "Draw the backgrounds of the given layers into the cache.",
    };
}

/// All built-in callbacks.
pub const BUILTIN_CALLBACKS: [CallbackKind; 6] = [
    CallbackKind::GET_VALUES,
    CallbackKind::PRINT_TO_CONSOLE,
    CallbackKind::MARK,
    CallbackKind::CLEAR_MARKERS,
    CallbackKind::SWITCH_LAYER,
    CallbackKind::FETCH_LAYERS,
];

/// Order in which callbacks attached to the same event are executed. Other callbacks are
/// executed afterwards in the order they were attached.
pub const CALLBACK_PRIORITY: [&str; 4] = [
    CallbackKind::GET_VALUES.name,
    CallbackKind::PRINT_TO_CONSOLE.name,
    CallbackKind::MARK.name,
    CallbackKind::CLEAR_MARKERS.name,
];

lazy_static! {
    static ref MOUSE_ID_RE: Regex = Regex::new(
        r"^(?P<name>.+?)_(?P<index>\d+)__(?P<layer>.*)__(?P<kind>single|double|release)__(?P<button>[^_]+)__(?P<modifier>.+)$"
    )
    .expect("valid regex");
    static ref KEY_ID_RE: Regex =
        Regex::new(r"^(?P<name>.+?)_(?P<index>\d+)__(?P<layer>.*)__key__(?P<key>.+)$")
            .expect("valid regex");
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid regex");
}

const NONE: &str = "None";

/// Checks that a callback name can be used in a [`CallbackId`].
pub fn validate_callback_name(name: &str) -> Result<(), EomapsError> {
    if NAME_RE.is_match(name) && !name.contains("__") && !name.ends_with('_') {
        Ok(())
    } else {
        Err(EomapsError::InvalidPickMethod(name.to_string()))
    }
}

/// Event a callback is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackTarget {
    /// Mouse event.
    Mouse {
        /// Kind of the click.
        kind: ClickKind,
        /// Button. `None` for motion without a pressed button.
        button: Option<MouseButton>,
        /// Required modifier key.
        modifier: Option<String>,
    },
    /// Key press. `None` matches any key.
    Key(Option<String>),
}

/// Identifier of an attached callback.
///
/// Formatted as `{name}_{index}__{layer}__{kind}__{button}__{modifier}` for mouse callbacks and
/// as `{name}_{index}__{layer}__key__{key}` for keypress callbacks, with `None` for missing
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackId {
    /// Name of the callback.
    pub name: String,
    /// Index making the identifier unique.
    pub index: usize,
    /// Layer the callback is executed on.
    pub layer: String,
    /// Event the callback is attached to.
    pub target: CallbackTarget,
}

fn fmt_optional(value: Option<impl Display>) -> String {
    value.map_or_else(|| NONE.to_string(), |v| v.to_string())
}

fn parse_optional(value: &str) -> Option<String> {
    (value != NONE).then(|| value.to_string())
}

impl Display for CallbackId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            CallbackTarget::Mouse {
                kind,
                button,
                modifier,
            } => write!(
                f,
                "{}_{}__{}__{}__{}__{}",
                self.name,
                self.index,
                self.layer,
                kind,
                fmt_optional(button.as_ref()),
                fmt_optional(modifier.as_ref()),
            ),
            CallbackTarget::Key(key) => write!(
                f,
                "{}_{}__{}__key__{}",
                self.name,
                self.index,
                self.layer,
                fmt_optional(key.as_ref())
            ),
        }
    }
}

impl FromStr for CallbackId {
    type Err = EomapsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EomapsError::InvalidCallbackId(s.to_string());
        let index = |value: &str| value.parse::<usize>().map_err(|_| invalid());

        if let Some(captures) = MOUSE_ID_RE.captures(s) {
            let button = match &captures["button"] {
                NONE => None,
                value => Some(value.parse::<MouseButton>().map_err(|_| invalid())?),
            };

            return Ok(Self {
                name: captures["name"].to_string(),
                index: index(&captures["index"])?,
                layer: captures["layer"].to_string(),
                target: CallbackTarget::Mouse {
                    kind: captures["kind"].parse()?,
                    button,
                    modifier: parse_optional(&captures["modifier"]),
                },
            });
        }

        if let Some(captures) = KEY_ID_RE.captures(s) {
            return Ok(Self {
                name: captures["name"].to_string(),
                index: index(&captures["index"])?,
                layer: captures["layer"].to_string(),
                target: CallbackTarget::Key(parse_optional(&captures["key"])),
            });
        }

        Err(invalid())
    }
}

/// Action executed when a callback is removed, releasing its state.
pub type Cleanup = Box<dyn FnOnce(&mut BlitManager)>;

pub(crate) struct CallbackEntry<C> {
    pub id: CallbackId,
    pub callback: C,
    pub cleanup: Option<Cleanup>,
    pub on_motion: bool,
}

/// Attached callbacks of one container in attachment order.
pub(crate) struct CallbackRegistry<C> {
    entries: Vec<CallbackEntry<C>>,
    next_index: usize,
}

impl<C> Default for CallbackRegistry<C> {
    fn default() -> Self {
        Self {
            entries: vec![],
            next_index: 0,
        }
    }
}

impl<C> CallbackRegistry<C> {
    pub fn add(
        &mut self,
        name: &str,
        layer: &str,
        target: CallbackTarget,
        callback: C,
        cleanup: Option<Cleanup>,
        on_motion: bool,
    ) -> CallbackId {
        let id = CallbackId {
            name: name.to_string(),
            index: self.next_index,
            layer: layer.to_string(),
            target,
        };
        self.next_index += 1;

        self.entries.push(CallbackEntry {
            id: id.clone(),
            callback,
            cleanup,
            on_motion,
        });

        id
    }

    /// Removes the callback and executes its cleanup action.
    pub fn remove(&mut self, id: &CallbackId, bm: &mut BlitManager) -> Result<(), EomapsError> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.id == *id)
            .ok_or_else(|| EomapsError::CallbackNotFound(id.to_string()))?;

        let entry = self.entries.remove(position);
        if let Some(cleanup) = entry.cleanup {
            cleanup(bm);
        }

        Ok(())
    }

    pub fn ids(&self) -> Vec<CallbackId> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of the entries matching the filter in execution order.
    pub fn execution_order(&self, filter: impl Fn(&CallbackEntry<C>) -> bool) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.entries.len())
            .filter(|&i| filter(&self.entries[i]))
            .collect();
        indices.sort_by_key(|&i| priority(&self.entries[i].id.name));
        indices
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CallbackEntry<C>> {
        self.entries.get_mut(index)
    }
}

fn priority(name: &str) -> usize {
    CALLBACK_PRIORITY
        .iter()
        .position(|n| *n == name)
        .unwrap_or(CALLBACK_PRIORITY.len())
}

/// Returns true if a callback of the given layer is executed while `active` is shown.
pub(crate) fn layer_is_active(layer: &str, active: &str) -> bool {
    layer == ALL_LAYER || is_subset(layer, active)
}
