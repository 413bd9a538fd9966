//! Interactive callbacks of map-views.
//!
//! Input handling is done in several steps:
//! 1. The host converts its native events into [`RawUserEvent`]s.
//! 2. The [`EventProcessor`] keeps track of the input state (pressed buttons and keys, last
//!    click time) and turns raw events into [`UserEvent`]s: single and double clicks, button
//!    releases, pointer motion and key presses.
//! 3. The [`Figure`](crate::Figure) dispatches user events to the callback containers of the
//!    map-views under the pointer: [`ClickContainer`] for clicks and motion,
//!    [`PickContainer`] for clicks that pick data points and [`KeypressContainer`] for keys.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use eomaps_types::cartesian::Point2d;
use eomaps_types::geo::Crs;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::blit::BlitManager;
use crate::error::EomapsError;
use crate::maps::MapsHandle;
use crate::render::Canvas;
use crate::view::AxesId;

mod callback;
mod click;
mod event_processor;
mod keypress;
mod pick;

pub use callback::{
    validate_callback_name, CallbackId, CallbackKind, CallbackTarget, Cleanup, BUILTIN_CALLBACKS,
    CALLBACK_PRIORITY,
};
pub use click::{
    AttachOptions, ClickCallback, ClickConfig, ClickContainer, ClickedPositions, MarkerFactory,
};
pub use event_processor::{EventProcessor, EventProcessorConfig};
pub use keypress::{KeyCallback, KeyEvent, KeypressContainer};
pub use pick::{PickCallback, PickConfig, PickContainer, PickEvent, PickHit, PickResult, PickedValues};

/// Mouse button.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MouseButton {
    /// Left button (`1`).
    Left,
    /// Middle button (`2`).
    Middle,
    /// Right button (`3`).
    Right,
    /// Any other button.
    Other,
}

impl Display for MouseButton {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            MouseButton::Left => "1",
            MouseButton::Middle => "2",
            MouseButton::Right => "3",
            MouseButton::Other => "other",
        };
        f.write_str(value)
    }
}

impl FromStr for MouseButton {
    type Err = EomapsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "left" => Ok(Self::Left),
            "2" | "middle" => Ok(Self::Middle),
            "3" | "right" => Ok(Self::Right),
            "other" => Ok(Self::Other),
            _ => Err(EomapsError::Generic(format!("unknown mouse button: {s:?}"))),
        }
    }
}

/// Kind of a click.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClickKind {
    /// A button was pressed.
    Single,
    /// A button was pressed twice in a short time.
    Double,
    /// A button was released.
    Release,
}

impl Display for ClickKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            ClickKind::Single => "single",
            ClickKind::Double => "double",
            ClickKind::Release => "release",
        };
        f.write_str(value)
    }
}

impl FromStr for ClickKind {
    type Err = EomapsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            "release" => Ok(Self::Release),
            _ => Err(EomapsError::Generic(format!("unknown click kind: {s:?}"))),
        }
    }
}

/// Raw input event given by the host.
///
/// Pointer positions are in pixels relative to the top-left corner of the axes under the
/// pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawUserEvent {
    /// A mouse button was pressed.
    ButtonPressed(MouseButton),
    /// A mouse button was released.
    ButtonReleased(MouseButton),
    /// The pointer moved. `axes` is `None` if the pointer is outside of all map axes.
    PointerMoved {
        /// Axes under the pointer.
        axes: Option<AxesId>,
        /// Pointer position in pixels.
        position: Point2d,
    },
    /// A key was pressed.
    KeyPressed(String),
    /// A key was released.
    KeyReleased(String),
}

/// State of the pointer at the moment of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseEvent {
    /// Axes under the pointer.
    pub axes: Option<AxesId>,
    /// Pointer position in pixels relative to the axes.
    pub screen_position: Point2d,
    /// Currently pressed key.
    pub modifier: Option<String>,
}

/// Input event produced by the [`EventProcessor`].
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// A mouse button was clicked or released.
    Click(ClickKind, MouseButton, MouseEvent),
    /// The pointer moved. The button is set if exactly one button is pressed.
    Motion(Option<MouseButton>, MouseEvent),
    /// A key was pressed.
    KeyPress(String),
    /// A key was released.
    KeyRelease(String),
}

/// Click or motion event passed to callbacks, with the position in the projection of the
/// map-view executing the callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickEvent {
    /// Axes the event happened in.
    pub axes: Option<AxesId>,
    /// Position in plot-projection units of `crs`.
    pub position: Point2d,
    /// Projection of `position`.
    pub crs: Crs,
    /// Pointer position in pixels.
    pub screen_position: Point2d,
    /// Kind of the click. Motion events are reported as [`ClickKind::Single`].
    pub kind: ClickKind,
    /// Clicked button. `None` for motion without a pressed button.
    pub button: Option<MouseButton>,
    /// Effective modifier (pressed or sticky key).
    pub modifier: Option<String>,
    /// Set for events forwarded from another map-view.
    pub forwarded: bool,
}

impl ClickEvent {
    /// Returns a copy of the event with the position in another projection.
    pub fn reprojected(&self, position: Point2d, crs: Crs) -> Self {
        Self {
            position,
            crs,
            ..self.clone()
        }
    }

    pub(crate) fn with_modifier(&self, modifier: Option<String>) -> Self {
        Self {
            modifier,
            ..self.clone()
        }
    }
}

/// Everything a callback may act on while it is executed.
pub struct CallbackContext<'a> {
    /// Blit manager of the figure.
    pub bm: &'a mut BlitManager,
    /// Canvas of the figure.
    pub canvas: &'a mut dyn Canvas,
    /// Map-view executing the callback.
    pub maps: MapsHandle,
    /// Layer of the map-view executing the callback.
    pub layer: &'a str,
}

/// Event categories that can be forwarded between map-views.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Click callbacks.
    Click,
    /// Pick callbacks.
    Pick,
    /// Move callbacks.
    Move,
}
