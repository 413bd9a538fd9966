use std::time::Duration;

use eomaps_types::cartesian::{CartesianPoint2d, Point2d};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use super::{ClickKind, MouseButton, MouseEvent, RawUserEvent, UserEvent};
use crate::view::AxesId;

const DRAG_THRESHOLD: f64 = 3.0;
const DBL_CLICK_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration of an [`EventProcessor`].
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventProcessorConfig {
    double_click_timeout: Duration,
    drag_threshold: f64,
}

impl Default for EventProcessorConfig {
    fn default() -> Self {
        Self {
            double_click_timeout: DBL_CLICK_TIMEOUT,
            drag_threshold: DRAG_THRESHOLD,
        }
    }
}

impl EventProcessorConfig {
    /// Maximum time between two presses of a button that make a double click.
    pub fn double_click_timeout(&self) -> Duration {
        self.double_click_timeout
    }

    /// Sets the maximum time between two presses of a button that make a double click.
    pub fn with_double_click_timeout(mut self, timeout: Duration) -> Self {
        self.double_click_timeout = timeout;
        self
    }

    /// Sets the maximum time between two presses of a button that make a double click.
    pub fn set_double_click_timeout(&mut self, timeout: Duration) {
        self.double_click_timeout = timeout;
    }

    /// Distance in pixels (taxicab) the pointer may move between the presses of a double click.
    pub fn drag_threshold(&self) -> f64 {
        self.drag_threshold
    }

    /// Sets the distance in pixels the pointer may move between the presses of a double click.
    pub fn with_drag_threshold(mut self, threshold: f64) -> Self {
        self.drag_threshold = threshold;
        self
    }

    /// Sets the distance in pixels the pointer may move between the presses of a double click.
    pub fn set_drag_threshold(&mut self, threshold: f64) {
        self.drag_threshold = threshold;
    }
}

/// Turns raw input events into clicks, double clicks, releases, motion and key events.
#[derive(Debug)]
pub struct EventProcessor {
    config: EventProcessorConfig,
    pointer_axes: Option<AxesId>,
    pointer_position: Point2d,
    last_press_position: Point2d,
    pressed: Vec<MouseButton>,
    pressed_key: Option<String>,
    last_press_time: SystemTime,
    last_press_button: Option<MouseButton>,
    double_clicked: bool,
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new(EventProcessorConfig::default())
    }
}

impl EventProcessor {
    /// Creates a new processor.
    pub fn new(config: EventProcessorConfig) -> Self {
        Self {
            config,
            pointer_axes: None,
            pointer_position: Point2d::origin(),
            last_press_position: Point2d::origin(),
            pressed: vec![],
            pressed_key: None,
            last_press_time: SystemTime::UNIX_EPOCH,
            last_press_button: None,
            double_clicked: false,
        }
    }

    /// Configuration of the processor.
    pub fn config(&self) -> EventProcessorConfig {
        self.config
    }

    /// Updates the configuration of the processor.
    pub fn set_config(&mut self, config: EventProcessorConfig) {
        self.config = config;
    }

    /// Currently pressed key.
    pub fn pressed_key(&self) -> Option<&str> {
        self.pressed_key.as_deref()
    }

    /// Processes the event at the current time.
    pub fn process(&mut self, event: RawUserEvent) -> Vec<UserEvent> {
        self.process_at(event, SystemTime::now())
    }

    /// Processes the event as if it happened at `now`.
    pub fn process_at(&mut self, event: RawUserEvent, now: SystemTime) -> Vec<UserEvent> {
        match event {
            RawUserEvent::ButtonPressed(button) => {
                if !self.pressed.contains(&button) {
                    self.pressed.push(button);
                }

                let is_double = !self.double_clicked
                    && self.last_press_button == Some(button)
                    && now
                        .duration_since(self.last_press_time)
                        .map_or(false, |elapsed| elapsed < self.config.double_click_timeout)
                    && self.pointer_position.taxicab_distance(&self.last_press_position)
                        <= self.config.drag_threshold;

                self.double_clicked = is_double;
                self.last_press_time = now;
                self.last_press_button = Some(button);
                self.last_press_position = self.pointer_position;

                let kind = if is_double {
                    ClickKind::Double
                } else {
                    ClickKind::Single
                };
                vec![UserEvent::Click(kind, button, self.mouse_event())]
            }
            RawUserEvent::ButtonReleased(button) => {
                self.pressed.retain(|b| *b != button);
                vec![UserEvent::Click(
                    ClickKind::Release,
                    button,
                    self.mouse_event(),
                )]
            }
            RawUserEvent::PointerMoved { axes, position } => {
                self.pointer_axes = axes;
                self.pointer_position = position;

                // Motion with several buttons held belongs to neither clicks nor moves.
                let button = match self.pressed.as_slice() {
                    [] => None,
                    [button] => Some(*button),
                    _ => return vec![],
                };
                vec![UserEvent::Motion(button, self.mouse_event())]
            }
            RawUserEvent::KeyPressed(key) => {
                self.pressed_key = Some(key.clone());
                vec![UserEvent::KeyPress(key)]
            }
            RawUserEvent::KeyReleased(key) => {
                if self.pressed_key.as_deref() == Some(key.as_str()) {
                    self.pressed_key = None;
                }
                vec![UserEvent::KeyRelease(key)]
            }
        }
    }

    fn mouse_event(&self) -> MouseEvent {
        MouseEvent {
            axes: self.pointer_axes,
            screen_position: self.pointer_position,
            modifier: self.pressed_key.clone(),
        }
    }
}
