use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keys::KeyCode;

/// A launchable component on the target (package + entry point).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// A runtime permission that can be granted or revoked for a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionTarget {
    pub package: String,
    pub permission: String,
}

/// Motion action carried by pointer and trackball events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionAction {
    Down,
    Move,
    Up,
    /// A secondary pointer (by index) went down.
    PointerDown(u8),
    /// A secondary pointer (by index) went up.
    PointerUp(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub id: u8,
    pub x: f32,
    pub y: f32,
}

/// One step of a pointer gesture or trackball burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub action: MotionAction,
    /// Logical time of the gesture's initial down. Shared by every event of a burst.
    pub down_time: u64,
    pub pointers: Vec<Pointer>,
    /// Marks steps between the first and last event of a burst.
    pub intermediate: bool,
}

impl MotionEvent {
    pub fn new(action: MotionAction, down_time: u64) -> Self {
        Self {
            action,
            down_time,
            pointers: Vec::new(),
            intermediate: false,
        }
    }

    pub fn with_pointer(mut self, id: u8, x: f32, y: f32) -> Self {
        self.pointers.push(Pointer { id, x, y });
        self
    }

    pub fn intermediate(mut self, intermediate: bool) -> Self {
        self.intermediate = intermediate;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    Down,
    Up,
}

/// Screen rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// A synthetic input event destined for the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Touch-screen gesture step (tap, drag or pinch).
    Touch(MotionEvent),
    /// Trackball move or click.
    Trackball(MotionEvent),
    Key { action: KeyAction, code: KeyCode },
    Rotation { rotation: Rotation, persist: bool },
    Permission { target: PermissionTarget, grant: bool },
    AppSwitch { component: ComponentName },
    /// Hardware keyboard flip; `open` is the new state.
    Flip { open: bool },
    /// Inter-event delay. Never counted as an event.
    Throttle { delay: Duration },
}

impl Event {
    /// Whether a throttle delay should follow this event in the queue.
    pub fn is_throttlable(&self) -> bool {
        match self {
            Event::Touch(motion) | Event::Trackball(motion) => motion.action == MotionAction::Up,
            Event::Key { action, .. } => *action == KeyAction::Up,
            Event::Throttle { .. } => false,
            _ => true,
        }
    }

    pub fn is_throttle(&self) -> bool {
        matches!(self, Event::Throttle { .. })
    }

    /// Short category label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Touch(_) => "touch",
            Event::Trackball(_) => "trackball",
            Event::Key { .. } => "key",
            Event::Rotation { .. } => "rotation",
            Event::Permission { .. } => "permission",
            Event::AppSwitch { .. } => "appswitch",
            Event::Flip { .. } => "flip",
            Event::Throttle { .. } => "throttle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_motion_up_is_throttlable() {
        let down = Event::Touch(MotionEvent::new(MotionAction::Down, 0));
        let step = Event::Touch(MotionEvent::new(MotionAction::Move, 0).intermediate(true));
        let up = Event::Trackball(MotionEvent::new(MotionAction::Up, 0));
        assert!(!down.is_throttlable());
        assert!(!step.is_throttlable());
        assert!(up.is_throttlable());
    }

    #[test]
    fn test_only_key_up_is_throttlable() {
        let down = Event::Key {
            action: KeyAction::Down,
            code: KeyCode::BACK,
        };
        let up = Event::Key {
            action: KeyAction::Up,
            code: KeyCode::BACK,
        };
        assert!(!down.is_throttlable());
        assert!(up.is_throttlable());
    }

    #[test]
    fn test_throttle_never_throttlable() {
        let e = Event::Throttle {
            delay: Duration::from_millis(5),
        };
        assert!(e.is_throttle());
        assert!(!e.is_throttlable());
    }
}
