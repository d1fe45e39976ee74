//! The system under test, as seen by the controller.

use gremlin_event::Event;

/// Outcome of injecting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectResult {
    Success,
    /// The target refused the event. Counted as dropped, the run goes on.
    Failed,
    /// The channel to the target broke. The target is assumed dead.
    TransportError,
    /// The target rejected the event for lack of privileges.
    SecurityError,
}

impl InjectResult {
    /// Classify a raw injection status code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => InjectResult::Success,
            -1 => InjectResult::TransportError,
            -2 => InjectResult::SecurityError,
            _ => InjectResult::Failed,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            InjectResult::Success => 1,
            InjectResult::Failed => 0,
            InjectResult::TransportError => -1,
            InjectResult::SecurityError => -2,
        }
    }
}

/// Something that accepts injected events.
pub trait Target {
    fn inject(&mut self, event: &Event) -> InjectResult;
}

impl<T: Target + ?Sized> Target for &mut T {
    fn inject(&mut self, event: &Event) -> InjectResult {
        (**self).inject(event)
    }
}

impl<T: Target + ?Sized> Target for Box<T> {
    fn inject(&mut self, event: &Event) -> InjectResult {
        (**self).inject(event)
    }
}
