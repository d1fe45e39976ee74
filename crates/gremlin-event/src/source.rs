use std::collections::VecDeque;

use crate::event::Event;
use crate::weights::WeightError;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid event distribution: {0}")]
    Weights(#[from] WeightError),

    #[error("target surface has zero width or height")]
    EmptySurface,

    #[error("app switching enabled but no launchable components were given")]
    NoApplications,

    #[error("permission events enabled but no permission targets were given")]
    NoPermissionTargets,

    #[error("no usable key code after {attempts} draws")]
    KeySelectionExhausted { attempts: u32 },

    #[error("event source used before validate()")]
    NotValidated,
}

/// Abstract producer of events for the cycle controller.
///
/// Abstracted behind a trait so the controller can be driven by:
/// - the weighted random generator (production)
/// - a fixed event list (tests, replaying a known sequence)
pub trait EventSource {
    /// Check configuration once before the run. Errors here abort startup.
    fn validate(&mut self) -> Result<(), SourceError>;

    /// Next event, or `None` when the source has nothing to give right now.
    fn next_event(&mut self) -> Result<Option<Event>, SourceError>;

    fn set_verbose(&mut self, verbose: u8);

    /// True when every event is one cycle. False for sources that count a
    /// whole pass (signalled by `None`) as a cycle.
    fn counts_events(&self) -> bool {
        true
    }
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn validate(&mut self) -> Result<(), SourceError> {
        (**self).validate()
    }

    fn next_event(&mut self) -> Result<Option<Event>, SourceError> {
        (**self).next_event()
    }

    fn set_verbose(&mut self, verbose: u8) {
        (**self).set_verbose(verbose)
    }

    fn counts_events(&self) -> bool {
        (**self).counts_events()
    }
}

/// Event source backed by a predefined list.
///
/// `once` hands out the list and then reports exhaustion forever.
/// `looping` replays the list, yielding `None` once at the end of each
/// pass so every pass counts as one cycle.
pub struct FixedSource {
    script: Vec<Event>,
    pending: VecDeque<Event>,
    looping: bool,
    verbose: u8,
}

impl FixedSource {
    pub fn once(events: Vec<Event>) -> Self {
        Self {
            pending: events.iter().cloned().collect(),
            script: events,
            looping: false,
            verbose: 0,
        }
    }

    pub fn looping(events: Vec<Event>) -> Self {
        Self {
            looping: true,
            ..Self::once(events)
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }
}

impl EventSource for FixedSource {
    fn validate(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn next_event(&mut self) -> Result<Option<Event>, SourceError> {
        match self.pending.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                if self.looping {
                    self.pending = self.script.iter().cloned().collect();
                }
                Ok(None)
            }
        }
    }

    fn set_verbose(&mut self, verbose: u8) {
        self.verbose = verbose;
    }

    fn counts_events(&self) -> bool {
        !self.looping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn flip(open: bool) -> Event {
        Event::Flip { open }
    }

    #[test]
    fn test_once_exhausts() {
        let mut source = FixedSource::once(vec![flip(true), flip(false)]);
        assert!(source.counts_events());
        assert_eq!(source.next_event().unwrap(), Some(flip(true)));
        assert_eq!(source.next_event().unwrap(), Some(flip(false)));
        assert_eq!(source.next_event().unwrap(), None);
        assert_eq!(source.next_event().unwrap(), None);
    }

    #[test]
    fn test_looping_yields_none_between_passes() {
        let mut source = FixedSource::looping(vec![flip(true)]);
        assert!(!source.counts_events());
        assert_eq!(source.next_event().unwrap(), Some(flip(true)));
        assert_eq!(source.next_event().unwrap(), None);
        assert_eq!(source.next_event().unwrap(), Some(flip(true)));
        assert_eq!(source.remaining(), 0);
    }
}
