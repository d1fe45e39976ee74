use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Inter-event delay policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throttle {
    pub delay: Duration,
    /// Draw each delay uniformly from `1..=delay` millis instead of using it as-is.
    pub randomize: bool,
}

impl Throttle {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            randomize: false,
        }
    }

    pub fn randomized(delay: Duration) -> Self {
        Self {
            delay,
            randomize: true,
        }
    }

    /// The delay to insert after a throttlable event, if any.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Duration> {
        let millis = self.delay.as_millis() as u64;
        if millis == 0 {
            return None;
        }
        if self.randomize {
            Some(Duration::from_millis(rng.gen_range(1..=millis)))
        } else {
            Some(self.delay)
        }
    }
}

/// FIFO of pending events. Every throttlable event is followed by a
/// throttle event when a delay is configured.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
    throttle: Throttle,
}

impl EventQueue {
    pub fn new(throttle: Throttle) -> Self {
        Self {
            events: VecDeque::new(),
            throttle,
        }
    }

    pub fn push<R: Rng + ?Sized>(&mut self, event: Event, rng: &mut R) {
        let throttlable = event.is_throttlable();
        self.events.push_back(event);
        if throttlable {
            if let Some(delay) = self.throttle.next_delay(rng) {
                self.events.push_back(Event::Throttle { delay });
            }
        }
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn throttle(&self) -> Throttle {
        self.throttle
    }
}
