//! The cycle controller: pulls events from a source and injects them.
//!
//! Each iteration folds in pending failure notices, polls for native
//! crashes, captures whatever reports were requested, then handles exactly
//! one event (or one end-of-pass marker).

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use gremlin_event::{Event, EventSource, SourceError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::poller::NativeCrashPoller;
use crate::report::{Diagnostics, ReportKind};
use crate::state::RunState;
use crate::target::{InjectResult, Target};

/// Controller settings, derived from the run configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Cycles to run.
    pub count: u64,
    pub ignore_security_exceptions: bool,
    pub ignore_native_crashes: bool,
    pub kill_process_after_error: bool,
    pub request_bugreport: bool,
    pub bugreport_frequency: Option<u64>,
    pub send_no_events: bool,
    pub verbose: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            ignore_security_exceptions: false,
            ignore_native_crashes: false,
            kill_process_after_error: false,
            request_bugreport: false,
            bugreport_frequency: None,
            send_no_events: false,
            verbose: 0,
        }
    }
}

/// Events the target refused, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedCounts {
    pub keys: u64,
    pub pointers: u64,
    pub trackballs: u64,
    pub flips: u64,
    pub rotations: u64,
}

impl DroppedCounts {
    pub fn record(&mut self, event: &Event) {
        match event {
            Event::Key { .. } => self.keys += 1,
            Event::Touch(_) => self.pointers += 1,
            Event::Trackball(_) => self.trackballs += 1,
            Event::Flip { .. } => self.flips += 1,
            Event::Rotation { .. } => self.rotations += 1,
            _ => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.keys + self.pointers + self.trackballs + self.flips + self.rotations
    }
}

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// All cycles ran.
    Complete,
    /// A failure notice requested an abort.
    Aborted,
    /// The target's transport broke.
    SystemCrashed,
    /// An injection was refused for lack of privileges.
    SecurityDenied,
    /// A cycle-counting source ran dry.
    SourceExhausted,
    /// The controller hit an error it could not recover from.
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub events_injected: u64,
    pub cycles: u64,
    pub dropped: DroppedCounts,
    pub stop: StopReason,
}

enum Step {
    Continue,
    Stop(StopReason),
}

pub struct CycleController<'a, S: EventSource, T: Target, D: Diagnostics> {
    config: ControllerConfig,
    source: &'a mut S,
    target: &'a mut T,
    diagnostics: &'a mut D,
    state: &'a mut RunState,
    poller: Option<&'a mut NativeCrashPoller>,
    events: u64,
    cycles: u64,
    dropped: DroppedCounts,
}

impl<'a, S: EventSource, T: Target, D: Diagnostics> CycleController<'a, S, T, D> {
    pub fn new(
        config: ControllerConfig,
        source: &'a mut S,
        target: &'a mut T,
        diagnostics: &'a mut D,
        state: &'a mut RunState,
        poller: Option<&'a mut NativeCrashPoller>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            diagnostics,
            state,
            poller,
            events: 0,
            cycles: 0,
            dropped: DroppedCounts::default(),
        }
    }

    pub fn run(mut self) -> RunSummary {
        let mut stop = StopReason::Complete;
        while self.cycles < self.config.count {
            match catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(Step::Continue)) => {}
                Ok(Ok(Step::Stop(reason))) => {
                    stop = reason;
                    break;
                }
                Ok(Err(err)) => {
                    error!(%err, "error in event loop");
                    stop = StopReason::Fault(err.to_string());
                    break;
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(panic = %message, "panic in event loop");
                    stop = StopReason::Fault(message);
                    break;
                }
            }
        }

        info!(events = self.events, cycles = self.cycles, "Events injected");
        RunSummary {
            events_injected: self.events,
            cycles: self.cycles,
            dropped: self.dropped,
            stop,
        }
    }

    fn step(&mut self) -> Result<Step, SourceError> {
        let drained = self.state.drain();
        let mut reports = drained.reports;
        if self.poll_native_crash() {
            if self.config.request_bugreport {
                reports.push(ReportKind::NativeCrashBugreport);
            }
            if !self.config.ignore_native_crashes || self.config.kill_process_after_error {
                self.state.request_abort();
            }
        }

        for report in &reports {
            self.capture(report);
        }

        if self.state.abort_requested() {
            warn!("aborted due to error");
            return Ok(Step::Stop(StopReason::Aborted));
        }

        if self.config.send_no_events {
            self.events += 1;
            self.cycles += 1;
            return Ok(Step::Continue);
        }

        if self.config.verbose > 0 && self.events % 100 == 0 && self.events != 0 {
            info!(event = self.events, "Sending event");
        }

        match self.source.next_event()? {
            Some(Event::Throttle { delay }) => {
                thread::sleep(delay);
                Ok(Step::Continue)
            }
            Some(event) => {
                let stop = self.inject(&event);
                self.events += 1;
                if self.source.counts_events() {
                    self.cycles += 1;
                }
                Ok(stop.map_or(Step::Continue, Step::Stop))
            }
            None if self.source.counts_events() => Ok(Step::Stop(StopReason::SourceExhausted)),
            None => {
                self.cycles += 1;
                if let Some(every) = self.config.bugreport_frequency {
                    if every > 0 && self.cycles % every == 0 {
                        self.state.request(ReportKind::PeriodicBugreport);
                    }
                }
                Ok(Step::Continue)
            }
        }
    }

    /// Only crashes found after the first event count.
    fn poll_native_crash(&mut self) -> bool {
        let Some(poller) = self.poller.as_deref_mut() else {
            return false;
        };
        let found = poller.poll();
        if found && self.events > 0 {
            info!(event = self.events, "native crash detected");
            return true;
        }
        false
    }

    fn inject(&mut self, event: &Event) -> Option<StopReason> {
        match self.target.inject(event) {
            InjectResult::Success => None,
            InjectResult::Failed => {
                debug!(kind = event.kind(), "injection failed");
                self.dropped.record(event);
                None
            }
            InjectResult::TransportError => {
                error!(event = self.events, "target connection lost, system appears to have crashed");
                Some(StopReason::SystemCrashed)
            }
            InjectResult::SecurityError if self.config.ignore_security_exceptions => None,
            InjectResult::SecurityError => {
                error!(kind = event.kind(), "injection refused: permission denied");
                Some(StopReason::SecurityDenied)
            }
        }
    }

    fn capture(&mut self, report: &ReportKind) {
        if let Err(err) = self.diagnostics.capture(report) {
            warn!(report = %report, %err, "diagnostic capture failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_event::{KeyAction, KeyCode};

    #[test]
    fn test_dropped_counts_by_kind() {
        let mut dropped = DroppedCounts::default();
        dropped.record(&Event::Key {
            action: KeyAction::Down,
            code: KeyCode::BACK,
        });
        dropped.record(&Event::Flip { open: true });
        dropped.record(&Event::Flip { open: false });
        assert_eq!(dropped.keys, 1);
        assert_eq!(dropped.flips, 2);
        assert_eq!(dropped.total(), 3);
    }
}
