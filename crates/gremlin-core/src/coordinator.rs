//! Crash and hang coordinator.
//!
//! Entry points here are called from arbitrary threads by whatever watches
//! the target. Each one decides policy on the spot and posts the resulting
//! transition to the controller. Only the system-hang path blocks: it waits
//! until the controller has drained the notice.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::{self, Sender};
use tracing::{debug, error, warn};

use crate::filter::PackageFilter;
use crate::report::ReportKind;
use crate::state::Notice;

/// How failures are treated.
#[derive(Debug, Clone, Default)]
pub struct CrashPolicy {
    pub ignore_crashes: bool,
    pub ignore_timeouts: bool,
    pub kill_process_after_error: bool,
    pub request_bugreport: bool,
    /// When set, only failures whose description mentions this text count.
    pub match_description: Option<String>,
}

/// An application crash as reported by the target.
#[derive(Debug, Clone, Default)]
pub struct CrashReport {
    pub process: String,
    pub pid: u32,
    pub short_msg: String,
    pub long_msg: String,
    pub stack_trace: String,
}

/// Verdict for an unresponsive application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresponsiveAction {
    /// Kill the process now.
    Kill,
    /// Keep waiting for it.
    Wait,
}

impl UnresponsiveAction {
    pub fn code(self) -> i32 {
        match self {
            UnresponsiveAction::Kill => -1,
            UnresponsiveAction::Wait => 1,
        }
    }
}

/// Cheap, cloneable handle given to failure watchers.
#[derive(Debug, Clone)]
pub struct Coordinator {
    notices: Sender<Notice>,
    policy: CrashPolicy,
    filter: Arc<PackageFilter>,
    home_package: Option<String>,
    current_package: Arc<Mutex<Option<String>>>,
}

impl Coordinator {
    pub fn new(
        notices: Sender<Notice>,
        policy: CrashPolicy,
        filter: Arc<PackageFilter>,
        home_package: Option<String>,
    ) -> Self {
        Self {
            notices,
            policy,
            filter,
            home_package,
            current_package: Arc::new(Mutex::new(None)),
        }
    }

    pub fn policy(&self) -> &CrashPolicy {
        &self.policy
    }

    /// Package of the last activity that started or resumed.
    pub fn current_package(&self) -> Option<String> {
        self.current_package
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Gate an activity launch. Home intents to the launcher always pass.
    pub fn activity_starting(&self, package: &str, launches_home: bool) -> bool {
        let allow = self.filter.is_allowed(package)
            || (launches_home && self.home_package.as_deref() == Some(package));
        if !allow {
            debug!(package, "Rejecting start of activity");
        }
        self.set_current(package);
        allow
    }

    pub fn activity_resuming(&self, package: &str) -> bool {
        let allow = self.filter.is_allowed(package);
        if !allow {
            debug!(package, "Rejecting resume of activity");
        }
        self.set_current(package);
        allow
    }

    /// Handle an application crash. Returns whether the target should keep
    /// the process around (false = kill it).
    pub fn process_crashed(&self, crash: &CrashReport) -> bool {
        error!(
            process = %crash.process,
            pid = crash.pid,
            short_msg = %crash.short_msg,
            long_msg = %crash.long_msg,
            "CRASH"
        );
        error!(stack = %crash.stack_trace, "crash stack");

        if !self.matches(&[
            crash.short_msg.as_str(),
            crash.long_msg.as_str(),
            crash.stack_trace.as_str(),
        ]) {
            return false;
        }
        if self.policy.ignore_crashes && !self.policy.request_bugreport {
            return false;
        }

        let mut notice = Notice {
            abort: !self.policy.ignore_crashes,
            ..Default::default()
        };
        if self.policy.request_bugreport {
            notice.reports.push(ReportKind::CrashBugreport {
                process: crash.process.clone(),
            });
        }
        self.post(notice);
        !self.policy.kill_process_after_error
    }

    /// Handle an application that stopped responding.
    pub fn process_unresponsive(
        &self,
        process: &str,
        pid: u32,
        process_stats: &str,
    ) -> UnresponsiveAction {
        error!(process, pid, "NOT RESPONDING");
        error!(stats = %process_stats, "process stats");

        if self.matches(&[process_stats]) {
            let mut reports = vec![
                ReportKind::AnrTraces,
                ReportKind::MemInfo,
                ReportKind::ProcRank,
            ];
            if self.policy.request_bugreport {
                reports.push(ReportKind::AnrBugreport {
                    process: process.to_string(),
                });
            }
            self.post(Notice {
                abort: !self.policy.ignore_timeouts,
                reports,
                hang_ack: None,
            });
        }

        if self.policy.kill_process_after_error {
            UnresponsiveAction::Kill
        } else {
            UnresponsiveAction::Wait
        }
    }

    /// Handle a hang of the whole target. Blocks until the controller has
    /// taken the notice, or until the run is over.
    pub fn system_unresponsive(&self, message: &str) -> UnresponsiveAction {
        error!(reason = message, "WATCHDOG");

        let (ack_tx, ack_rx) = channel::bounded(1);
        let mut notice = Notice {
            hang_ack: Some(ack_tx),
            ..Default::default()
        };
        if self.matches(&[message]) {
            notice.abort = !self.policy.ignore_crashes;
            if self.policy.request_bugreport {
                notice.reports.push(ReportKind::WatchdogBugreport);
            }
        }

        if self.post(notice) {
            // Err means the controller dropped the notice unread.
            let _ = ack_rx.recv();
        }
        if self.policy.kill_process_after_error {
            UnresponsiveAction::Kill
        } else {
            UnresponsiveAction::Wait
        }
    }

    fn matches(&self, texts: &[&str]) -> bool {
        match self.policy.match_description.as_deref() {
            None => true,
            Some(needle) => texts.iter().any(|text| text.contains(needle)),
        }
    }

    fn post(&self, notice: Notice) -> bool {
        if self.notices.send(notice).is_err() {
            warn!("run already finished, notice dropped");
            return false;
        }
        true
    }

    fn set_current(&self, package: &str) {
        *self
            .current_package
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(package.to_string());
    }
}
