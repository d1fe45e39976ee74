//! Cross-thread run state.
//!
//! Failure notifications arrive on other threads. They never touch the
//! controller's state directly: each one posts a [`Notice`] on a channel and
//! the controller folds all pending notices into its [`RunState`] once per
//! cycle. Heavy work (report capture) happens after the fold, with nothing
//! shared held.

use std::mem;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::debug;

use crate::report::ReportKind;

/// One state transition posted by a failure notification.
#[derive(Debug, Default)]
pub struct Notice {
    pub abort: bool,
    pub reports: Vec<ReportKind>,
    /// Set by a system hang: released at the next drain.
    pub hang_ack: Option<Sender<()>>,
}

/// What one drain produced.
#[derive(Debug, Default)]
pub struct Drained {
    /// Abort has been requested at some point during the run.
    pub abort: bool,
    /// Reports to capture now, in request order.
    pub reports: Vec<ReportKind>,
    /// Hang notifiers woken by this drain.
    pub released: usize,
}

/// State owned by the controller thread.
#[derive(Debug)]
pub struct RunState {
    notices: Receiver<Notice>,
    abort: bool,
    pending: Vec<ReportKind>,
}

impl RunState {
    /// A fresh state and the sender notifiers post to.
    pub fn channel() -> (Sender<Notice>, RunState) {
        let (tx, rx) = channel::unbounded();
        let state = RunState {
            notices: rx,
            abort: false,
            pending: Vec::new(),
        };
        (tx, state)
    }

    /// Queue a report. A repeat of a kind already pending replaces it.
    pub fn request(&mut self, report: ReportKind) {
        let kind = mem::discriminant(&report);
        match self
            .pending
            .iter_mut()
            .find(|pending| mem::discriminant(&**pending) == kind)
        {
            Some(slot) => *slot = report,
            None => self.pending.push(report),
        }
    }

    pub fn request_abort(&mut self) {
        self.abort = true;
    }

    pub fn abort_requested(&self) -> bool {
        self.abort
    }

    /// Fold every pending notice in, wake hang waiters and hand back the
    /// reports to capture.
    pub fn drain(&mut self) -> Drained {
        let mut acks = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            self.abort |= notice.abort;
            for report in notice.reports {
                self.request(report);
            }
            if let Some(ack) = notice.hang_ack {
                acks.push(ack);
            }
        }

        let released = acks.len();
        for ack in acks {
            // The waiter may have given up already.
            let _ = ack.send(());
        }
        if released > 0 {
            debug!(released, "released hang waiters");
        }

        Drained {
            abort: self.abort,
            reports: mem::take(&mut self.pending),
            released,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_folds_notices() {
        let (tx, mut state) = RunState::channel();
        tx.send(Notice {
            reports: vec![ReportKind::MemInfo],
            ..Default::default()
        })
        .unwrap();
        tx.send(Notice {
            abort: true,
            reports: vec![ReportKind::ProcRank],
            ..Default::default()
        })
        .unwrap();

        let drained = state.drain();
        assert!(drained.abort);
        assert_eq!(
            drained.reports,
            vec![ReportKind::MemInfo, ReportKind::ProcRank]
        );

        let again = state.drain();
        assert!(again.abort);
        assert!(again.reports.is_empty());
    }

    #[test]
    fn test_repeated_kind_keeps_latest() {
        let (_tx, mut state) = RunState::channel();
        state.request(ReportKind::CrashBugreport {
            process: "a".into(),
        });
        state.request(ReportKind::CrashBugreport {
            process: "b".into(),
        });
        assert_eq!(
            state.drain().reports,
            vec![ReportKind::CrashBugreport {
                process: "b".into()
            }]
        );
    }

    #[test]
    fn test_drain_acks_hang() {
        let (tx, mut state) = RunState::channel();
        let (ack_tx, ack_rx) = channel::bounded(1);
        tx.send(Notice {
            hang_ack: Some(ack_tx),
            ..Default::default()
        })
        .unwrap();

        assert!(ack_rx.try_recv().is_err());
        assert_eq!(state.drain().released, 1);
        assert!(ack_rx.try_recv().is_ok());
    }
}
