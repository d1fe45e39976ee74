//! A whole run: setup, the event loop, teardown and exit code.

use std::sync::Arc;

use gremlin_event::{Event, EventSource, PhysicalKeys, RandomSource, Rotation, SourceError};
use tracing::{error, info, warn};

use crate::config::{ConfigError, RunConfig};
use crate::controller::{CycleController, RunSummary};
use crate::coordinator::Coordinator;
use crate::filter::PackageFilter;
use crate::poller::NativeCrashPoller;
use crate::report::Diagnostics;
use crate::state::RunState;
use crate::target::{InjectResult, Target};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl SessionError {
    /// Process exit code for a run that never started.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Config(_) => -1,
            SessionError::Source(_) => -5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub seed: Option<u64>,
    /// 0 for a complete run, otherwise the events injected before stopping.
    pub exit_code: i32,
}

/// Build the weighted random source for a configuration, fixing its seed
/// and queueing the initial app launch.
pub fn random_source(config: &mut RunConfig, keys: PhysicalKeys) -> RandomSource {
    let seed = config.resolve_seed();
    let mut source = RandomSource::new(config.generator_config(), keys, seed);
    source.generate_activity();
    source
}

pub struct Session<S: EventSource, T: Target, D: Diagnostics> {
    config: RunConfig,
    source: S,
    target: T,
    diagnostics: D,
    state: RunState,
    coordinator: Coordinator,
}

impl<S: EventSource, T: Target, D: Diagnostics> Session<S, T, D> {
    /// Validate everything up front. Nothing is injected on error.
    pub fn new(
        config: RunConfig,
        mut source: S,
        target: T,
        diagnostics: D,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let filter = PackageFilter::new(
            config.allowed_packages.clone(),
            config.denied_packages.clone(),
        )?;
        if config.verbose > 0 {
            filter.log_lists();
        }

        source.set_verbose(config.verbose);
        source.validate()?;

        let (notices, state) = RunState::channel();
        let coordinator = Coordinator::new(
            notices,
            config.crash_policy(),
            Arc::new(filter),
            config.home_package.clone(),
        );

        Ok(Self {
            config,
            source,
            target,
            diagnostics,
            state,
            coordinator,
        })
    }

    /// Handle for failure watchers. Clone freely across threads.
    pub fn coordinator(&self) -> Coordinator {
        self.coordinator.clone()
    }

    pub fn run(mut self) -> RunOutcome {
        let count = self.config.count;
        info!(seed = ?self.config.seed, count, "starting run");

        let mut poller = self.config.poller_config().map(NativeCrashPoller::new);
        let summary = CycleController::new(
            self.config.controller_config(),
            &mut self.source,
            &mut self.target,
            &mut self.diagnostics,
            &mut self.state,
            poller.as_mut(),
        )
        .run();

        self.teardown(&summary);

        let exit_code = if summary.events_injected < count.saturating_sub(1) {
            error!(
                events = summary.events_injected,
                count,
                seed = ?self.config.seed,
                "system appears to have crashed"
            );
            i32::try_from(summary.events_injected).unwrap_or(i32::MAX)
        } else {
            0
        };
        info!(exit_code, "run finished");

        RunOutcome {
            summary,
            seed: self.config.seed,
            exit_code,
        }
    }

    fn teardown(&mut self, summary: &RunSummary) {
        let reset = Event::Rotation {
            rotation: Rotation::Deg0,
            persist: false,
        };
        if self.target.inject(&reset) != InjectResult::Success {
            warn!("could not restore screen rotation");
        }

        // Reports raised after the last iteration, and any waiter still parked.
        let drained = self.state.drain();
        for report in &drained.reports {
            if let Err(err) = self.diagnostics.capture(report) {
                warn!(report = %report, %err, "diagnostic capture failed");
            }
        }

        if self.config.verbose > 0 {
            let dropped = &summary.dropped;
            info!(
                keys = dropped.keys,
                pointers = dropped.pointers,
                trackballs = dropped.trackballs,
                flips = dropped.flips,
                rotations = dropped.rotations,
                "Dropped events"
            );
        }
    }
}
