//! Run orchestration for the gremlin event exerciser.
//!
//! [`Session`] owns a run. The [`CycleController`] drives injection on the
//! calling thread while failure watchers report through a [`Coordinator`].

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod filter;
pub mod logging;
pub mod poller;
pub mod report;
pub mod session;
pub mod state;
pub mod target;

pub use config::{ConfigError, RunConfig};
pub use controller::{ControllerConfig, CycleController, DroppedCounts, RunSummary, StopReason};
pub use coordinator::{Coordinator, CrashPolicy, CrashReport, UnresponsiveAction};
pub use filter::PackageFilter;
pub use poller::{NativeCrashPoller, PollerConfig};
pub use report::{
    bugreport_file_name, DiagnosticError, Diagnostics, LogDiagnostics, ReportKind, ReportSource,
    StreamDiagnostics,
};
pub use session::{random_source, RunOutcome, Session, SessionError};
pub use state::{Drained, Notice, RunState};
pub use target::{InjectResult, Target};
