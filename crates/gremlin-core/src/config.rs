//! Run configuration: event mix, crash policy, pacing and diagnostics.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gremlin_event::{
    fresh_seed, Category, ComponentName, GeneratorConfig, PermissionTarget, Surface, Throttle,
    WeightTable,
};
use serde::{Deserialize, Serialize};

use crate::controller::ControllerConfig;
use crate::coordinator::CrashPolicy;
use crate::poller::PollerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("event count must be greater than zero")]
    ZeroCount,

    #[error("can't set both an allowed and a denied package list")]
    ConflictingPackageLists,
}

/// Everything a run needs, loadable from JSON. Missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of cycles to run.
    pub count: u64,
    /// RNG seed. None = derive one from the clock at startup.
    pub seed: Option<u64>,
    pub throttle_ms: u64,
    pub randomize_throttle: bool,
    pub verbose: u8,

    pub ignore_crashes: bool,
    pub ignore_timeouts: bool,
    pub ignore_security_exceptions: bool,
    pub monitor_native_crashes: bool,
    pub ignore_native_crashes: bool,
    pub kill_process_after_error: bool,
    /// Only react to failures whose description contains this text.
    pub match_description: Option<String>,
    pub request_bugreport: bool,
    /// Request a bugreport every N cycles (cycle-counting sources only).
    pub bugreport_frequency: Option<u64>,
    /// Debug mode: advance counters without injecting anything.
    pub send_no_events: bool,

    /// User-pinned category percentages.
    pub percentages: BTreeMap<Category, f64>,
    pub allowed_packages: BTreeSet<String>,
    pub denied_packages: BTreeSet<String>,
    /// Launcher package; home intents towards it are always allowed.
    pub home_package: Option<String>,
    pub apps: Vec<ComponentName>,
    pub permissions: Vec<PermissionTarget>,
    pub surface: Surface,
    pub max_key_attempts: u32,

    pub crash_dir: PathBuf,
    pub crash_prefix: String,
    pub crash_wait_retries: u32,
    pub crash_wait_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            seed: None,
            throttle_ms: 0,
            randomize_throttle: false,
            verbose: 0,
            ignore_crashes: false,
            ignore_timeouts: false,
            ignore_security_exceptions: false,
            monitor_native_crashes: false,
            ignore_native_crashes: false,
            kill_process_after_error: false,
            match_description: None,
            request_bugreport: false,
            bugreport_frequency: None,
            send_no_events: false,
            percentages: BTreeMap::new(),
            allowed_packages: BTreeSet::new(),
            denied_packages: BTreeSet::new(),
            home_package: None,
            apps: Vec::new(),
            permissions: Vec::new(),
            surface: Surface::default(),
            max_key_attempts: 10_000,
            crash_dir: PathBuf::from("/data/tombstones"),
            crash_prefix: "tombstone_".to_string(),
            crash_wait_retries: 5,
            crash_wait_interval_ms: 1000,
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reject configurations that must never start a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if !self.allowed_packages.is_empty() && !self.denied_packages.is_empty() {
            return Err(ConfigError::ConflictingPackageLists);
        }
        Ok(())
    }

    /// Fix the seed for this run, picking a fresh one if none was given.
    pub fn resolve_seed(&mut self) -> u64 {
        *self.seed.get_or_insert_with(fresh_seed)
    }

    pub fn weights(&self) -> WeightTable {
        let mut weights = WeightTable::new();
        for (category, percent) in &self.percentages {
            weights.set_percentage(*category, *percent);
        }
        weights
    }

    pub fn throttle(&self) -> Throttle {
        Throttle {
            delay: Duration::from_millis(self.throttle_ms),
            randomize: self.randomize_throttle,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            weights: self.weights(),
            surface: self.surface,
            apps: self.apps.clone(),
            permissions: self.permissions.clone(),
            throttle: self.throttle(),
            max_key_attempts: self.max_key_attempts,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            count: self.count,
            ignore_security_exceptions: self.ignore_security_exceptions,
            ignore_native_crashes: self.ignore_native_crashes,
            kill_process_after_error: self.kill_process_after_error,
            request_bugreport: self.request_bugreport,
            bugreport_frequency: self.bugreport_frequency,
            send_no_events: self.send_no_events,
            verbose: self.verbose,
        }
    }

    pub fn crash_policy(&self) -> CrashPolicy {
        CrashPolicy {
            ignore_crashes: self.ignore_crashes,
            ignore_timeouts: self.ignore_timeouts,
            kill_process_after_error: self.kill_process_after_error,
            request_bugreport: self.request_bugreport,
            match_description: self.match_description.clone(),
        }
    }

    pub fn poller_config(&self) -> Option<PollerConfig> {
        self.monitor_native_crashes.then(|| PollerConfig {
            dir: self.crash_dir.clone(),
            prefix: self.crash_prefix.clone(),
            retries: self.crash_wait_retries,
            interval: Duration::from_millis(self.crash_wait_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = RunConfig::from_json("{}").unwrap();
        assert_eq!(config.count, 1000);
        assert_eq!(config.crash_prefix, "tombstone_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_percentages_parse_by_category_name() {
        let config =
            RunConfig::from_json(r#"{ "percentages": { "touch": 60, "any_key": 10 } }"#).unwrap();
        let weights = config.weights();
        assert!(weights.is_user_specified(Category::Touch));
        assert_eq!(weights.raw(Category::Touch), -60.0);
        assert_eq!(weights.raw(Category::AnyKey), -10.0);
        assert_eq!(weights.raw(Category::Nav), 25.0);
    }

    #[test]
    fn test_conflicting_package_lists_rejected() {
        let config = RunConfig::from_json(
            r#"{ "allowed_packages": ["a"], "denied_packages": ["b"] }"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingPackageLists)
        ));
    }

    #[test]
    fn test_zero_count_rejected() {
        let config = RunConfig {
            count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCount)));
    }

    #[test]
    fn test_resolve_seed_is_stable() {
        let mut config = RunConfig::default();
        let seed = config.resolve_seed();
        assert_eq!(config.resolve_seed(), seed);

        let mut fixed = RunConfig {
            seed: Some(7),
            ..Default::default()
        };
        assert_eq!(fixed.resolve_seed(), 7);
    }

    #[test]
    fn test_poller_only_when_monitoring() {
        assert!(RunConfig::default().poller_config().is_none());
        let config = RunConfig {
            monitor_native_crashes: true,
            ..Default::default()
        };
        let poller = config.poller_config().unwrap();
        assert_eq!(poller.retries, 5);
        assert_eq!(poller.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(matches!(
            RunConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "count": 42, "seed": 9 }"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.count, 42);
        assert_eq!(config.seed, Some(9));

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            RunConfig::load(&missing),
            Err(ConfigError::Io { path, .. }) if path == missing
        ));
    }
}
