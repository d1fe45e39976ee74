//! Package allow/deny filtering for activity gating.

use std::collections::BTreeSet;

use tracing::info;

use crate::config::ConfigError;

/// Which packages the run may drive into.
///
/// At most one of the lists is non-empty. With neither, everything is allowed.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl PackageFilter {
    pub fn new(allowed: BTreeSet<String>, denied: BTreeSet<String>) -> Result<Self, ConfigError> {
        if !allowed.is_empty() && !denied.is_empty() {
            return Err(ConfigError::ConflictingPackageLists);
        }
        Ok(Self { allowed, denied })
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_allowed(&self, package: &str) -> bool {
        if !self.denied.is_empty() {
            !self.denied.contains(package)
        } else if !self.allowed.is_empty() {
            self.allowed.contains(package)
        } else {
            true
        }
    }

    pub fn log_lists(&self) {
        for package in &self.allowed {
            info!(package = %package, "AllowPackage");
        }
        for package in &self.denied {
            info!(package = %package, "DisallowPackage");
        }
    }
}
