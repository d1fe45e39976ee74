//! Native crash artifact poller.
//!
//! Watches a directory for crash dumps. Files are identified by their
//! modification time; anything with an mtime not seen on the previous poll
//! is new. The first poll only records a baseline.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub dir: PathBuf,
    /// Only files whose name starts with this are considered.
    pub prefix: String,
    /// Size checks before a new artifact is given up on.
    pub retries: u32,
    /// Pause between size checks.
    pub interval: Duration,
}

pub struct NativeCrashPoller {
    config: PollerConfig,
    snapshot: HashSet<SystemTime>,
    baseline_taken: bool,
}

impl NativeCrashPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            snapshot: HashSet::new(),
            baseline_taken: false,
        }
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn baseline_taken(&self) -> bool {
        self.baseline_taken
    }

    /// Rescan the directory. True if a new, fully written artifact appeared
    /// since the last poll.
    pub fn poll(&mut self) -> bool {
        let entries = match fs::read_dir(&self.config.dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %self.config.dir.display(), %err, "crash dir unreadable");
                self.snapshot.clear();
                self.baseline_taken = true;
                return false;
            }
        };

        let mut current = HashSet::new();
        let mut found = false;
        for entry in entries.flatten() {
            if !entry
                .file_name()
                .to_string_lossy()
                .starts_with(&self.config.prefix)
            {
                continue;
            }
            let Ok(mtime) = entry.metadata().and_then(|meta| meta.modified()) else {
                continue;
            };
            current.insert(mtime);

            if self.baseline_taken && !self.snapshot.contains(&mtime) {
                let path = entry.path();
                if self.wait_until_complete(&path) {
                    info!(path = %path.display(), "new native crash artifact");
                    found = true;
                } else {
                    warn!(path = %path.display(), "crash artifact never finished writing");
                }
            }
        }

        self.snapshot = current;
        self.baseline_taken = true;
        found
    }

    /// Wait for the file to be non-empty and stop growing.
    fn wait_until_complete(&self, path: &Path) -> bool {
        for _ in 0..self.config.retries {
            let Ok(before) = fs::metadata(path).map(|meta| meta.len()) else {
                return false;
            };
            thread::sleep(self.config.interval);
            let Ok(after) = fs::metadata(path).map(|meta| meta.len()) else {
                return false;
            };
            if before > 0 && before == after {
                return true;
            }
        }
        false
    }
}
