//! Diagnostic reports: what can be requested and how it gets captured.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use chrono::Local;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    #[error("cannot open {report}: {source}")]
    Open { report: String, source: io::Error },

    #[error("failed reading {report} output: {source}")]
    Read { report: String, source: io::Error },

    #[error("failed writing {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// A diagnostic the controller captures between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    ProcRank,
    AnrTraces,
    MemInfo,
    AnrBugreport { process: String },
    WatchdogBugreport,
    CrashBugreport { process: String },
    PeriodicBugreport,
    NativeCrashBugreport,
}

impl ReportKind {
    pub fn is_bugreport(&self) -> bool {
        self.bugreport_prefix().is_some()
    }

    /// File-name prefix for bugreports. `None` for plain dumps.
    pub fn bugreport_prefix(&self) -> Option<String> {
        match self {
            ReportKind::AnrBugreport { process } => Some(format!("anr_{process}_")),
            ReportKind::WatchdogBugreport => Some("anr_watchdog_".to_string()),
            ReportKind::CrashBugreport { process } => Some(format!("app_crash{process}_")),
            ReportKind::PeriodicBugreport => Some("Bugreport_".to_string()),
            ReportKind::NativeCrashBugreport => Some("native_crash_".to_string()),
            ReportKind::ProcRank | ReportKind::AnrTraces | ReportKind::MemInfo => None,
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::ProcRank => write!(f, "procrank"),
            ReportKind::AnrTraces => write!(f, "anr traces"),
            ReportKind::MemInfo => write!(f, "meminfo"),
            ReportKind::AnrBugreport { process } => write!(f, "anr bugreport ({process})"),
            ReportKind::WatchdogBugreport => write!(f, "watchdog bugreport"),
            ReportKind::CrashBugreport { process } => write!(f, "crash bugreport ({process})"),
            ReportKind::PeriodicBugreport => write!(f, "periodic bugreport"),
            ReportKind::NativeCrashBugreport => write!(f, "native crash bugreport"),
        }
    }
}

/// `prefix` + timestamp with spaces, commas and colons made file-safe, + `.txt`.
pub fn bugreport_file_name(prefix: &str, timestamp: &str) -> String {
    let raw = format!("{prefix}{timestamp}");
    let safe: String = raw
        .chars()
        .map(|c| if matches!(c, ' ' | ',' | ':') { '_' } else { c })
        .collect();
    format!("{safe}.txt")
}

/// Captures one report. Implementations may block for a long time.
pub trait Diagnostics {
    fn capture(&mut self, report: &ReportKind) -> Result<(), DiagnosticError>;
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn capture(&mut self, report: &ReportKind) -> Result<(), DiagnosticError> {
        (**self).capture(report)
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for Box<D> {
    fn capture(&mut self, report: &ReportKind) -> Result<(), DiagnosticError> {
        (**self).capture(report)
    }
}

/// Diagnostics that only log what was asked for.
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn capture(&mut self, report: &ReportKind) -> Result<(), DiagnosticError> {
        info!(report = %report, "diagnostic requested");
        Ok(())
    }
}

/// Produces the raw text output for a report, e.g. by running a tool.
pub trait ReportSource {
    fn open(&mut self, report: &ReportKind) -> io::Result<Box<dyn BufRead>>;
}

/// Streams report output line by line.
///
/// Bugreports go to a timestamped file under `output_dir`; everything else
/// is written to the log.
pub struct StreamDiagnostics<S> {
    source: S,
    output_dir: PathBuf,
}

impl<S: ReportSource> StreamDiagnostics<S> {
    pub fn new(source: S, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_dir: output_dir.into(),
        }
    }

    /// Local calendar time, e.g. `2024-03-01 14:05:09.123`.
    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }

    fn write_to_file(
        &self,
        report: &ReportKind,
        prefix: &str,
        reader: Box<dyn BufRead>,
    ) -> Result<(), DiagnosticError> {
        let path = self
            .output_dir
            .join(bugreport_file_name(prefix, &Self::timestamp()));
        let write_err = |source| DiagnosticError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.output_dir).map_err(write_err)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_err)?;

        let mut lines = reader.lines();
        while let Some(line) = lines.next() {
            let line = line.map_err(|source| DiagnosticError::Read {
                report: report.to_string(),
                source,
            })?;
            if let Err(source) = writeln!(file, "{line}") {
                // Keep the producer from stalling on a full pipe.
                lines.by_ref().for_each(drop);
                return Err(write_err(source));
            }
        }
        info!(report = %report, path = %path.display(), "report written");
        Ok(())
    }
}

impl<S: ReportSource> Diagnostics for StreamDiagnostics<S> {
    fn capture(&mut self, report: &ReportKind) -> Result<(), DiagnosticError> {
        info!(report = %report, "capturing");
        let reader = self
            .source
            .open(report)
            .map_err(|source| DiagnosticError::Open {
                report: report.to_string(),
                source,
            })?;

        match report.bugreport_prefix() {
            Some(prefix) => self.write_to_file(report, &prefix, reader),
            None => {
                for line in reader.lines() {
                    match line {
                        Ok(line) => info!("{line}"),
                        Err(err) => {
                            warn!(report = %report, %err, "report output cut short");
                            break;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct CannedSource(&'static str);

    impl ReportSource for CannedSource {
        fn open(&mut self, _report: &ReportKind) -> io::Result<Box<dyn BufRead>> {
            Ok(Box::new(Cursor::new(self.0.as_bytes())))
        }
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(
            bugreport_file_name("anr_com.app:remote_", "Mon Jan 1, 10:00"),
            "anr_com.app_remote_Mon_Jan_1__10_00.txt"
        );
    }

    #[test]
    fn test_prefixes() {
        let crash = ReportKind::CrashBugreport {
            process: "com.app".into(),
        };
        assert_eq!(crash.bugreport_prefix().unwrap(), "app_crashcom.app_");
        assert_eq!(
            ReportKind::WatchdogBugreport.bugreport_prefix().unwrap(),
            "anr_watchdog_"
        );
        assert!(!ReportKind::MemInfo.is_bugreport());
    }

    #[test]
    fn test_bugreport_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = StreamDiagnostics::new(CannedSource("line one\nline two\n"), dir.path());
        diag.capture(&ReportKind::PeriodicBugreport).unwrap();

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().to_string_lossy().to_string();
        assert!(name.starts_with("Bugreport_"));
        assert!(name.ends_with(".txt"));
        let stamp = &name["Bugreport_".len()..name.len() - ".txt".len()];
        assert_eq!(stamp.len(), "2024-03-01_14_05_09.123".len());
        assert!(!stamp.contains([' ', ',', ':']));
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], "_");
        let body = fs::read_to_string(files[0].path()).unwrap();
        assert_eq!(body, "line one\nline two\n");
    }

    #[test]
    fn test_plain_dump_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = StreamDiagnostics::new(CannedSource("x\n"), dir.path());
        diag.capture(&ReportKind::ProcRank).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
