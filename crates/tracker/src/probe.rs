#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Process footprint probes

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;

/// Failure to read a process footprint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The footprint cannot be read; fatal to the tracking session
    #[error("cannot read memory of process {pid}: {reason}")]
    Unavailable { pid: u32, reason: String },

    /// The observed process no longer exists
    #[error("process {pid} has exited")]
    TargetExited { pid: u32 },
}

impl ProbeError {
    fn unavailable(pid: u32, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            pid,
            reason: reason.into(),
        }
    }
}

/// Source of the resident memory footprint of one process
pub trait MemoryProbe: Send + Sync {
    /// Current resident set size in bytes
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the value cannot be read and `TargetExited`
    /// if the process is gone
    fn resident_bytes(&self) -> Result<u64, ProbeError>;

    /// Process being observed
    fn pid(&self) -> u32;
}

/// Probe for the current process, using `/proc` where available
#[must_use]
pub fn default_probe() -> Arc<dyn MemoryProbe> {
    probe_for_pid(std::process::id())
}

/// Probe for an arbitrary process, using `/proc` where available
#[must_use]
pub fn probe_for_pid(pid: u32) -> Arc<dyn MemoryProbe> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcStatusProbe::for_pid(pid))
    } else {
        Arc::new(SysinfoProbe::for_pid(pid))
    }
}

/// Metric field types from /proc status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricType {
    VmRss,
    VmSize,
    VmPeak,
    RssAnon,
}

/// A recognized /proc status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusField {
    Metric(MetricType, u64),
    /// Process state letter from the `State:` line
    State(char),
}

/// Memory metrics from `/proc/[pid]/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMetrics {
    /// Resident Set Size (RSS) in kilobytes
    rss: u64,

    /// Virtual Memory Size (`VmSize`) in kilobytes
    vm_size: u64,

    /// Peak virtual memory in kilobytes
    vm_peak: u64,

    /// Anonymous resident memory in kilobytes
    rss_anon: u64,
}

impl MemoryMetrics {
    /// Create new memory metrics
    #[must_use]
    pub const fn new(rss: u64, vm_size: u64, vm_peak: u64, rss_anon: u64) -> Self {
        Self {
            rss,
            vm_size,
            vm_peak,
            rss_anon,
        }
    }

    /// Get RSS in kilobytes
    #[must_use]
    pub const fn rss_kb(&self) -> u64 {
        self.rss
    }

    /// Get RSS in bytes
    #[must_use]
    pub const fn rss_bytes(&self) -> u64 {
        self.rss.saturating_mul(1024)
    }

    /// Get virtual memory size in kilobytes
    #[must_use]
    pub const fn vm_size_kb(&self) -> u64 {
        self.vm_size
    }

    /// Get peak virtual memory in kilobytes
    #[must_use]
    pub const fn vm_peak_kb(&self) -> u64 {
        self.vm_peak
    }

    /// Get anonymous resident memory in kilobytes
    #[must_use]
    pub const fn rss_anon_kb(&self) -> u64 {
        self.rss_anon
    }
}

/// Reads `VmRSS` from `/proc/[pid]/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStatusProbe {
    pid: u32,
    status_path: PathBuf,
}

impl ProcStatusProbe {
    /// Probe the current process
    #[must_use]
    pub fn current() -> Self {
        Self::for_pid(std::process::id())
    }

    /// Probe another process by PID
    #[must_use]
    pub fn for_pid(pid: u32) -> Self {
        Self {
            pid,
            status_path: PathBuf::from(format!("/proc/{pid}/status")),
        }
    }

    /// Read the full metrics block
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `/proc/[pid]/status` does not exist or the process is a zombie (`TargetExited`)
    /// - Required fields are missing or cannot be parsed (`Unavailable`)
    pub fn read_metrics(&self) -> Result<MemoryMetrics, ProbeError> {
        read_status_file(&self.status_path, self.pid)
    }
}

impl MemoryProbe for ProcStatusProbe {
    fn resident_bytes(&self) -> Result<u64, ProbeError> {
        self.read_metrics().map(|m| m.rss_bytes())
    }

    fn pid(&self) -> u32 {
        self.pid
    }
}

/// Read metrics from a status file (testable)
fn read_status_file(path: &Path, pid: u32) -> Result<MemoryMetrics, ProbeError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ProbeError::TargetExited { pid },
        _ => ProbeError::unavailable(pid, format!("failed to open {}: {e}", path.display())),
    })?;

    let reader = BufReader::new(file);

    /// Intermediate accumulator for parsed metrics
    #[derive(Debug, Default)]
    struct MetricsAccumulator {
        rss_kb: Option<u64>,
        vm_size_kb: Option<u64>,
        vm_peak_kb: Option<u64>,
        rss_anon_kb: Option<u64>,
        state: Option<char>,
    }

    // read lines -> parse -> fold into accumulator
    let accumulator = reader
        .lines()
        .map(|line_result| {
            line_result
                .map_err(|e| ProbeError::unavailable(pid, format!("failed to read line: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|line| parse_status_line(&line, pid).transpose())
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .fold(MetricsAccumulator::default(), |mut acc, field| {
            match field {
                StatusField::Metric(MetricType::VmRss, value) => acc.rss_kb = Some(value),
                StatusField::Metric(MetricType::VmSize, value) => acc.vm_size_kb = Some(value),
                StatusField::Metric(MetricType::VmPeak, value) => acc.vm_peak_kb = Some(value),
                StatusField::Metric(MetricType::RssAnon, value) => acc.rss_anon_kb = Some(value),
                StatusField::State(state) => acc.state = Some(state),
            }
            acc
        });

    // Zombies keep their status file but drop every memory field
    if matches!(accumulator.state, Some('Z' | 'X')) {
        return Err(ProbeError::TargetExited { pid });
    }

    let rss_kb = accumulator
        .rss_kb
        .ok_or_else(|| ProbeError::unavailable(pid, "VmRSS not found"))?;

    // Only VmRSS feeds the footprint; the rest are informational
    Ok(MemoryMetrics::new(
        rss_kb,
        accumulator.vm_size_kb.unwrap_or(0),
        accumulator.vm_peak_kb.unwrap_or(0),
        accumulator.rss_anon_kb.unwrap_or(0),
    ))
}

/// Parse a single /proc status line
/// Format: "`FieldName`:    12345 kB" or "State:\tS (sleeping)"
///
/// Returns None if the line is not a recognized field
/// Returns error if parsing fails
fn parse_status_line(line: &str, pid: u32) -> Result<Option<StatusField>, ProbeError> {
    if let Some(rest) = line.strip_prefix("State:") {
        return Ok(rest.trim_start().chars().next().map(StatusField::State));
    }

    let Some(metric_type) = (if line.starts_with("VmRSS:") {
        Some(MetricType::VmRss)
    } else if line.starts_with("VmSize:") {
        Some(MetricType::VmSize)
    } else if line.starts_with("VmPeak:") {
        Some(MetricType::VmPeak)
    } else if line.starts_with("RssAnon:") {
        Some(MetricType::RssAnon)
    } else {
        None
    }) else {
        return Ok(None);
    };

    let value = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ProbeError::unavailable(pid, format!("missing value in line: {line}")))?
        .parse::<u64>()
        .map_err(|e| {
            ProbeError::unavailable(pid, format!("failed to parse value in '{line}': {e}"))
        })?;

    Ok(Some(StatusField::Metric(metric_type, value)))
}

/// Portable probe backed by `sysinfo`
pub struct SysinfoProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl SysinfoProbe {
    /// Probe the current process
    #[must_use]
    pub fn current() -> Self {
        Self::for_pid(std::process::id())
    }

    /// Probe another process by PID
    #[must_use]
    pub fn for_pid(pid: u32) -> Self {
        Self {
            pid: Pid::from_u32(pid),
            system: Mutex::new(System::new()),
        }
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> Result<u64, ProbeError> {
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        system
            .process(self.pid)
            .map(sysinfo::Process::memory)
            .ok_or(ProbeError::TargetExited {
                pid: self.pid.as_u32(),
            })
    }

    fn pid(&self) -> u32 {
        self.pid.as_u32()
    }
}

impl std::fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProbe").field("pid", &self.pid).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn status_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_proc_status() {
        let file = status_file(
            "Name:\ttest\nState:\tS (sleeping)\nVmPeak:\t   3072 kB\nVmSize:\t   2048 kB\nVmRSS:\t   1024 kB\nRssAnon:\t   512 kB\n",
        );

        let metrics = read_status_file(file.path(), 1234).unwrap();

        assert_eq!(metrics.rss_kb(), 1024);
        assert_eq!(metrics.rss_bytes(), 1024 * 1024);
        assert_eq!(metrics.vm_size_kb(), 2048);
        assert_eq!(metrics.vm_peak_kb(), 3072);
        assert_eq!(metrics.rss_anon_kb(), 512);
    }

    #[test]
    fn test_missing_rss_is_unavailable() {
        let file = status_file("Name:\ttest\nState:\tR (running)\nVmSize:\t   2048 kB\n");

        let result = read_status_file(file.path(), 1234);

        assert!(matches!(result, Err(ProbeError::Unavailable { pid: 1234, .. })));
    }

    #[test]
    fn test_zombie_is_target_exited() {
        let file = status_file("Name:\ttest\nState:\tZ (zombie)\n");

        let result = read_status_file(file.path(), 77);

        assert_eq!(result, Err(ProbeError::TargetExited { pid: 77 }));
    }

    #[test]
    fn test_missing_file_is_target_exited() {
        let dir = tempfile::tempdir().unwrap();

        let result = read_status_file(&dir.path().join("status"), 5);

        assert_eq!(result, Err(ProbeError::TargetExited { pid: 5 }));
    }

    #[test]
    fn test_garbled_value_is_unavailable() {
        let file = status_file("VmRSS:\t   lots kB\n");

        let result = read_status_file(file.path(), 9);

        assert!(matches!(result, Err(ProbeError::Unavailable { .. })));
    }

    #[test]
    fn test_default_probe_reads_own_process() {
        let probe = default_probe();

        assert_eq!(probe.pid(), std::process::id());
        assert!(probe.resident_bytes().unwrap() > 0);
    }

    #[test]
    fn test_sysinfo_probe_reads_own_process() {
        let probe = SysinfoProbe::current();

        assert!(probe.resident_bytes().unwrap() > 0);
    }
}
