//! Periodic CPU and RAM sampling into a sliding window.
//!
//! The window lives in the tree at `process.usage.{cpu,ram}`, keyed by a
//! monotonically increasing sequence number. Each tick appends one sample
//! to both series, evicting the oldest once `history_len` is reached, and
//! notifies clients with `update_resource_usage`. A failed probe leaves the
//! window untouched; the warning is logged once per transition into
//! failure and recovery is logged once.

use std::time::Duration;

use mirador_types::ServerEvent;
use tracing::{info, warn};

use crate::dashboard::Dashboard;
use crate::sync::SyncError;

/// One resource reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSample {
    /// Process CPU usage since the previous reading, in percent of one core.
    pub cpu_percent: f64,
    /// Resident memory as a percentage of total memory.
    pub ram_percent: f64,
}

/// Errors from a resource probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The platform offers no supported source.
    #[error("resource usage is not available on this platform")]
    Unsupported,

    /// Reading a source failed.
    #[error("failed to read {source_name}: {error}")]
    Io {
        /// The file or facility that was read.
        source_name: &'static str,
        /// The underlying error.
        error: std::io::Error,
    },

    /// A source had an unexpected format.
    #[error("malformed {0}")]
    Malformed(&'static str),
}

/// A source of resource readings.
pub trait ResourceProbe: Send {
    /// Take one reading.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when no reading could be taken.
    fn sample(&mut self) -> Result<UsageSample, ProbeError>;
}

/// Reads this process's usage from `/proc`.
///
/// CPU is the share of wall time spent in user and system mode since the
/// previous reading; the first reading reports the average since start.
/// RAM is the resident set from `/proc/self/smaps_rollup` against
/// `MemTotal`, both already in KiB.
#[derive(Debug)]
pub struct ProcfsProbe {
    clock_ticks: f64,
    last: Option<(u64, std::time::Instant)>,
    started: std::time::Instant,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsProbe {
    /// `USER_HZ` on every mainstream Linux target, used if `sysconf` fails.
    const FALLBACK_CLOCK_TICKS: f64 = 100.0;

    /// Create a probe, reading the clock tick rate from the host.
    pub fn new() -> Self {
        Self {
            clock_ticks: Self::host_clock_ticks(),
            last: None,
            started: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "linux")]
    #[allow(clippy::cast_precision_loss)]
    fn host_clock_ticks() -> f64 {
        use nix::unistd::{sysconf, SysconfVar};

        match sysconf(SysconfVar::CLK_TCK) {
            Ok(Some(ticks)) if ticks > 0 => ticks as f64,
            other => {
                warn!(result = ?other, "clock tick rate unavailable, assuming 100");
                Self::FALLBACK_CLOCK_TICKS
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    const fn host_clock_ticks() -> f64 {
        Self::FALLBACK_CLOCK_TICKS
    }

    fn read(path: &'static str) -> Result<String, ProbeError> {
        std::fs::read_to_string(path).map_err(|error| ProbeError::Io {
            source_name: path,
            error,
        })
    }
}

impl ResourceProbe for ProcfsProbe {
    fn sample(&mut self) -> Result<UsageSample, ProbeError> {
        if !cfg!(target_os = "linux") {
            return Err(ProbeError::Unsupported);
        }
        let now = std::time::Instant::now();
        let ticks = parse_cpu_ticks(&Self::read("/proc/self/stat")?)?;
        let rss_kib = parse_smaps_rss_kib(&Self::read("/proc/self/smaps_rollup")?)?;
        let total_kib = parse_mem_total_kib(&Self::read("/proc/meminfo")?)?;

        let (prev_ticks, since) = self.last.unwrap_or((0, self.started));
        self.last = Some((ticks, now));

        let elapsed = now.duration_since(since).as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let cpu_secs = ticks.saturating_sub(prev_ticks) as f64 / self.clock_ticks;
        let cpu_percent = if elapsed > 0.0 {
            cpu_secs * 100.0 / elapsed
        } else {
            0.0
        };

        #[allow(clippy::cast_precision_loss)]
        let ram_percent = rss_kib as f64 * 100.0 / total_kib as f64;

        Ok(UsageSample {
            cpu_percent,
            ram_percent,
        })
    }
}

/// Sum of `utime` and `stime` (fields 14 and 15) from `/proc/<pid>/stat`.
///
/// The command name (field 2) may contain spaces, so fields are counted
/// from the closing parenthesis.
pub fn parse_cpu_ticks(stat: &str) -> Result<u64, ProbeError> {
    let after_comm = stat
        .rfind(')')
        .and_then(|i| stat.get(i.saturating_add(1)..))
        .ok_or(ProbeError::Malformed("/proc/self/stat"))?;
    // After the comm field, `state` is field 3, so utime (14) is index 11.
    let mut fields = after_comm.split_whitespace().skip(11);
    let mut next = || -> Result<u64, ProbeError> {
        fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or(ProbeError::Malformed("/proc/self/stat"))
    };
    let utime = next()?;
    let stime = next()?;
    Ok(utime.saturating_add(stime))
}

/// Resident set size in KiB from the `Rss:` line of
/// `/proc/<pid>/smaps_rollup`.
pub fn parse_smaps_rss_kib(smaps_rollup: &str) -> Result<u64, ProbeError> {
    smaps_rollup
        .lines()
        .find_map(|line| line.strip_prefix("Rss:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|f| f.parse().ok())
        .ok_or(ProbeError::Malformed("/proc/self/smaps_rollup"))
}

/// `MemTotal` in KiB from `/proc/meminfo`.
pub fn parse_mem_total_kib(meminfo: &str) -> Result<u64, ProbeError> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|f| f.parse().ok())
        .filter(|&kib: &u64| kib > 0)
        .ok_or(ProbeError::Malformed("/proc/meminfo"))
}

/// What one sampling attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// A sample was appended.
    Recorded,
    /// A sample was appended after one or more failures.
    Recovered,
    /// The probe failed after succeeding (or on the first attempt).
    FailedFirst,
    /// The probe failed again.
    StillFailing,
}

/// Drives a [`ResourceProbe`] into the dashboard's usage window.
pub struct ResourceSampler<P> {
    probe: P,
    history_len: usize,
    failing: bool,
}

impl<P: ResourceProbe> ResourceSampler<P> {
    /// Create a sampler keeping at most `history_len` samples per series.
    pub fn new(probe: P, history_len: usize) -> Self {
        Self {
            probe,
            history_len: history_len.max(1),
            failing: false,
        }
    }

    /// Take one reading, record it, and notify clients.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] only if the tree rejects the write; probe
    /// failures are reported through the outcome.
    pub async fn tick(&mut self, dashboard: &Dashboard) -> Result<SampleOutcome, SyncError> {
        let time = chrono::Utc::now().timestamp_millis();
        let outcome = match self.probe.sample() {
            Ok(sample) => {
                dashboard.record_usage(self.history_len, sample, time).await?;
                if self.failing {
                    self.failing = false;
                    info!("resource usage sampling recovered, charts enabled again");
                    SampleOutcome::Recovered
                } else {
                    SampleOutcome::Recorded
                }
            }
            Err(error) => {
                if self.failing {
                    SampleOutcome::StillFailing
                } else {
                    self.failing = true;
                    warn!(%error, "resource usage sampling failed, charts disabled");
                    SampleOutcome::FailedFirst
                }
            }
        };
        dashboard.sync().notify(ServerEvent::UpdateResourceUsage).await;
        Ok(outcome)
    }

    /// Sample immediately and then every `interval`, forever.
    pub async fn run(mut self, dashboard: std::sync::Arc<Dashboard>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(error) = self.tick(&dashboard).await {
                warn!(%error, "failed to record resource usage");
            }
        }
    }
}
