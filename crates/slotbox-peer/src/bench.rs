//! Single-writer throughput harness.
//!
//! Opens one writer, writes the same payload `message_count` times and
//! measures the elapsed time between the first and last write attempt.

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use slotbox_transport::{SlotAddress, SlotError, SlotRegistry, SlotWriter};
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::DEFAULT_PROGRESS_INTERVAL;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_ERROR_REPORT_LIMIT: usize = 5;

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    pub message_count: usize,
    /// Failed writes beyond this many are only counted.
    pub error_report_limit: usize,
    /// 0 disables progress events.
    pub progress_interval: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            message_count: DEFAULT_BATCH_SIZE,
            error_report_limit: DEFAULT_ERROR_REPORT_LIMIT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl BenchConfig {
    pub fn with_message_count(mut self, message_count: usize) -> Self {
        self.message_count = message_count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.message_count == 0 {
            return Err(PeerError::InvalidConfig(
                "message count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Events raised while the batch runs.
#[derive(Debug)]
pub enum BenchEvent<'a> {
    /// A write failed; raised for the first `error_report_limit` failures only.
    WriteFailed { index: usize, error: &'a SlotError },
    /// `sent` write attempts have been made out of `total`.
    Progress { sent: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    pub messages: usize,
    pub succeeded: usize,
    pub errors: usize,
    pub payload_size: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
    /// `None` when the elapsed time is zero.
    pub messages_per_sec: Option<f64>,
    /// `None` when the elapsed time is zero.
    pub bytes_per_sec: Option<f64>,
}

fn as_secs_f64<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl BenchReport {
    pub fn from_counts(
        messages: usize,
        succeeded: usize,
        payload_size: usize,
        elapsed: Duration,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let (messages_per_sec, bytes_per_sec) = if secs > 0.0 {
            (
                Some(succeeded as f64 / secs),
                Some((succeeded as f64 * payload_size as f64) / secs),
            )
        } else {
            (None, None)
        };
        Self {
            messages,
            succeeded,
            errors: messages - succeeded,
            payload_size,
            elapsed,
            messages_per_sec,
            bytes_per_sec,
        }
    }

    pub fn kib_per_sec(&self) -> Option<f64> {
        self.bytes_per_sec.map(|rate| rate / 1024.0)
    }

    /// True when no write failed.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Write `payload` `config.message_count` times through one writer.
///
/// The clock is read exactly twice: before the first write and after the
/// last attempt.
pub fn run_batch<W, C, F>(
    writer: &mut W,
    payload: &[u8],
    config: &BenchConfig,
    clock: &C,
    mut on_event: F,
) -> BenchReport
where
    W: SlotWriter,
    C: Clock,
    F: FnMut(BenchEvent<'_>),
{
    let total = config.message_count;
    let mut succeeded = 0usize;
    let mut errors = 0usize;

    let start = clock.now();
    for index in 0..total {
        match writer.write(payload) {
            Ok(_) => succeeded += 1,
            Err(error) => {
                errors += 1;
                if errors <= config.error_report_limit {
                    warn!(address = %writer.address(), index, error = %error, "write failed");
                    on_event(BenchEvent::WriteFailed {
                        index,
                        error: &error,
                    });
                }
            }
        }
        let sent = index + 1;
        if config.progress_interval > 0 && sent % config.progress_interval == 0 {
            on_event(BenchEvent::Progress { sent, total });
        }
    }
    let end = clock.now();

    let report = BenchReport::from_counts(
        total,
        succeeded,
        payload.len(),
        end.saturating_duration_since(start),
    );
    debug!(succeeded, errors, elapsed = ?report.elapsed, "batch finished");
    report
}

/// Open `address`, run the batch and close the writer once.
///
/// An open failure is returned before any write is attempted.
pub fn run_bench<R, C, F>(
    registry: &R,
    address: &SlotAddress,
    payload: &[u8],
    config: &BenchConfig,
    clock: &C,
    on_event: F,
) -> Result<BenchReport>
where
    R: SlotRegistry,
    C: Clock,
    F: FnMut(BenchEvent<'_>),
{
    config.validate()?;
    let mut writer = registry.open(address)?;
    info!(%address, count = config.message_count, size = payload.len(), "benchmark started");

    let report = run_batch(&mut writer, payload, config, clock, on_event);
    writer.close();

    info!(
        %address,
        succeeded = report.succeeded,
        errors = report.errors,
        "benchmark finished"
    );
    Ok(report)
}
