use serde::Serialize;
use slotbox_transport::{SlotAddress, SlotError, SlotErrorKind, SlotRegistry, SlotWriter};
use tracing::{debug, warn};

/// Payload sent when the caller supplies none (25 bytes).
pub const DEFAULT_PAYLOAD: &[u8] = b"Hello from slotbox client";

/// Which transport call failed for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStage {
    Open,
    Write,
}

/// Why a single target was not reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendFailure {
    pub stage: SendStage,
    pub kind: SlotErrorKind,
    pub reason: String,
}

impl SendFailure {
    fn new(stage: SendStage, err: &SlotError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of delivering to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendStatus {
    Sent { bytes: usize },
    Failed(SendFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    /// 1-based position in the target list.
    pub ordinal: usize,
    pub address: SlotAddress,
    #[serde(flatten)]
    pub status: SendStatus,
}

impl TargetOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, SendStatus::Sent { .. })
    }
}

/// Aggregate result of a broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub outcomes: Vec<TargetOutcome>,
}

impl BroadcastReport {
    /// True only if every target accepted the payload.
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempted
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// Open, write and close one target. No retry.
pub fn send_to<R: SlotRegistry>(
    registry: &R,
    address: &SlotAddress,
    payload: &[u8],
) -> Result<usize, SendFailure> {
    let mut writer = registry
        .open(address)
        .map_err(|err| SendFailure::new(SendStage::Open, &err))?;
    let written = writer.write(payload);
    writer.close();
    written.map_err(|err| SendFailure::new(SendStage::Write, &err))
}

/// Send `payload` to every target in order.
pub fn broadcast<R: SlotRegistry>(
    registry: &R,
    targets: &[SlotAddress],
    payload: &[u8],
) -> BroadcastReport {
    broadcast_with(registry, targets, payload, |_| {})
}

/// Like [`broadcast`], reporting each outcome as soon as it is known.
///
/// A failure on one target never stops the remaining targets.
pub fn broadcast_with<R, F>(
    registry: &R,
    targets: &[SlotAddress],
    payload: &[u8],
    mut on_outcome: F,
) -> BroadcastReport
where
    R: SlotRegistry,
    F: FnMut(&TargetOutcome),
{
    let mut outcomes = Vec::with_capacity(targets.len());
    let mut succeeded = 0usize;

    for (index, address) in targets.iter().enumerate() {
        let status = match send_to(registry, address, payload) {
            Ok(bytes) => {
                succeeded += 1;
                debug!(%address, bytes, "delivered");
                SendStatus::Sent { bytes }
            }
            Err(failure) => {
                warn!(%address, stage = ?failure.stage, reason = %failure.reason, "delivery failed");
                SendStatus::Failed(failure)
            }
        };
        let outcome = TargetOutcome {
            ordinal: index + 1,
            address: address.clone(),
            status,
        };
        on_outcome(&outcome);
        outcomes.push(outcome);
    }

    BroadcastReport {
        attempted: targets.len(),
        succeeded,
        outcomes,
    }
}
