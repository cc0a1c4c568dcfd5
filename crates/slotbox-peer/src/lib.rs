//! Sender, receivers and throughput harness for slotbox slots.
//!
//! Everything here is generic over [`slotbox_transport::SlotRegistry`], so the
//! same code drives the in-memory registry in tests and the platform backend
//! in the CLI.

pub mod bench;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod stop;

/// Progress events are raised every this many messages by default.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

pub use bench::{
    run_batch, run_bench, BenchConfig, BenchEvent, BenchReport, Clock, MonotonicClock,
    DEFAULT_BATCH_SIZE, DEFAULT_ERROR_REPORT_LIMIT,
};
pub use error::{PeerError, Result};
pub use receiver::{
    receive_once, LoopEvent, LoopSummary, ReceiveLoop, ReceiverState, SingleOutcome, Termination,
};
pub use sender::{
    broadcast, broadcast_with, send_to, BroadcastReport, SendFailure, SendStage, SendStatus,
    TargetOutcome, DEFAULT_PAYLOAD,
};
pub use stop::StopToken;
