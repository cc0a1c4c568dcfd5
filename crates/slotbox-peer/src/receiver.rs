//! Receivers built on a single owned endpoint.
//!
//! Single-shot: `Created → Waiting → {Received | TimedOut | Errored} → Closed`.
//!
//! Loop: `Created → Waiting ⇄ Processing → {TimedOut | Errored | Stopped} → Closed`.
//! The loop has no iteration cap; it ends on the idle timeout, a transport
//! error, or the stop token.

use std::fmt;
use std::time::Duration;

use slotbox_transport::{Message, SlotEndpoint, SlotError};
use tracing::{debug, info, warn};

use crate::stop::StopToken;
use crate::DEFAULT_PROGRESS_INTERVAL;

/// Receiver lifecycle states, as traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Created,
    Waiting,
    Processing,
    Received,
    TimedOut,
    Errored,
    Stopped,
    Closed,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReceiverState::Created => "created",
            ReceiverState::Waiting => "waiting",
            ReceiverState::Processing => "processing",
            ReceiverState::Received => "received",
            ReceiverState::TimedOut => "timed-out",
            ReceiverState::Errored => "errored",
            ReceiverState::Stopped => "stopped",
            ReceiverState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Terminal result of a single-shot receive.
#[derive(Debug)]
pub enum SingleOutcome {
    Received(Message),
    /// No writer showed up within the idle timeout.
    TimedOut(Duration),
    Errored(SlotError),
}

impl SingleOutcome {
    pub fn state(&self) -> ReceiverState {
        match self {
            SingleOutcome::Received(_) => ReceiverState::Received,
            SingleOutcome::TimedOut(_) => ReceiverState::TimedOut,
            SingleOutcome::Errored(_) => ReceiverState::Errored,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SingleOutcome::Received(_))
    }
}

/// Read exactly one message, then close the endpoint.
///
/// The endpoint is released on every path.
pub fn receive_once<E: SlotEndpoint>(mut endpoint: E) -> SingleOutcome {
    let address = endpoint.address().clone();
    debug!(%address, state = %ReceiverState::Waiting, "single-shot receive");

    let outcome = match endpoint.read() {
        Ok(message) => SingleOutcome::Received(message),
        Err(SlotError::Timeout(timeout)) => SingleOutcome::TimedOut(timeout),
        Err(err) => SingleOutcome::Errored(err),
    };
    debug!(%address, state = %outcome.state(), "single-shot receive finished");

    endpoint.close();
    debug!(%address, state = %ReceiverState::Closed, "endpoint closed");
    outcome
}

/// Notifications emitted while the loop runs.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    /// A message arrived; `ordinal` counts from 1.
    Message { ordinal: u64, message: &'a Message },
    /// Emitted every `progress_interval` messages.
    Progress { count: u64 },
}

/// Why the loop ended.
#[derive(Debug)]
pub enum Termination {
    TimedOut(Duration),
    Errored(SlotError),
    Stopped,
}

#[derive(Debug)]
pub struct LoopSummary {
    /// Messages received before termination. Zero means no writer ever
    /// reached the endpoint.
    pub count: u64,
    pub termination: Termination,
}

impl LoopSummary {
    /// Idle timeout and stop are normal ends; a transport error is not.
    pub fn is_clean(&self) -> bool {
        !matches!(self.termination, Termination::Errored(_))
    }

    pub fn state(&self) -> ReceiverState {
        match self.termination {
            Termination::TimedOut(_) => ReceiverState::TimedOut,
            Termination::Errored(_) => ReceiverState::Errored,
            Termination::Stopped => ReceiverState::Stopped,
        }
    }
}

/// Multi-message receive loop.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveLoop {
    progress_interval: usize,
}

impl Default for ReceiveLoop {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ReceiveLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a progress event every `interval` messages (0 disables it).
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Read until idle timeout, transport error or stop, then close the endpoint.
    pub fn run<E, F>(&self, mut endpoint: E, stop: &StopToken, mut on_event: F) -> LoopSummary
    where
        E: SlotEndpoint,
        F: FnMut(LoopEvent<'_>),
    {
        let address = endpoint.address().clone();
        let mut count = 0u64;

        let termination = loop {
            if stop.is_stopped() {
                break Termination::Stopped;
            }

            match endpoint.read() {
                Ok(message) => {
                    count = count.saturating_add(1);
                    on_event(LoopEvent::Message {
                        ordinal: count,
                        message: &message,
                    });
                    if self.progress_interval > 0 && count % self.progress_interval as u64 == 0 {
                        on_event(LoopEvent::Progress { count });
                    }
                }
                Err(SlotError::Timeout(timeout)) => break Termination::TimedOut(timeout),
                Err(err) => {
                    warn!(%address, error = %err, "receive loop failed");
                    break Termination::Errored(err);
                }
            }
        };

        endpoint.close();
        let summary = LoopSummary { count, termination };
        info!(%address, count, state = %summary.state(), "receive loop finished");
        summary
    }
}
