use std::time::Duration;

use serde::Serialize;

use crate::address::SlotAddress;

/// Errors that can occur in slot transport operations.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    /// A size, timeout or address is outside the allowed range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Nothing is bound at the address (usually: the receiver is not running).
    #[error("no endpoint bound at {address}")]
    EndpointNotFound { address: SlotAddress },

    /// The host portion of a remote address cannot be resolved.
    #[error("path not found for {address}: {reason}")]
    PathNotFound { address: SlotAddress, reason: String },

    /// The slot is temporarily unavailable.
    #[error("slot {address} is busy")]
    Busy { address: SlotAddress },

    /// The channel failed mid-transfer.
    #[error("broken channel at {address}: {reason}")]
    BrokenChannel { address: SlotAddress, reason: String },

    /// No message arrived within the idle timeout.
    #[error("no message within {0:?}")]
    Timeout(Duration),

    /// The payload exceeds the slot's maximum message size.
    #[error("message too large ({size} bytes, {})", describe_limit(.max))]
    MessageTooLarge { size: usize, max: Option<usize> },

    /// Another endpoint already owns the address.
    #[error("slot {address} is already bound")]
    AlreadyBound { address: SlotAddress },
}

fn describe_limit(max: &Option<usize>) -> String {
    match max {
        Some(max) => format!("max {max}"),
        None => "over the slot limit".to_string(),
    }
}

impl SlotError {
    /// Classification of this error.
    pub fn kind(&self) -> SlotErrorKind {
        match self {
            SlotError::InvalidParameter(_) => SlotErrorKind::InvalidParameter,
            SlotError::EndpointNotFound { .. } => SlotErrorKind::EndpointNotFound,
            SlotError::PathNotFound { .. } => SlotErrorKind::PathNotFound,
            SlotError::Busy { .. } => SlotErrorKind::Busy,
            SlotError::BrokenChannel { .. } => SlotErrorKind::BrokenChannel,
            SlotError::Timeout(_) => SlotErrorKind::Timeout,
            SlotError::MessageTooLarge { .. } => SlotErrorKind::MessageTooLarge,
            SlotError::AlreadyBound { .. } => SlotErrorKind::AlreadyBound,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SlotError::Timeout(_))
    }

    pub(crate) fn broken(address: &SlotAddress, reason: impl ToString) -> Self {
        SlotError::BrokenChannel {
            address: address.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Copyable classification of a [`SlotError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotErrorKind {
    InvalidParameter,
    EndpointNotFound,
    PathNotFound,
    Busy,
    BrokenChannel,
    Timeout,
    MessageTooLarge,
    AlreadyBound,
}

impl SlotErrorKind {
    /// Human-readable reason, as printed on the console.
    pub fn describe(self) -> &'static str {
        match self {
            SlotErrorKind::InvalidParameter => "Invalid parameter",
            SlotErrorKind::EndpointNotFound => "Mailslot not found",
            SlotErrorKind::PathNotFound => "Path not found",
            SlotErrorKind::Busy => "Mailslot is busy",
            SlotErrorKind::BrokenChannel => "Broken channel",
            SlotErrorKind::Timeout => "Timeout",
            SlotErrorKind::MessageTooLarge => "Message too large",
            SlotErrorKind::AlreadyBound => "Mailslot already exists",
        }
    }
}

pub type Result<T> = std::result::Result<T, SlotError>;
