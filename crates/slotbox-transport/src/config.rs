use std::time::Duration;

use crate::address::SlotAddress;
use crate::error::{Result, SlotError};

/// Default maximum message size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 300;

/// Maximum message size of the wide receiver variant.
pub const WIDE_MAX_MESSAGE_SIZE: usize = 500;

/// Largest maximum message size an endpoint may be created with.
pub const MAX_MESSAGE_SIZE_LIMIT: usize = 65_535;

/// Default idle read timeout: 3 minutes.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Shortest idle timeout an endpoint may be created with.
pub const MIN_IDLE_TIMEOUT: Duration = Duration::from_millis(1);

/// Longest idle timeout. `u32::MAX` milliseconds means "wait forever" to the
/// mailslot API and is excluded.
pub const MAX_IDLE_TIMEOUT: Duration = Duration::from_millis(u32::MAX as u64 - 1);

/// Creation-time parameters of a receiving endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Maximum accepted message size in bytes. Fixed for the endpoint lifetime.
    pub max_message_size: usize,
    /// How long a read blocks with no incoming message before `Timeout`.
    pub idle_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl EndpointConfig {
    /// The 500-byte receiver variant.
    pub fn wide() -> Self {
        Self {
            max_message_size: WIDE_MAX_MESSAGE_SIZE,
            ..Self::default()
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Check size and timeout ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 || self.max_message_size > MAX_MESSAGE_SIZE_LIMIT {
            return Err(SlotError::InvalidParameter(format!(
                "max message size {} outside 1..={MAX_MESSAGE_SIZE_LIMIT}",
                self.max_message_size
            )));
        }
        if self.idle_timeout < MIN_IDLE_TIMEOUT || self.idle_timeout > MAX_IDLE_TIMEOUT {
            return Err(SlotError::InvalidParameter(format!(
                "idle timeout {:?} outside {MIN_IDLE_TIMEOUT:?}..={MAX_IDLE_TIMEOUT:?}",
                self.idle_timeout
            )));
        }
        Ok(())
    }

    /// Idle timeout in whole milliseconds, as the mailslot API takes it.
    pub fn idle_timeout_millis(&self) -> u32 {
        u32::try_from(self.idle_timeout.as_millis()).unwrap_or(u32::MAX - 1)
    }
}

/// Checks shared by every backend before binding.
///
/// Endpoints can only be created in local scope.
pub(crate) fn check_bindable(address: &SlotAddress, config: &EndpointConfig) -> Result<()> {
    if !address.is_local() {
        return Err(SlotError::InvalidParameter(format!(
            "endpoints can only be created locally, not at {address}"
        )));
    }
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.max_message_size, 300);
        assert_eq!(config.idle_timeout, Duration::from_secs(180));
        assert_eq!(config.idle_timeout_millis(), 180_000);
        assert_eq!(EndpointConfig::wide().max_message_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_sizes() {
        for size in [0, MAX_MESSAGE_SIZE_LIMIT + 1] {
            let config = EndpointConfig::default().with_max_message_size(size);
            assert!(matches!(
                config.validate(),
                Err(SlotError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn rejects_out_of_range_timeouts() {
        for timeout in [Duration::ZERO, MAX_IDLE_TIMEOUT + Duration::from_millis(1)] {
            let config = EndpointConfig::default().with_idle_timeout(timeout);
            assert!(matches!(
                config.validate(),
                Err(SlotError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn remote_addresses_are_not_bindable() {
        let remote = SlotAddress::remote("elsewhere", "Box");
        assert!(matches!(
            check_bindable(&remote, &EndpointConfig::default()),
            Err(SlotError::InvalidParameter(_))
        ));
        assert!(check_bindable(&SlotAddress::local("Box"), &EndpointConfig::default()).is_ok());
    }
}
