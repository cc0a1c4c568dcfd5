use std::fmt;
use std::io;

use slotbox_peer::PeerError;
use slotbox_transport::SlotError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Errors reading user-supplied inputs (payload files) are usage errors.
pub fn input_error(context: &str, err: io::Error) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn slot_error(context: &str, err: SlotError) -> CliError {
    match err {
        SlotError::InvalidParameter(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(
            FAILURE,
            format!("{context}: {} ({other})", other.kind().describe()),
        ),
    }
}

/// Failing to create the receiving endpoint is fatal but never a usage
/// error: exit 1 whatever the cause.
pub fn bind_error(context: &str, err: SlotError) -> CliError {
    CliError::new(
        FAILURE,
        format!("{context}: {} ({err})", err.kind().describe()),
    )
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => slot_error(context, err),
        PeerError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use slotbox_transport::SlotAddress;

    use super::*;

    #[test]
    fn transport_failures_exit_one() {
        let err = slot_error(
            "open failed",
            SlotError::EndpointNotFound {
                address: SlotAddress::local("Box"),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("open failed: Mailslot not found"));

        let err = slot_error("read failed", SlotError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn bad_parameters_are_usage_errors() {
        let err = slot_error("bind failed", SlotError::InvalidParameter("size".into()));
        assert_eq!(err.code, USAGE);

        let err = peer_error("bench", PeerError::InvalidConfig("count".into()));
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn bind_failures_exit_one_even_for_bad_parameters() {
        let err = bind_error(
            "create failed",
            SlotError::InvalidParameter("socket path too long".into()),
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("create failed: Invalid parameter"));

        let err = bind_error(
            "create failed",
            SlotError::AlreadyBound {
                address: SlotAddress::local("Box"),
            },
        );
        assert_eq!(err.code, FAILURE);
    }
}
