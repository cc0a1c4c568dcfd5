use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use slotbox_peer::{DEFAULT_BATCH_SIZE, DEFAULT_PAYLOAD, DEFAULT_PROGRESS_INTERVAL};
use slotbox_transport::{EndpointConfig, SlotAddress};

use crate::exit::{input_error, slot_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bench;
pub mod listen;
pub mod receive;
pub mod send;
pub mod version;

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub runtime_dir: Option<PathBuf>,
    pub box_name: String,
}

impl Context {
    pub fn local_address(&self) -> SlotAddress {
        SlotAddress::local(&self.box_name)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message to each target host.
    Send(SendArgs),
    /// Create the slot and wait for a single message.
    Receive(ReceiveArgs),
    /// Create the slot and print messages until idle.
    Listen(ListenArgs),
    /// Measure write throughput to one slot.
    Bench(BenchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, ctx),
        Command::Receive(args) => receive::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Bench(args) => bench::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// The selected payload, or the default greeting.
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            return read_payload(path);
        }
        Ok(DEFAULT_PAYLOAD.to_vec())
    }
}

fn read_payload(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|err| input_error(&format!("failed reading {}", path.display()), err))
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Target hosts; `.` or `localhost` mean this machine. Default: local only.
    #[arg(value_name = "HOST")]
    pub targets: Vec<String>,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct EndpointArgs {
    /// Largest accepted message in bytes.
    #[arg(long, value_name = "BYTES", conflicts_with = "wide")]
    pub max_size: Option<usize>,
    /// Accept messages up to 500 bytes.
    #[arg(long)]
    pub wide: bool,
    /// Give up after this long without a message (e.g. 180s, 3m, 500ms).
    #[arg(long, default_value = "180s")]
    pub timeout: String,
}

impl EndpointArgs {
    pub fn config(&self) -> CliResult<EndpointConfig> {
        let mut config = if self.wide {
            EndpointConfig::wide()
        } else {
            EndpointConfig::default()
        };
        if let Some(size) = self.max_size {
            config = config.with_max_message_size(size);
        }
        config = config.with_idle_timeout(parse_duration(&self.timeout)?);
        config
            .validate()
            .map_err(|err| slot_error("invalid endpoint settings", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    /// Report progress every N messages (0 disables).
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_every: usize,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Target host. Default: this machine.
    #[arg(value_name = "HOST")]
    pub target: Option<String>,
    /// Number of messages to write.
    #[arg(long, short = 'n', default_value_t = DEFAULT_BATCH_SIZE)]
    pub count: usize,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `30s`, `3m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        _ => Duration::from_secs(value),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use slotbox_transport::{DEFAULT_IDLE_TIMEOUT, WIDE_MAX_MESSAGE_SIZE};

    use super::*;

    fn endpoint(max_size: Option<usize>, wide: bool, timeout: &str) -> EndpointArgs {
        EndpointArgs {
            max_size,
            wide,
            timeout: timeout.to_string(),
        }
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        for bad in ["", "0s", "bad", "-1s", "1h"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.code, USAGE, "{bad}");
        }
    }

    #[test]
    fn endpoint_defaults() {
        let config = endpoint(None, false, "180s").config().unwrap();
        assert_eq!(config, EndpointConfig::default());
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn endpoint_wide_and_explicit_size() {
        let config = endpoint(None, true, "1s").config().unwrap();
        assert_eq!(config.max_message_size, WIDE_MAX_MESSAGE_SIZE);

        let config = endpoint(Some(64), false, "1s").config().unwrap();
        assert_eq!(config.max_message_size, 64);
    }

    #[test]
    fn endpoint_rejects_out_of_range_size() {
        let err = endpoint(Some(0), false, "1s").config().unwrap_err();
        assert_eq!(err.code, USAGE);
        let err = endpoint(Some(70_000), false, "1s").config().unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn payload_defaults_to_greeting() {
        let args = PayloadArgs {
            data: None,
            file: None,
        };
        assert_eq!(args.resolve().unwrap(), DEFAULT_PAYLOAD);

        let args = PayloadArgs {
            data: Some("hi".into()),
            file: None,
        };
        assert_eq!(args.resolve().unwrap(), b"hi");
    }

    #[test]
    fn unreadable_payload_file_is_usage_error() {
        let args = PayloadArgs {
            data: None,
            file: Some(PathBuf::from("/nonexistent/slotbox/payload.bin")),
        };
        assert_eq!(args.resolve().unwrap_err().code, USAGE);
    }
}
