mod cmd;
mod exit;
mod logging;
mod output;
mod registry;

use std::path::PathBuf;

use clap::Parser;
use slotbox_transport::DEFAULT_BOX_NAME;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "slotbox", version, about = "Named datagram slots CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Directory holding slot sockets (unix only).
    #[arg(long, value_name = "DIR", env = "SLOTBOX_RUNTIME_DIR", global = true)]
    runtime_dir: Option<PathBuf>,

    /// Slot name under the mailslot namespace.
    #[arg(
        long = "box",
        value_name = "NAME",
        env = "SLOTBOX_BOX",
        default_value = DEFAULT_BOX_NAME,
        global = true
    )]
    box_name: String,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        runtime_dir: cli.runtime_dir,
        box_name: cli.box_name,
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_hosts() {
        let cli = Cli::try_parse_from(["slotbox", "send", ".", "alpha", "--data", "hi"])
            .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.targets, vec![".", "alpha"]);
                assert_eq!(args.payload.data.as_deref(), Some("hi"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.box_name, DEFAULT_BOX_NAME);
    }

    #[test]
    fn send_without_hosts_targets_nothing_explicit() {
        let cli = Cli::try_parse_from(["slotbox", "send"]).expect("bare send should parse");
        assert!(matches!(cli.command, Command::Send(ref args) if args.targets.is_empty()));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "slotbox",
            "send",
            "--data",
            "hello",
            "--file",
            "/tmp/payload.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_wide_with_explicit_size() {
        let err = Cli::try_parse_from(["slotbox", "receive", "--wide", "--max-size", "400"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_listen_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "slotbox",
            "listen",
            "--timeout",
            "3m",
            "--box",
            "Other",
            "--runtime-dir",
            "/tmp/slots",
            "--format",
            "json",
        ])
        .expect("listen args should parse");

        assert!(matches!(cli.command, Command::Listen(ref args) if args.endpoint.timeout == "3m"));
        assert_eq!(cli.box_name, "Other");
        assert_eq!(cli.runtime_dir, Some(PathBuf::from("/tmp/slots")));
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }

    #[test]
    fn parses_bench_count() {
        let cli = Cli::try_parse_from(["slotbox", "bench", "-n", "50"])
            .expect("bench args should parse");
        match cli.command {
            Command::Bench(args) => {
                assert_eq!(args.count, 50);
                assert!(args.target.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
