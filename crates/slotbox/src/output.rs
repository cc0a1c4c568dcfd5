use std::io::{IsTerminal, Write};
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use slotbox_peer::{
    BenchEvent, BenchReport, BroadcastReport, LoopSummary, SendStatus, TargetOutcome, Termination,
};
use slotbox_transport::{EndpointConfig, Message, SlotAddress, SlotError, SlotErrorKind};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Payload bytes only on stdout; status text goes to stderr.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One JSON line on stdout.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Message {
        address: &'a SlotAddress,
        ordinal: Option<u64>,
        size: usize,
        /// Readable text, cut at the first NUL.
        payload: String,
        /// Every payload byte, lowercase hex.
        payload_hex: String,
    },
    Timeout {
        address: &'a SlotAddress,
        timeout_ms: u128,
    },
    ReceiveFailed {
        address: &'a SlotAddress,
        kind: SlotErrorKind,
        reason: String,
    },
    Progress {
        count: u64,
    },
    Summary {
        address: &'a SlotAddress,
        count: u64,
        termination: &'static str,
        error: Option<String>,
    },
    WriteFailed {
        index: usize,
        kind: SlotErrorKind,
        reason: String,
    },
    Sent {
        sent: usize,
        total: usize,
    },
}

#[derive(Serialize)]
struct BenchOutput<'a> {
    event: &'static str,
    address: &'a SlotAddress,
    #[serde(flatten)]
    report: &'a BenchReport,
    kib_per_sec: Option<f64>,
}

#[derive(Serialize)]
struct BroadcastOutput<'a> {
    event: &'static str,
    #[serde(flatten)]
    report: &'a BroadcastReport,
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Human status text: stdout normally, stderr when stdout carries raw payloads.
fn status(format: OutputFormat, line: &str) {
    match format {
        OutputFormat::Raw => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_send_attempt(outcome: &TargetOutcome, payload: &[u8], format: OutputFormat) {
    if !matches!(format, OutputFormat::Pretty | OutputFormat::Raw) {
        return;
    }
    status(format, &format!("[{}] Sending attempt", outcome.ordinal));
    match &outcome.status {
        SendStatus::Sent { bytes } => status(
            format,
            &format!("Message sent ({bytes} bytes): {}", payload_preview(payload)),
        ),
        SendStatus::Failed(failure) => {
            status(
                format,
                &format!(
                    "Failed to send to {}: {} ({})",
                    outcome.address,
                    failure.kind.describe(),
                    failure.reason
                ),
            );
            if failure.kind == SlotErrorKind::EndpointNotFound {
                status(format, "Make sure the receiver is running.");
            }
        }
    }
}

pub fn print_broadcast(report: &BroadcastReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BroadcastOutput {
            event: "broadcast",
            report,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "ADDRESS", "STATUS", "BYTES", "ERROR"]);
            for outcome in &report.outcomes {
                let (state, bytes, error) = match &outcome.status {
                    SendStatus::Sent { bytes } => ("sent", bytes.to_string(), String::new()),
                    SendStatus::Failed(failure) => (
                        "failed",
                        String::new(),
                        format!("{}: {}", failure.kind.describe(), failure.reason),
                    ),
                };
                table.add_row(vec![
                    outcome.ordinal.to_string(),
                    outcome.address.to_string(),
                    state.to_string(),
                    bytes,
                    error,
                ]);
            }
            println!("{table}");
            println!("{} of {} target(s) succeeded", report.succeeded, report.attempted);
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            status(
                format,
                &format!(
                    "\nResult: sent successfully to {} of {} server(s)",
                    report.succeeded, report.attempted
                ),
            );
        }
    }
}

pub fn print_ready(
    address: &SlotAddress,
    config: &EndpointConfig,
    multi: bool,
    format: OutputFormat,
) {
    if !matches!(format, OutputFormat::Pretty | OutputFormat::Raw) {
        return;
    }
    status(format, &format!("Mailslot created: {address}"));
    if config.max_message_size != EndpointConfig::default().max_message_size {
        status(
            format,
            &format!("Max message size: {} bytes", config.max_message_size),
        );
    }
    if multi {
        status(format, "Waiting for client messages...");
        status(format, "Press Ctrl+C to exit");
    } else {
        status(format, "Waiting for client message...");
    }
}

/// Print a received message; `ordinal` is set inside the multi-message loop.
pub fn print_message(
    address: &SlotAddress,
    ordinal: Option<u64>,
    message: &Message,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&Record::Message {
            address,
            ordinal,
            size: message.len(),
            payload: payload_preview(message.as_bytes()),
            payload_hex: hex(message.as_bytes()),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "SIZE", "PAYLOAD"]);
            table.add_row(vec![
                ordinal.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
                message.len().to_string(),
                payload_preview(message.as_bytes()),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match (ordinal, message.is_empty()) {
            (Some(n), true) => println!("[{n}] Empty message"),
            (Some(n), false) => println!(
                "[{n}] Received ({} bytes): {}",
                message.len(),
                payload_preview(message.as_bytes())
            ),
            (None, true) => println!("Empty message received"),
            (None, false) => {
                println!("Received message ({} bytes):", message.len());
                println!("{}", payload_preview(message.as_bytes()));
            }
        },
        OutputFormat::Raw => {
            print_raw(message.as_bytes());
            if ordinal.is_some() {
                print_raw(b"\n");
            }
        }
    }
}

pub fn print_timeout(address: &SlotAddress, timeout: Duration, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Timeout {
            address,
            timeout_ms: timeout.as_millis(),
        }),
        _ => status(
            format,
            &format!("Message wait timeout ({})", human_duration(timeout)),
        ),
    }
}

pub fn print_receive_error(address: &SlotAddress, err: &SlotError, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::ReceiveFailed {
            address,
            kind: err.kind(),
            reason: err.to_string(),
        }),
        _ => eprintln!("Receive failed: {} ({err})", err.kind().describe()),
    }
}

/// Closing banner after a single-shot receive.
pub fn print_receive_done(format: OutputFormat) {
    if let Some(line) = receive_done_line(format) {
        status(format, line);
    }
}

fn receive_done_line(format: OutputFormat) -> Option<&'static str> {
    match format {
        OutputFormat::Pretty | OutputFormat::Raw => Some("Server shutting down."),
        OutputFormat::Json | OutputFormat::Table => None,
    }
}

pub fn print_progress(count: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Progress { count }),
        _ => status(format, &format!("Processed messages: {count}")),
    }
}

pub fn print_loop_summary(address: &SlotAddress, summary: &LoopSummary, format: OutputFormat) {
    let (termination, error) = match &summary.termination {
        Termination::TimedOut(_) => ("timed_out", None),
        Termination::Stopped => ("stopped", None),
        Termination::Errored(err) => ("errored", Some(err)),
    };

    if format == OutputFormat::Json {
        print_json(&Record::Summary {
            address,
            count: summary.count,
            termination,
            error: error.map(ToString::to_string),
        });
        return;
    }

    match &summary.termination {
        Termination::TimedOut(timeout) => {
            status(
                format,
                &format!("\nMessage wait timeout ({})", human_duration(*timeout)),
            );
            status(
                format,
                &format!("Total messages received: {}", summary.count),
            );
        }
        Termination::Errored(err) => {
            eprintln!("Receive failed: {} ({err})", err.kind().describe());
        }
        Termination::Stopped => {}
    }
    status(
        format,
        &format!("\nServer shutting down. Total messages: {}", summary.count),
    );
}

pub fn print_bench_start(
    address: &SlotAddress,
    count: usize,
    payload_size: usize,
    format: OutputFormat,
) {
    if !matches!(format, OutputFormat::Pretty | OutputFormat::Raw) {
        return;
    }
    status(format, &format!("Performance test: sending {count} messages"));
    status(format, &format!("Server: {address}"));
    status(format, &format!("Message size: {payload_size} bytes"));
}

pub fn print_bench_event(event: &BenchEvent<'_>, format: OutputFormat) {
    match (event, format) {
        (BenchEvent::WriteFailed { index, error }, OutputFormat::Json) => {
            print_json(&Record::WriteFailed {
                index: *index,
                kind: error.kind(),
                reason: error.to_string(),
            })
        }
        (BenchEvent::WriteFailed { index, error }, _) => {
            eprintln!(
                "Write {} failed: {} ({error})",
                index + 1,
                error.kind().describe()
            );
        }
        (BenchEvent::Progress { sent, total }, OutputFormat::Json) => print_json(&Record::Sent {
            sent: *sent,
            total: *total,
        }),
        (BenchEvent::Progress { sent, total }, OutputFormat::Pretty | OutputFormat::Raw) => {
            status(format, &format!("Sent: {sent} / {total}"));
        }
        (BenchEvent::Progress { .. }, OutputFormat::Table) => {}
    }
}

pub fn print_bench_report(address: &SlotAddress, report: &BenchReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BenchOutput {
            event: "bench",
            address,
            report,
            kib_per_sec: report.kib_per_sec(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["METRIC", "VALUE"]);
            for (metric, value) in bench_rows(report) {
                table.add_row(vec![metric.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            status(format, "\n========== MEASUREMENT RESULTS ==========");
            for (metric, value) in bench_rows(report) {
                status(format, &format!("{metric}: {value}"));
            }
            status(format, "=========================================");
        }
    }
}

fn bench_rows(report: &BenchReport) -> Vec<(&'static str, String)> {
    let rate = |value: Option<f64>, unit: &str| match value {
        Some(value) => format!("{value:.2} {unit}"),
        None => "n/a".to_string(),
    };
    vec![
        ("Messages", report.messages.to_string()),
        ("Succeeded", report.succeeded.to_string()),
        ("Errors", report.errors.to_string()),
        ("Elapsed", format!("{:.3} s", report.elapsed.as_secs_f64())),
        ("Rate", rate(report.messages_per_sec, "msg/s")),
        ("Throughput", rate(report.bytes_per_sec, "B/s")),
        ("Throughput", rate(report.kib_per_sec(), "KB/s")),
    ]
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Text payloads print as-is up to the first NUL; anything else is summarized.
fn payload_preview(payload: &[u8]) -> String {
    let text = payload.split(|b| *b == 0).next().unwrap_or_default();
    match std::str::from_utf8(text) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn human_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 60_000 == 0 && millis >= 60_000 {
        let minutes = millis / 60_000;
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!("{minutes} {unit}")
    } else if millis % 1000 == 0 {
        format!("{} s", millis / 1000)
    } else {
        format!("{millis} ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_stops_at_nul() {
        assert_eq!(payload_preview(b"hello\0junk"), "hello");
        assert_eq!(payload_preview(b""), "");
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }

    #[test]
    fn message_record_keeps_every_byte() {
        let address = SlotAddress::local("Box");
        let payload = b"a\0b\xff";
        let value = serde_json::to_value(Record::Message {
            address: &address,
            ordinal: Some(2),
            size: payload.len(),
            payload: payload_preview(payload),
            payload_hex: hex(payload),
        })
        .unwrap();

        assert_eq!(value["event"], "message");
        assert_eq!(value["payload"], "a");
        assert_eq!(value["payload_hex"], "610062ff");
        assert_eq!(value["size"], 4);
    }

    #[test]
    fn single_receive_closes_only_in_text_formats() {
        assert_eq!(
            receive_done_line(OutputFormat::Pretty),
            Some("Server shutting down.")
        );
        assert_eq!(
            receive_done_line(OutputFormat::Raw),
            Some("Server shutting down.")
        );
        assert_eq!(receive_done_line(OutputFormat::Json), None);
        assert_eq!(receive_done_line(OutputFormat::Table), None);
    }

    #[test]
    fn durations_read_like_the_receiver_banner() {
        assert_eq!(human_duration(Duration::from_secs(180)), "3 minutes");
        assert_eq!(human_duration(Duration::from_secs(60)), "1 minute");
        assert_eq!(human_duration(Duration::from_secs(5)), "5 s");
        assert_eq!(human_duration(Duration::from_millis(250)), "250 ms");
    }

    #[test]
    fn bench_rows_show_missing_rates() {
        let report = BenchReport::from_counts(10, 10, 25, Duration::ZERO);
        let rows = bench_rows(&report);
        assert_eq!(rows[4], ("Rate", "n/a".to_string()));

        let report = BenchReport::from_counts(1000, 1000, 25, Duration::from_secs(2));
        let rows = bench_rows(&report);
        assert_eq!(rows[3], ("Elapsed", "2.000 s".to_string()));
        assert_eq!(rows[4], ("Rate", "500.00 msg/s".to_string()));
        assert_eq!(rows[5], ("Throughput", "12500.00 B/s".to_string()));
    }

    #[test]
    fn broadcast_record_is_tagged() {
        let report = BroadcastReport {
            attempted: 0,
            succeeded: 0,
            outcomes: Vec::new(),
        };
        let value = serde_json::to_value(BroadcastOutput {
            event: "broadcast",
            report: &report,
        })
        .unwrap();
        assert_eq!(value["event"], "broadcast");
        assert_eq!(value["attempted"], 0);
    }
}
