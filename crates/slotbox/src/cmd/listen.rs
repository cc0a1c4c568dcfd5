use slotbox_peer::{LoopEvent, ReceiveLoop, StopToken};
use slotbox_transport::SlotRegistry;
use tracing::info;

use crate::cmd::{Context, ListenArgs};
use crate::exit::{bind_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_loop_summary, print_message, print_progress, print_ready};
use crate::registry::platform_registry;

/// Exit status after a second interrupt.
const INTERRUPTED: i32 = 130;

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let config = args.endpoint.config()?;
    let address = ctx.local_address();
    let registry = platform_registry(ctx.runtime_dir.as_deref());

    let endpoint = registry
        .bind(&address, config)
        .map_err(|err| bind_error("create failed", err))?;

    let stop = StopToken::new();
    install_ctrlc_handler(stop.clone())?;
    print_ready(&address, &config, true, ctx.format);

    let summary = ReceiveLoop::new()
        .with_progress_interval(args.progress_every)
        .run(endpoint, &stop, |event| match event {
            LoopEvent::Message { ordinal, message } => {
                print_message(&address, Some(ordinal), message, ctx.format)
            }
            LoopEvent::Progress { count } => print_progress(count, ctx.format),
        });
    print_loop_summary(&address, &summary, ctx.format);

    if summary.is_clean() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}

/// The first interrupt stops the loop after the pending read; the second
/// exits at once.
fn install_ctrlc_handler(stop: StopToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if stop.is_stopped() {
            std::process::exit(INTERRUPTED);
        }
        info!("stopping after the current read; interrupt again to exit now");
        stop.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
