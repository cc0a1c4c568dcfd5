use slotbox_peer::{receive_once, SingleOutcome};
use slotbox_transport::SlotRegistry;

use crate::cmd::{Context, ReceiveArgs};
use crate::exit::{bind_error, CliResult, FAILURE, SUCCESS};
use crate::output::{
    print_message, print_ready, print_receive_done, print_receive_error, print_timeout,
};
use crate::registry::platform_registry;

pub fn run(args: ReceiveArgs, ctx: &Context) -> CliResult<i32> {
    let config = args.endpoint.config()?;
    let address = ctx.local_address();
    let registry = platform_registry(ctx.runtime_dir.as_deref());

    let endpoint = registry
        .bind(&address, config)
        .map_err(|err| bind_error("create failed", err))?;
    print_ready(&address, &config, false, ctx.format);

    let code = match receive_once(endpoint) {
        SingleOutcome::Received(message) => {
            print_message(&address, None, &message, ctx.format);
            SUCCESS
        }
        SingleOutcome::TimedOut(timeout) => {
            print_timeout(&address, timeout, ctx.format);
            FAILURE
        }
        SingleOutcome::Errored(err) => {
            print_receive_error(&address, &err, ctx.format);
            FAILURE
        }
    };
    print_receive_done(ctx.format);
    Ok(code)
}
