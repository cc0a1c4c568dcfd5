use slotbox_peer::broadcast_with;
use slotbox_transport::resolve_targets;

use crate::cmd::{Context, SendArgs};
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_broadcast, print_send_attempt};
use crate::registry::platform_registry;

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let targets = resolve_targets(&args.targets, &ctx.box_name);
    let registry = platform_registry(ctx.runtime_dir.as_deref());

    let report = broadcast_with(&registry, &targets, &payload, |outcome| {
        print_send_attempt(outcome, &payload, ctx.format)
    });
    print_broadcast(&report, ctx.format);

    if report.all_succeeded() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
