use slotbox_peer::{run_bench, BenchConfig, MonotonicClock};
use slotbox_transport::resolve_target;

use crate::cmd::{BenchArgs, Context};
use crate::exit::{peer_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_bench_event, print_bench_report, print_bench_start};
use crate::registry::platform_registry;

pub fn run(args: BenchArgs, ctx: &Context) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let address = match &args.target {
        Some(host) => resolve_target(host, &ctx.box_name),
        None => ctx.local_address(),
    };
    let config = BenchConfig::default().with_message_count(args.count);
    let registry = platform_registry(ctx.runtime_dir.as_deref());

    print_bench_start(&address, config.message_count, payload.len(), ctx.format);
    let report = run_bench(
        &registry,
        &address,
        &payload,
        &config,
        &MonotonicClock,
        |event| print_bench_event(&event, ctx.format),
    )
    .map_err(|err| peer_error("benchmark failed", err))?;
    print_bench_report(&address, &report, ctx.format);

    if report.is_clean() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
