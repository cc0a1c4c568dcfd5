use slotbox_transport::{
    SlotRegistry, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, WIDE_MAX_MESSAGE_SIZE,
};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::registry::platform_registry;

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("slotbox {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: slotbox");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("SLOTBOX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("backend: {}", platform_registry(None).backend_name());
    println!(
        "defaults: max_size={DEFAULT_MAX_MESSAGE_SIZE}, wide_max_size={WIDE_MAX_MESSAGE_SIZE}, idle_timeout={}s",
        DEFAULT_IDLE_TIMEOUT.as_secs()
    );

    Ok(SUCCESS)
}
