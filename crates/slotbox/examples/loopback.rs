//! In-process loopback: a listener thread and a broadcaster sharing one
//! memory registry.
//!
//! Run with:
//!   cargo run --example loopback

use std::thread;
use std::time::Duration;

use slotbox::peer::{broadcast, LoopEvent, ReceiveLoop, StopToken};
use slotbox::transport::{
    resolve_targets, EndpointConfig, MemoryRegistry, SlotAddress, SlotRegistry, DEFAULT_BOX_NAME,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = MemoryRegistry::new();
    let config = EndpointConfig::default().with_idle_timeout(Duration::from_millis(300));
    let endpoint = registry.bind(&SlotAddress::local(DEFAULT_BOX_NAME), config)?;

    let listener = thread::spawn(move || {
        ReceiveLoop::new().run(endpoint, &StopToken::new(), |event| {
            if let LoopEvent::Message { ordinal, message } = event {
                eprintln!(
                    "[{ordinal}] {}",
                    String::from_utf8_lossy(message.as_bytes())
                );
            }
        })
    });

    // "nowhere" is not linked, so that target fails without affecting the rest.
    let targets = resolve_targets(&[".", "nowhere", "localhost"], DEFAULT_BOX_NAME);
    for n in 0..3 {
        let report = broadcast(&registry, &targets, format!("round {n}").as_bytes());
        eprintln!(
            "round {n}: sent to {} of {}",
            report.succeeded, report.attempted
        );
    }

    let summary = listener
        .join()
        .map_err(|_| "listener thread panicked")?;
    eprintln!("listener idle after {} message(s)", summary.count);
    Ok(())
}
