//! Selects the native slot backend for this platform.

use std::path::Path;

#[cfg(unix)]
pub type PlatformRegistry = slotbox_transport::UdsRegistry;

#[cfg(windows)]
pub type PlatformRegistry = slotbox_transport::MailslotRegistry;

#[cfg(unix)]
pub fn platform_registry(runtime_dir: Option<&Path>) -> PlatformRegistry {
    use slotbox_transport::{UdsRegistry, UdsRegistryConfig};

    let registry = match runtime_dir {
        Some(dir) => UdsRegistry::with_runtime_dir(dir),
        None => UdsRegistry::new(UdsRegistryConfig::default()),
    };
    tracing::debug!(runtime_dir = %registry.runtime_dir().display(), "using unix datagram slots");
    registry
}

#[cfg(windows)]
pub fn platform_registry(runtime_dir: Option<&Path>) -> PlatformRegistry {
    if let Some(dir) = runtime_dir {
        tracing::debug!(runtime_dir = %dir.display(), "runtime directory ignored for mailslots");
    }
    slotbox_transport::MailslotRegistry::new()
}
