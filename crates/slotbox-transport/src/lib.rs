//! Named, size-bounded datagram slots.
//!
//! A slot has one receiving endpoint and any number of writers. Writers open
//! a slot by name, write whole messages and disconnect; nothing is queued for
//! a slot that does not exist yet.
//!
//! Backends:
//! - [`MemoryRegistry`]: in-process name map (all platforms)
//! - [`UdsRegistry`]: unix datagram sockets (Linux/macOS)
//! - [`MailslotRegistry`]: native mailslots (Windows)
//!
//! This is the lowest layer of slotbox; everything else is written against
//! the [`SlotRegistry`] trait.

pub mod address;
pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(windows)]
pub mod mailslot;

pub use address::{
    is_local_alias, resolve_target, resolve_targets, SlotAddress, CHANNEL_SEGMENT,
    DEFAULT_BOX_NAME, LOCAL_ALIASES,
};
pub use config::{
    EndpointConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, MAX_MESSAGE_SIZE_LIMIT,
    WIDE_MAX_MESSAGE_SIZE,
};
pub use error::{Result, SlotError, SlotErrorKind};
pub use memory::{IdleMode, MemoryEndpoint, MemoryRegistry, MemoryWriter};
pub use traits::{Message, SlotEndpoint, SlotRegistry, SlotWriter};

#[cfg(unix)]
pub use uds::{default_runtime_dir, UdsEndpoint, UdsRegistry, UdsRegistryConfig, UdsWriter};

#[cfg(windows)]
pub use mailslot::{MailslotEndpoint, MailslotRegistry, MailslotWriter};
