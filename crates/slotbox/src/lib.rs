//! Named, size-bounded datagram slots.
//!
//! A receiver binds a slot by name and waits for whole messages; senders
//! open the slot, write once and disconnect. On Windows slots are native
//! mailslots, elsewhere they are unix datagram sockets.
//!
//! # Crate Structure
//!
//! - [`transport`]: addresses, errors and the slot backends
//! - [`peer`]: broadcast sender, receivers and throughput harness

/// Re-export transport types.
pub mod transport {
    pub use slotbox_transport::*;
}

/// Re-export peer types.
pub mod peer {
    pub use slotbox_peer::*;
}
