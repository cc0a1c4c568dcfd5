use bytes::Bytes;

use crate::address::SlotAddress;
use crate::config::EndpointConfig;
use crate::error::Result;

/// One datagram read from a slot.
///
/// Carries nothing but its bytes: no sender identity, timestamp or sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.payload.as_ref()
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Zero-length messages are valid reads.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// The receiving side of a slot.
///
/// Dropping (or closing) the endpoint releases its name.
pub trait SlotEndpoint {
    /// The address this endpoint is bound to.
    fn address(&self) -> &SlotAddress;

    /// Parameters the endpoint was created with.
    fn config(&self) -> &EndpointConfig;

    /// Block until the next message, the idle timeout, or a channel error.
    fn read(&mut self) -> Result<Message>;

    /// Release the endpoint.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// A write-only handle to one slot.
pub trait SlotWriter {
    /// The address this handle writes to.
    fn address(&self) -> &SlotAddress;

    /// Write one whole message. Returns the number of bytes accepted.
    ///
    /// A message is atomic: it is accepted whole or rejected.
    fn write(&mut self, payload: &[u8]) -> Result<usize>;

    /// Release the handle.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// Name → endpoint capability provided by the hosting environment.
pub trait SlotRegistry {
    type Endpoint: SlotEndpoint;
    type Writer: SlotWriter;

    /// Create an endpoint bound to `address`.
    ///
    /// Fails with `AlreadyBound` if the name is taken.
    fn bind(&self, address: &SlotAddress, config: EndpointConfig) -> Result<Self::Endpoint>;

    /// Open a writer to an existing endpoint.
    ///
    /// Fails with `EndpointNotFound` if nothing is bound there; nothing is
    /// queued for endpoints that do not exist yet.
    fn open(&self, address: &SlotAddress) -> Result<Self::Writer>;

    /// Backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}
