//! In-process slot registry.
//!
//! A name → endpoint map owned by the embedding program. Remote hosts are
//! simulated by linking other registries under a host name.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info};

use crate::address::SlotAddress;
use crate::config::{check_bindable, EndpointConfig};
use crate::error::{Result, SlotError};
use crate::traits::{Message, SlotEndpoint, SlotRegistry, SlotWriter};

/// How an empty endpoint behaves on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleMode {
    /// Block up to the idle timeout on the wall clock.
    #[default]
    Wait,
    /// Report `Timeout` as soon as the queue is empty, as if the idle window
    /// had already elapsed.
    Immediate,
}

#[derive(Default)]
struct RegistryInner {
    slots: Mutex<HashMap<SlotAddress, Arc<Slot>>>,
    hosts: Mutex<HashMap<String, Weak<RegistryInner>>>,
}

struct Slot {
    config: EndpointConfig,
    state: Mutex<SlotState>,
    ready: Condvar,
}

struct SlotState {
    queue: VecDeque<Bytes>,
    open: bool,
}

/// In-memory [`SlotRegistry`].
///
/// Cloning shares the same namespace.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<RegistryInner>,
    idle_mode: IdleMode,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the idle behavior of endpoints bound through this handle.
    pub fn with_idle_mode(mut self, idle_mode: IdleMode) -> Self {
        self.idle_mode = idle_mode;
        self
    }

    /// Make `other`'s local slots reachable as `\\host\mailslot\...`.
    ///
    /// Host names compare case-insensitively.
    pub fn link_host(&self, host: &str, other: &MemoryRegistry) {
        lock(&self.inner.hosts).insert(host.to_ascii_lowercase(), Arc::downgrade(&other.inner));
    }

    /// True if an endpoint is currently bound at `address`.
    pub fn is_bound(&self, address: &SlotAddress) -> bool {
        lock(&self.inner.slots).contains_key(address)
    }

    /// Number of messages waiting at `address`, if bound.
    pub fn pending(&self, address: &SlotAddress) -> Option<usize> {
        let slot = lock(&self.inner.slots).get(address).cloned()?;
        let count = lock(&slot.state).queue.len();
        Some(count)
    }

    fn lookup(&self, address: &SlotAddress) -> Result<Arc<Slot>> {
        if address.is_local() {
            return lock(&self.inner.slots)
                .get(address)
                .cloned()
                .ok_or_else(|| SlotError::EndpointNotFound {
                    address: address.clone(),
                });
        }

        let host = address.host().to_ascii_lowercase();
        let remote = lock(&self.inner.hosts)
            .get(&host)
            .and_then(Weak::upgrade)
            .ok_or_else(|| SlotError::PathNotFound {
                address: address.clone(),
                reason: format!("host {} is not reachable", address.host()),
            })?;
        let local = address.to_local();
        let slot = lock(&remote.slots).get(&local).cloned();
        slot.ok_or_else(|| SlotError::EndpointNotFound {
            address: address.clone(),
        })
    }
}

impl SlotRegistry for MemoryRegistry {
    type Endpoint = MemoryEndpoint;
    type Writer = MemoryWriter;

    fn bind(&self, address: &SlotAddress, config: EndpointConfig) -> Result<MemoryEndpoint> {
        check_bindable(address, &config)?;

        let mut slots = lock(&self.inner.slots);
        if slots.contains_key(address) {
            return Err(SlotError::AlreadyBound {
                address: address.clone(),
            });
        }

        let slot = Arc::new(Slot {
            config,
            state: Mutex::new(SlotState {
                queue: VecDeque::new(),
                open: true,
            }),
            ready: Condvar::new(),
        });
        slots.insert(address.clone(), slot.clone());
        info!(%address, max = config.max_message_size, "memory slot bound");

        Ok(MemoryEndpoint {
            address: address.clone(),
            slot,
            registry: Arc::downgrade(&self.inner),
            idle_mode: self.idle_mode,
        })
    }

    fn open(&self, address: &SlotAddress) -> Result<MemoryWriter> {
        let slot = self.lookup(address)?;
        debug!(%address, "opened memory slot writer");
        Ok(MemoryWriter {
            address: address.clone(),
            slot,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Receiving endpoint of a [`MemoryRegistry`] slot.
pub struct MemoryEndpoint {
    address: SlotAddress,
    slot: Arc<Slot>,
    registry: Weak<RegistryInner>,
    idle_mode: IdleMode,
}

impl SlotEndpoint for MemoryEndpoint {
    fn address(&self) -> &SlotAddress {
        &self.address
    }

    fn config(&self) -> &EndpointConfig {
        &self.slot.config
    }

    fn read(&mut self) -> Result<Message> {
        let timeout = self.slot.config.idle_timeout;
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.slot.state);

        loop {
            if let Some(payload) = state.queue.pop_front() {
                return Ok(Message::new(payload));
            }
            if self.idle_mode == IdleMode::Immediate {
                return Err(SlotError::Timeout(timeout));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SlotError::Timeout(timeout));
            }
            state = self
                .slot
                .ready
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

impl Drop for MemoryEndpoint {
    fn drop(&mut self) {
        lock(&self.slot.state).open = false;
        self.slot.ready.notify_all();

        if let Some(registry) = self.registry.upgrade() {
            let mut slots = lock(&registry.slots);
            if slots
                .get(&self.address)
                .is_some_and(|bound| Arc::ptr_eq(bound, &self.slot))
            {
                slots.remove(&self.address);
            }
        }
        info!(address = %self.address, "memory slot released");
    }
}

/// Writer handle to a [`MemoryRegistry`] slot.
pub struct MemoryWriter {
    address: SlotAddress,
    slot: Arc<Slot>,
}

impl SlotWriter for MemoryWriter {
    fn address(&self) -> &SlotAddress {
        &self.address
    }

    fn write(&mut self, payload: &[u8]) -> Result<usize> {
        let max = self.slot.config.max_message_size;
        if payload.len() > max {
            return Err(SlotError::MessageTooLarge {
                size: payload.len(),
                max: Some(max),
            });
        }

        let mut state = lock(&self.slot.state);
        if !state.open {
            return Err(SlotError::broken(&self.address, "endpoint closed"));
        }
        state.queue.push_back(Bytes::copy_from_slice(payload));
        drop(state);
        self.slot.ready.notify_one();
        Ok(payload.len())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
