//! Native Windows mailslots.
//!
//! Addresses are passed to the OS verbatim, so endpoints created here are
//! reachable from any mailslot client and vice versa, including over the
//! network.

use std::io;
use std::ptr;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ALREADY_EXISTS, ERROR_BAD_NETPATH, ERROR_FILE_NOT_FOUND,
    ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_PARAMETER, ERROR_PATH_NOT_FOUND, ERROR_PIPE_BUSY,
    ERROR_SEM_TIMEOUT, ERROR_TIMEOUT, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_SHARE_READ, OPEN_EXISTING,
};
use windows_sys::Win32::System::Mailslots::CreateMailslotW;

use crate::address::SlotAddress;
use crate::config::{check_bindable, EndpointConfig};
use crate::error::{Result, SlotError};
use crate::traits::{Message, SlotEndpoint, SlotRegistry, SlotWriter};

/// Registry backed by the OS mailslot namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailslotRegistry;

impl MailslotRegistry {
    pub fn new() -> Self {
        Self
    }
}

fn wide(address: &SlotAddress) -> Vec<u16> {
    address
        .as_str()
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect()
}

/// Classify the calling thread's last OS error.
///
/// `timeout` is the idle timeout for reads; `size` is the attempted payload
/// length for writes.
fn last_error(address: &SlotAddress, timeout: Option<Duration>, size: usize) -> SlotError {
    let err = io::Error::last_os_error();
    let code = err.raw_os_error().map(|code| code as u32);
    match code {
        Some(ERROR_INVALID_PARAMETER) => SlotError::InvalidParameter(format!("{address}: {err}")),
        Some(ERROR_FILE_NOT_FOUND) => SlotError::EndpointNotFound {
            address: address.clone(),
        },
        Some(ERROR_PATH_NOT_FOUND) | Some(ERROR_BAD_NETPATH) => SlotError::PathNotFound {
            address: address.clone(),
            reason: err.to_string(),
        },
        Some(ERROR_PIPE_BUSY) => SlotError::Busy {
            address: address.clone(),
        },
        Some(ERROR_SEM_TIMEOUT) | Some(ERROR_TIMEOUT) => match timeout {
            Some(timeout) => SlotError::Timeout(timeout),
            None => SlotError::Busy {
                address: address.clone(),
            },
        },
        Some(ERROR_INSUFFICIENT_BUFFER) => SlotError::MessageTooLarge { size, max: None },
        Some(ERROR_ALREADY_EXISTS) => SlotError::AlreadyBound {
            address: address.clone(),
        },
        _ => SlotError::broken(address, err),
    }
}

impl SlotRegistry for MailslotRegistry {
    type Endpoint = MailslotEndpoint;
    type Writer = MailslotWriter;

    fn bind(&self, address: &SlotAddress, config: EndpointConfig) -> Result<MailslotEndpoint> {
        check_bindable(address, &config)?;
        let name = wide(address);

        // SAFETY: `name` is a NUL-terminated UTF-16 buffer that outlives the call;
        // a null security descriptor selects the defaults.
        let handle = unsafe {
            CreateMailslotW(
                name.as_ptr(),
                config.max_message_size as u32,
                config.idle_timeout_millis(),
                ptr::null(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(last_error(address, None, 0));
        }

        info!(%address, max = config.max_message_size, "mailslot created");
        Ok(MailslotEndpoint {
            handle,
            address: address.clone(),
            config,
            buf: vec![0u8; config.max_message_size],
        })
    }

    fn open(&self, address: &SlotAddress) -> Result<MailslotWriter> {
        let name = wide(address);

        // SAFETY: `name` is a NUL-terminated UTF-16 buffer that outlives the call;
        // no security descriptor or template handle is passed.
        let handle = unsafe {
            CreateFileW(
                name.as_ptr(),
                GENERIC_WRITE,
                FILE_SHARE_READ,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(last_error(address, None, 0));
        }

        debug!(%address, "opened mailslot writer");
        Ok(MailslotWriter {
            handle,
            address: address.clone(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "mailslot"
    }
}

/// Server handle of a mailslot.
pub struct MailslotEndpoint {
    handle: HANDLE,
    address: SlotAddress,
    config: EndpointConfig,
    buf: Vec<u8>,
}

impl SlotEndpoint for MailslotEndpoint {
    fn address(&self) -> &SlotAddress {
        &self.address
    }

    fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn read(&mut self) -> Result<Message> {
        let mut read = 0u32;
        // SAFETY: `buf` is valid for `buf.len()` bytes and `handle` is the open
        // mailslot server handle owned by this endpoint.
        let ok = unsafe {
            ReadFile(
                self.handle,
                self.buf.as_mut_ptr(),
                self.buf.len() as u32,
                &mut read,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(last_error(&self.address, Some(self.config.idle_timeout), 0));
        }
        let read = read as usize;
        Ok(Message::new(Bytes::copy_from_slice(&self.buf[..read])))
    }
}

impl Drop for MailslotEndpoint {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by CreateMailslotW and is closed once.
        unsafe {
            CloseHandle(self.handle);
        }
        info!(address = %self.address, "mailslot closed");
    }
}

/// Client handle opened with `CreateFileW`.
pub struct MailslotWriter {
    handle: HANDLE,
    address: SlotAddress,
}

impl SlotWriter for MailslotWriter {
    fn address(&self) -> &SlotAddress {
        &self.address
    }

    fn write(&mut self, payload: &[u8]) -> Result<usize> {
        let len = u32::try_from(payload.len()).map_err(|_| SlotError::MessageTooLarge {
            size: payload.len(),
            max: Some(u32::MAX as usize),
        })?;
        let mut written = 0u32;
        // SAFETY: `payload` is valid for `len` bytes and `handle` is an open
        // mailslot client handle owned by this writer.
        let ok = unsafe {
            WriteFile(
                self.handle,
                payload.as_ptr(),
                len,
                &mut written,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(last_error(&self.address, None, payload.len()));
        }
        Ok(written as usize)
    }
}

impl Drop for MailslotWriter {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by CreateFileW and is closed once.
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
