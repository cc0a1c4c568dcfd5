use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::address::SlotAddress;
use crate::config::{check_bindable, EndpointConfig};
use crate::error::{Result, SlotError};
use crate::traits::{Message, SlotEndpoint, SlotRegistry, SlotWriter};

/// Configuration of the unix datagram backend.
#[derive(Debug, Clone)]
pub struct UdsRegistryConfig {
    /// Directory holding slot sockets and their manifests.
    pub runtime_dir: PathBuf,
    /// Permission mode applied to created sockets.
    pub socket_mode: u32,
    /// How long a write may block on a full receive queue before `Busy`.
    pub write_timeout: Duration,
}

impl Default for UdsRegistryConfig {
    fn default() -> Self {
        Self {
            runtime_dir: default_runtime_dir(),
            socket_mode: UdsRegistry::DEFAULT_SOCKET_MODE,
            write_timeout: UdsRegistry::DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// `$XDG_RUNTIME_DIR/slotbox`, falling back to `/tmp/slotbox-<uid>`.
pub fn default_runtime_dir() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("slotbox"),
        _ => {
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            std::env::temp_dir().join(format!("slotbox-{uid}"))
        }
    }
}

/// Written next to each bound socket so writers can enforce the size limit.
#[derive(Debug, Serialize, Deserialize)]
struct SlotManifest {
    address: String,
    max_message_size: usize,
    pid: u32,
}

/// Unix datagram socket slot registry.
///
/// Each local slot is a `SOCK_DGRAM` socket in the runtime directory, so
/// message boundaries and atomicity come from the kernel. Remote scopes are
/// not reachable through this backend.
#[derive(Debug, Clone, Default)]
pub struct UdsRegistry {
    config: UdsRegistryConfig,
}

impl UdsRegistry {
    /// Default permission mode for created slot sockets.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Default bound on a blocked write.
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    pub fn new(config: UdsRegistryConfig) -> Self {
        Self { config }
    }

    /// Registry rooted at `runtime_dir` with default settings.
    pub fn with_runtime_dir(runtime_dir: impl Into<PathBuf>) -> Self {
        Self::new(UdsRegistryConfig {
            runtime_dir: runtime_dir.into(),
            ..UdsRegistryConfig::default()
        })
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.config.runtime_dir
    }

    /// Socket path for a local address.
    ///
    /// `%`, `\`, `/` and `.` are percent-escaped, so distinct box names never
    /// share a file and the `.slot` suffix stays unambiguous.
    pub fn socket_path(&self, address: &SlotAddress) -> PathBuf {
        let box_name = address.box_name();
        let mut name = String::with_capacity(box_name.len());
        for c in box_name.chars() {
            match c {
                '%' | '\\' | '/' | '.' => name.push_str(&format!("%{:02X}", c as u32)),
                other => name.push(other),
            }
        }
        self.config.runtime_dir.join(format!("{name}.slot"))
    }

    fn manifest_path(socket_path: &Path) -> PathBuf {
        socket_path.with_extension("slot.json")
    }

    fn ensure_runtime_dir(&self, address: &SlotAddress) -> Result<()> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.config.runtime_dir)
            .map_err(|err| SlotError::BrokenChannel {
                address: address.clone(),
                reason: format!(
                    "runtime directory {}: {err}",
                    self.config.runtime_dir.display()
                ),
            })
    }

    /// Remove a stale socket left by a dead receiver, or report the name taken.
    fn clear_stale(&self, address: &SlotAddress, path: &Path) -> Result<()> {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(SlotError::broken(address, err)),
        };
        if !metadata.file_type().is_socket() {
            debug!(?path, "slot path is occupied by a non-socket file");
            return Err(SlotError::AlreadyBound {
                address: address.clone(),
            });
        }

        let check = UnixDatagram::unbound().map_err(|err| SlotError::broken(address, err))?;
        if check.connect(path).is_ok() {
            return Err(SlotError::AlreadyBound {
                address: address.clone(),
            });
        }

        debug!(?path, "removing stale slot socket");
        std::fs::remove_file(path).map_err(|err| SlotError::broken(address, err))?;
        let _ = std::fs::remove_file(Self::manifest_path(path));
        Ok(())
    }

    fn write_manifest(&self, path: &Path, manifest: &SlotManifest) -> std::io::Result<()> {
        let json = serde_json::to_vec(manifest).map_err(std::io::Error::other)?;
        let final_path = Self::manifest_path(path);
        let tmp_path = final_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &final_path)
    }

    fn read_manifest(address: &SlotAddress, path: &Path) -> Result<SlotManifest> {
        let raw = match std::fs::read(Self::manifest_path(path)) {
            Ok(raw) => raw,
            // The receiver is between bind and manifest publication.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SlotError::Busy {
                    address: address.clone(),
                })
            }
            Err(err) => return Err(SlotError::broken(address, err)),
        };
        serde_json::from_slice(&raw)
            .map_err(|err| SlotError::broken(address, format!("corrupt slot manifest: {err}")))
    }
}

impl SlotRegistry for UdsRegistry {
    type Endpoint = UdsEndpoint;
    type Writer = UdsWriter;

    fn bind(&self, address: &SlotAddress, config: EndpointConfig) -> Result<UdsEndpoint> {
        check_bindable(address, &config)?;

        let path = self.socket_path(address);
        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(SlotError::InvalidParameter(format!(
                "socket path too long ({path_bytes} bytes, max {}): {}",
                Self::MAX_PATH_LEN,
                path.display()
            )));
        }

        self.ensure_runtime_dir(address)?;
        self.clear_stale(address, &path)?;

        let socket = UnixDatagram::bind(&path).map_err(|err| match err.kind() {
            ErrorKind::AddrInUse => SlotError::AlreadyBound {
                address: address.clone(),
            },
            _ => SlotError::broken(address, err),
        })?;

        // From here on the endpoint owns the path and cleans it up on drop.
        let created =
            std::fs::symlink_metadata(&path).map_err(|err| SlotError::broken(address, err))?;
        let endpoint = UdsEndpoint {
            socket,
            address: address.clone(),
            config,
            path,
            created_inode: Some((created.dev(), created.ino())),
            buf: vec![0u8; config.max_message_size + 1],
        };

        std::fs::set_permissions(
            &endpoint.path,
            std::fs::Permissions::from_mode(self.config.socket_mode),
        )
        .map_err(|err| SlotError::broken(address, err))?;
        endpoint
            .socket
            .set_read_timeout(Some(config.idle_timeout))
            .map_err(|err| SlotError::broken(address, err))?;

        let manifest = SlotManifest {
            address: address.to_string(),
            max_message_size: config.max_message_size,
            pid: std::process::id(),
        };
        self.write_manifest(&endpoint.path, &manifest)
            .map_err(|err| SlotError::broken(address, err))?;

        info!(%address, path = ?endpoint.path, max = config.max_message_size, "slot bound");
        Ok(endpoint)
    }

    fn open(&self, address: &SlotAddress) -> Result<UdsWriter> {
        if !address.is_local() {
            return Err(SlotError::PathNotFound {
                address: address.clone(),
                reason: format!(
                    "host {} is not reachable through unix datagram slots",
                    address.host()
                ),
            });
        }

        let path = self.socket_path(address);
        let socket = UnixDatagram::unbound().map_err(|err| SlotError::broken(address, err))?;
        socket.connect(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => SlotError::EndpointNotFound {
                address: address.clone(),
            },
            ErrorKind::WouldBlock => SlotError::Busy {
                address: address.clone(),
            },
            _ => SlotError::broken(address, err),
        })?;
        let manifest = Self::read_manifest(address, &path)?;
        socket
            .set_write_timeout(Some(self.config.write_timeout))
            .map_err(|err| SlotError::broken(address, err))?;

        debug!(%address, ?path, "opened slot writer");
        Ok(UdsWriter {
            socket,
            address: address.clone(),
            max_message_size: manifest.max_message_size,
        })
    }

    fn backend_name(&self) -> &'static str {
        "unix-datagram"
    }
}

/// Receiving endpoint backed by a bound unix datagram socket.
pub struct UdsEndpoint {
    socket: UnixDatagram,
    address: SlotAddress,
    config: EndpointConfig,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    buf: Vec<u8>,
}

impl UdsEndpoint {
    /// The socket path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SlotEndpoint for UdsEndpoint {
    fn address(&self) -> &SlotAddress {
        &self.address
    }

    fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn read(&mut self) -> Result<Message> {
        loop {
            match self.socket.recv(&mut self.buf) {
                // One spare byte in the buffer exposes datagrams from writers
                // that ignored the manifest.
                Ok(n) if n > self.config.max_message_size => {
                    warn!(address = %self.address, size = n, "discarding oversized datagram");
                    continue;
                }
                Ok(n) => return Ok(Message::new(Bytes::copy_from_slice(&self.buf[..n]))),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(SlotError::Timeout(self.config.idle_timeout))
                }
                Err(err) => return Err(SlotError::broken(&self.address, err)),
            }
        }
    }
}

impl Drop for UdsEndpoint {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up slot socket");
                    let _ = std::fs::remove_file(&self.path);
                    let _ = std::fs::remove_file(UdsRegistry::manifest_path(&self.path));
                } else {
                    debug!(
                        path = ?self.path,
                        "slot path identity changed; skipping cleanup"
                    );
                }
            }
        }
        info!(address = %self.address, "slot released");
    }
}

/// Writer connected to a bound unix datagram slot.
pub struct UdsWriter {
    socket: UnixDatagram,
    address: SlotAddress,
    max_message_size: usize,
}

impl SlotWriter for UdsWriter {
    fn address(&self) -> &SlotAddress {
        &self.address
    }

    fn write(&mut self, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.max_message_size {
            return Err(SlotError::MessageTooLarge {
                size: payload.len(),
                max: Some(self.max_message_size),
            });
        }

        loop {
            match self.socket.send(payload) {
                Ok(n) if n == payload.len() => return Ok(n),
                Ok(n) => {
                    return Err(SlotError::broken(
                        &self.address,
                        format!("short datagram write ({n} of {} bytes)", payload.len()),
                    ))
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(SlotError::Busy {
                        address: self.address.clone(),
                    })
                }
                Err(err) if err.raw_os_error() == Some(libc::EMSGSIZE) => {
                    return Err(SlotError::MessageTooLarge {
                        size: payload.len(),
                        max: Some(self.max_message_size),
                    })
                }
                Err(err) => return Err(SlotError::broken(&self.address, err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::error::SlotErrorKind;

    fn temp_registry(tag: &str) -> UdsRegistry {
        let dir = std::env::temp_dir().join(format!(
            "slotbox-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        UdsRegistry::with_runtime_dir(dir)
    }

    fn quick() -> EndpointConfig {
        EndpointConfig::default().with_idle_timeout(Duration::from_millis(50))
    }

    fn local() -> SlotAddress {
        SlotAddress::local("Box")
    }

    #[test]
    fn test_bind_open_write_read() {
        let registry = temp_registry("roundtrip");
        let mut endpoint = registry.bind(&local(), quick()).unwrap();
        assert!(endpoint.path().exists());

        let address = local();
        let sender = registry.clone();
        let handle = thread::spawn(move || {
            let mut writer = sender.open(&address).unwrap();
            writer.write(b"Hello from slotbox client").unwrap()
        });
        assert_eq!(handle.join().unwrap(), 25);

        let message = endpoint.read().unwrap();
        assert_eq!(message.as_bytes(), b"Hello from slotbox client");

        let path = endpoint.path().to_path_buf();
        drop(endpoint);
        assert!(!path.exists(), "socket file should be cleaned up on drop");
        assert!(!UdsRegistry::manifest_path(&path).exists());
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_zero_length_message() {
        let registry = temp_registry("empty");
        let mut endpoint = registry.bind(&local(), quick()).unwrap();
        registry.open(&local()).unwrap().write(b"").unwrap();

        let message = endpoint.read().unwrap();
        assert!(message.is_empty());
        assert!(endpoint.read().unwrap_err().is_timeout());

        drop(endpoint);
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_open_without_receiver() {
        let registry = temp_registry("missing");
        let err = registry.open(&local()).err().unwrap();
        assert_eq!(err.kind(), SlotErrorKind::EndpointNotFound);
    }

    #[test]
    fn test_remote_is_path_not_found() {
        let registry = temp_registry("remote");
        let err = registry
            .open(&SlotAddress::remote("SERVER1", "Box"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), SlotErrorKind::PathNotFound);
    }

    #[test]
    fn test_already_bound_while_alive() {
        let registry = temp_registry("dup");
        let endpoint = registry.bind(&local(), quick()).unwrap();
        let err = registry.bind(&local(), quick()).err().unwrap();
        assert_eq!(err.kind(), SlotErrorKind::AlreadyBound);

        drop(endpoint);
        assert!(registry.bind(&local(), quick()).is_ok());
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let registry = temp_registry("stale");
        registry.ensure_runtime_dir(&local()).unwrap();
        let path = registry.socket_path(&local());
        // A bound socket whose owner is gone without cleanup.
        drop(UnixDatagram::bind(&path).unwrap());
        assert!(path.exists());

        let endpoint = registry.bind(&local(), quick());
        assert!(endpoint.is_ok(), "stale socket should be replaced");

        drop(endpoint);
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_non_socket_file_is_not_removed() {
        let registry = temp_registry("file");
        registry.ensure_runtime_dir(&local()).unwrap();
        let path = registry.socket_path(&local());
        std::fs::write(&path, b"regular-file").unwrap();

        let err = registry.bind(&local(), quick()).err().unwrap();
        assert_eq!(err.kind(), SlotErrorKind::AlreadyBound);
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_oversized_write_rejected_whole() {
        let registry = temp_registry("big");
        let mut endpoint = registry.bind(&local(), quick()).unwrap();
        let mut writer = registry.open(&local()).unwrap();

        let err = writer.write(&[b'x'; 301]).unwrap_err();
        assert_eq!(err.kind(), SlotErrorKind::MessageTooLarge);
        assert!(
            endpoint.read().unwrap_err().is_timeout(),
            "nothing should be delivered"
        );

        drop(writer);
        drop(endpoint);
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_write_after_receiver_gone_is_broken() {
        let registry = temp_registry("gone");
        let endpoint = registry.bind(&local(), quick()).unwrap();
        let mut writer = registry.open(&local()).unwrap();
        drop(endpoint);

        let err = writer.write(b"late").unwrap_err();
        assert_eq!(err.kind(), SlotErrorKind::BrokenChannel);
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_socket_permissions_hardened() {
        let registry = temp_registry("perms");
        let endpoint = registry.bind(&local(), quick()).unwrap();
        let mode = std::fs::metadata(endpoint.path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);

        drop(endpoint);
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_similar_box_names_stay_separate() {
        let registry = temp_registry("names");
        let nested = SlotAddress::local(r"a\b");
        let dotted = SlotAddress::local("a.b");
        let slashed = SlotAddress::local("a/b");
        let underscored = SlotAddress::local("a_b");

        let paths: Vec<PathBuf> = [&nested, &dotted, &slashed, &underscored]
            .iter()
            .map(|address| registry.socket_path(address))
            .collect();
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                assert_ne!(a, b);
            }
        }

        let mut nested_endpoint = registry.bind(&nested, quick()).unwrap();
        let err = registry.open(&dotted).err().unwrap();
        assert_eq!(err.kind(), SlotErrorKind::EndpointNotFound);

        let mut dotted_endpoint = registry.bind(&dotted, quick()).unwrap();
        registry.open(&dotted).unwrap().write(b"for a.b").unwrap();
        assert_eq!(dotted_endpoint.read().unwrap().as_bytes(), b"for a.b");
        assert!(nested_endpoint.read().unwrap_err().is_timeout());

        drop(nested_endpoint);
        drop(dotted_endpoint);
        let _ = std::fs::remove_dir_all(registry.runtime_dir());
    }

    #[test]
    fn test_unusable_runtime_dir_is_not_a_parameter_error() {
        let base = temp_registry("notdir");
        std::fs::create_dir_all(base.runtime_dir()).unwrap();
        let file = base.runtime_dir().join("plain-file");
        std::fs::write(&file, b"x").unwrap();

        let registry = UdsRegistry::with_runtime_dir(file.join("sub"));
        let err = registry.bind(&local(), quick()).err().unwrap();
        assert_eq!(err.kind(), SlotErrorKind::BrokenChannel);

        let _ = std::fs::remove_dir_all(base.runtime_dir());
    }

    #[test]
    fn test_path_too_long() {
        let registry = UdsRegistry::with_runtime_dir(format!("/tmp/{}", "a".repeat(200)));
        let err = registry.bind(&local(), quick()).err().unwrap();
        assert_eq!(err.kind(), SlotErrorKind::InvalidParameter);
    }
}
