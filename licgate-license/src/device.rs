//! Device fingerprinting for license binding.
//!
//! Derives a stable identifier for the current machine from OS, architecture,
//! hostname, the platform machine ID and the OS user. The value is recomputed
//! on every call and never cached, so a copied installation is detected on the
//! next check.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;

/// Placeholder used when an attribute cannot be read.
const UNREADABLE: &str = "unreadable";

/// Information about the current device, included in activation mails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Hostname.
    pub hostname: String,
    /// CPU architecture.
    pub arch: String,
}

impl DeviceInfo {
    /// Collects information about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            os_version: get_os_version(),
            hostname: get_hostname().unwrap_or_else(|| UNREADABLE.to_string()),
            arch: env::consts::ARCH.to_string(),
        }
    }
}

/// An opaque identifier for one machine.
///
/// Equality compares the ID only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint {
    id: String,
    #[serde(skip)]
    degraded: bool,
}

impl DeviceFingerprint {
    /// Generates a fingerprint for the current device.
    ///
    /// Unreadable attributes are replaced with a fixed placeholder, so a
    /// degraded fingerprint is still the same value on every call.
    #[must_use]
    pub fn generate() -> Self {
        let ids = collect_hardware_ids();
        let degraded = ids.iter().any(|c| c == UNREADABLE);
        Self {
            id: hash_components(&ids),
            degraded,
        }
    }

    /// Wraps an existing fingerprint ID, e.g. one read from an activation
    /// request or a license token.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            degraded: false,
        }
    }

    /// Returns the fingerprint ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when one or more machine attributes could not be read.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

impl PartialEq for DeviceFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceFingerprint {}

impl PartialEq<str> for DeviceFingerprint {
    fn eq(&self, other: &str) -> bool {
        self.id == other
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Anything that can tell which machine we are running on.
pub trait FingerprintSource: Send + Sync {
    /// Returns the fingerprint of the current machine.
    fn fingerprint(&self) -> DeviceFingerprint;
}

/// Fingerprints the real host on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFingerprint;

impl FingerprintSource for HostFingerprint {
    fn fingerprint(&self) -> DeviceFingerprint {
        let fp = DeviceFingerprint::generate();
        if fp.is_degraded() {
            tracing::debug!(fingerprint = %fp, "device fingerprint is degraded");
        }
        fp
    }
}

/// Always reports the same fingerprint.
#[derive(Debug, Clone)]
pub struct StaticFingerprint(pub DeviceFingerprint);

impl StaticFingerprint {
    /// Creates a source reporting `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(DeviceFingerprint::from_id(id))
    }
}

impl FingerprintSource for StaticFingerprint {
    fn fingerprint(&self) -> DeviceFingerprint {
        self.0.clone()
    }
}

fn hash_components(components: &[String]) -> String {
    let combined = components.join("|");

    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    let hash = hasher.finalize();

    BASE64.encode(&hash[..16])
}

/// Collects hardware identifiers for fingerprinting, in a fixed order.
fn collect_hardware_ids() -> Vec<String> {
    let user = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| UNREADABLE.to_string());

    vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        get_hostname().unwrap_or_else(|| UNREADABLE.to_string()),
        get_machine_id().unwrap_or_else(|| UNREADABLE.to_string()),
        user,
    ]
}

fn get_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
}

fn get_os_version() -> String {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "ver"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("VERSION_ID="))
                    .map(|l| {
                        l.trim_start_matches("VERSION_ID=")
                            .trim_matches('"')
                            .to_string()
                    })
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        "unknown".to_string()
    }
}

/// Platform machine identifier, stable across reboots.
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("MachineGuid"))
                    .and_then(|l| l.split_whitespace().last())
                    .map(String::from)
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
