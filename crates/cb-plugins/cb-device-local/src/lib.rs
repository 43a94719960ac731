//! # cb-device-local
//!
//! `DeviceProbe` for a terminal client. The browser signals map onto what a
//! host can report about itself: locale, OS, timezone, and a machine
//! signature standing in for the canvas rendering hash. A terminal has no
//! display size, so the resolution is a constant unless pinned.
//! Per-shell state (terminal size, exported `HOSTNAME`) never feeds the
//! fingerprint. Any signal can be pinned through `DeviceOverrides`.

use cb_core::{DeviceFingerprint, DeviceProbe};
use sha2::{Digest, Sha256};
use tracing::debug;

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];
const HOSTNAME_PATH: &str = "/etc/hostname";
const UNKNOWN_RESOLUTION: &str = "unknown";

/// Explicit values that win over anything detected.
#[derive(Debug, Clone, Default)]
pub struct DeviceOverrides {
    pub user_agent: Option<String>,
    pub language: Option<String>,
    pub platform: Option<String>,
    pub screen_resolution: Option<String>,
    pub timezone: Option<String>,
    pub canvas: Option<String>,
}

/// Host identity read from system files rather than the shell.
#[derive(Debug, Clone, Default)]
pub struct HostSignals {
    pub machine_id: Option<String>,
    pub hostname: Option<String>,
}

impl HostSignals {
    pub fn read() -> Self {
        Self {
            machine_id: MACHINE_ID_PATHS.iter().find_map(|path| read_trimmed(path)),
            hostname: read_trimmed(HOSTNAME_PATH),
        }
    }
}

fn read_trimmed(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub struct LocalDeviceProbe {
    fingerprint: DeviceFingerprint,
}

impl LocalDeviceProbe {
    /// Reads the locale variables and the host files once.
    pub fn detect(overrides: DeviceOverrides) -> Self {
        Self::from_signals(overrides, |key| std::env::var(key).ok(), HostSignals::read())
    }

    pub fn from_signals(
        overrides: DeviceOverrides,
        env: impl Fn(&str) -> Option<String>,
        host: HostSignals,
    ) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let language = env("LC_ALL")
            .or_else(|| env("LANG"))
            .map(|raw| normalize_locale(&raw))
            .unwrap_or_else(|| "en-US".to_string());
        let signature_source = format!(
            "{}|{}",
            host.machine_id.unwrap_or_default(),
            host.hostname.unwrap_or_default()
        );

        let fingerprint = DeviceFingerprint {
            user_agent: overrides.user_agent.unwrap_or_else(|| {
                format!(
                    "confession-board/{} ({}; {})",
                    env!("CARGO_PKG_VERSION"),
                    std::env::consts::OS,
                    std::env::consts::ARCH
                )
            }),
            language: overrides.language.unwrap_or(language),
            platform: overrides.platform.unwrap_or_else(|| std::env::consts::OS.to_string()),
            screen_resolution: overrides
                .screen_resolution
                .unwrap_or_else(|| UNKNOWN_RESOLUTION.to_string()),
            timezone: overrides
                .timezone
                .or_else(|| env("TZ"))
                .unwrap_or_else(|| "UTC".to_string()),
            canvas: overrides.canvas.unwrap_or_else(|| signature(&signature_source)),
        };
        debug!(platform = %fingerprint.platform, language = %fingerprint.language, "device signals collected");
        Self { fingerprint }
    }
}

impl DeviceProbe for LocalDeviceProbe {
    fn fingerprint(&self) -> DeviceFingerprint {
        self.fingerprint.clone()
    }
}

/// "en_US.UTF-8" -> "en-US"
fn normalize_locale(raw: &str) -> String {
    let tag = raw.split(['.', '@']).next().unwrap_or(raw);
    tag.replace('_', "-")
}

fn signature(source: &str) -> String {
    let hash = hex::encode(Sha256::digest(source.as_bytes()));
    hash[..32].to_string()
}
