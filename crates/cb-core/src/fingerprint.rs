//! # Device fingerprint
//!
//! A best-effort device stability key. Two devices can collide; this is not
//! a security identifier.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::AnonymousId;

/// Characters of the raw composite kept alongside a new identity.
pub const DIAGNOSTIC_FINGERPRINT_LEN: usize = 500;

/// Signals gathered from the running device. Field order is part of the
/// composite encoding and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    pub screen_resolution: String,
    pub timezone: String,
    /// Digest of a deterministic rendering probe on this device
    pub canvas: String,
}

impl DeviceFingerprint {
    /// Base64 of the JSON-encoded signals.
    pub fn composite(&self) -> String {
        // Serializing a struct of plain strings cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(json)
    }

    /// Lowercase hex SHA-256 of the composite.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.composite().as_bytes()))
    }

    pub fn diagnostic(&self) -> String {
        self.composite()
            .chars()
            .take(DIAGNOSTIC_FINGERPRINT_LEN)
            .collect()
    }
}

/// 32-bit wrapping `h = h * 31 + c` over the characters of `input`.
fn string_hash(input: &str) -> i32 {
    input.chars().fold(0i32, |acc, ch| {
        acc.wrapping_shl(5)
            .wrapping_sub(acc)
            .wrapping_add(ch as i32)
    })
}

/// Identifier used when the store cannot hand out a fresh one.
/// Same hash in, same id out, with no I/O.
pub fn fallback_id(fingerprint_hash: &str) -> AnonymousId {
    let span = AnonymousId::MAX - AnonymousId::MIN + 1;
    AnonymousId::saturating(string_hash(fingerprint_hash).unsigned_abs() % span + AnonymousId::MIN)
}
