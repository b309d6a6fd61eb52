//! Worker identity derivation.
//!
//! A worker that reports a hostname or hardware id always maps to the same
//! id, so reconnects merge into the existing record. Anonymous workers get
//! a fresh id per registration.

use sha2::{Digest, Sha256};

use fleet_state::{HostInfo, WorkerId};

/// The fields of [`HostInfo`] that identify a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHint {
    pub hostname: Option<String>,
    pub hardware_id: Option<String>,
}

impl IdentityHint {
    pub fn is_anonymous(&self) -> bool {
        self.hostname.as_deref().is_none_or(str::is_empty)
            && self.hardware_id.as_deref().is_none_or(str::is_empty)
    }
}

impl From<&HostInfo> for IdentityHint {
    fn from(info: &HostInfo) -> Self {
        Self {
            hostname: info.hostname.clone(),
            hardware_id: info.hardware_id.clone(),
        }
    }
}

/// Derive a worker id.
///
/// `worker-<16 hex>` from SHA-256 of hostname and hardware id, or
/// `anon-<16 hex>` from the source address and a session discriminator
/// when the hint carries neither.
pub fn derive_worker_id(hint: &IdentityHint, source_address: Option<&str>, session: u128) -> WorkerId {
    let mut hasher = Sha256::new();
    if hint.is_anonymous() {
        hasher.update(source_address.unwrap_or("unknown").as_bytes());
        hasher.update([0u8]);
        hasher.update(session.to_be_bytes());
        format!("anon-{}", short_hex(hasher))
    } else {
        hasher.update(hint.hostname.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(hint.hardware_id.as_deref().unwrap_or_default().as_bytes());
        format!("worker-{}", short_hex(hasher))
    }
}

fn short_hex(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
