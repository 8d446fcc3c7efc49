//! Tenant and tenant-key domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant, the top-level billing/isolation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a [`TenantKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Rotated,
    Disabled,
}

/// The tenant's x25519 artifact-encryption keypair. Exactly one row per
/// tenant has `key_status = Active`; the public key is served to workers,
/// the encrypted private key is decrypted only inside the Hub on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantKey {
    pub id: String,
    pub tenant_id: String,
    pub algorithm: String,
    pub public_key: String,
    /// AES-256-GCM ciphertext of the bech32 private key string, under the KEK.
    pub encrypted_private_key: Vec<u8>,
    pub key_status: KeyStatus,
    pub created_at: DateTime<Utc>,
}
