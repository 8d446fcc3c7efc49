//! Credential domain types.
//!
//! Plaintext is never stored. A [`Credential`] row holds only ciphertext
//! produced by [`crate::crypto::encrypt_for_storage`] and the KEK key id
//! used to produce it. Plaintext is decoded into process memory only at
//! the point of use (inside the Worker for source pulls, inside the Hub
//! for restore decryption).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a credential authenticates to a backup source or to a storage
/// backend. Only `Source` is exercised by the orchestration core (`local_fs`
/// storage needs no credential).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Source,
    Storage,
}

/// An envelope-encrypted secret, scoped to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub tenant_id: String,
    pub kind: CredentialKind,
    /// AES-256-GCM ciphertext of the plaintext secret, under the KEK.
    pub ciphertext: Vec<u8>,
    /// Identifier of the KEK version used to encrypt this row (for future
    /// KEK rotation; see the open question in spec.md §9).
    pub key_id: String,
    pub created_at: DateTime<Utc>,
}
