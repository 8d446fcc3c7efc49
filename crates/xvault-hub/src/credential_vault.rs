//! Envelope encryption orchestration for source credentials and tenant
//! artifact keypairs. Plaintext touches process memory only inside these
//! methods and the callers that immediately consume the return value.

use xvault_core::crypto::{self, Kek, TenantKeypair};
use xvault_core::error::VaultError;
use xvault_core::model::credential::{Credential, CredentialKind};
use xvault_core::model::tenant::TenantKey;
use xvault_storage::repo::{CredentialStore, TenantStore};

/// KEK key id stamped on every credential/tenant-key row. A single
/// environment-provided KEK has no rotation history yet (see DESIGN.md);
/// this constant is where a future multi-version KEK would branch.
const KEK_KEY_ID: &str = "kek-v1";

#[derive(Clone)]
pub struct CredentialVault {
    credentials: CredentialStore,
    tenants: TenantStore,
    kek: Kek,
}

impl CredentialVault {
    #[must_use]
    pub fn new(credentials: CredentialStore, tenants: TenantStore, kek: Kek) -> Self {
        Self { credentials, tenants, kek }
    }

    /// Encrypt and store a source or storage credential.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] or [`VaultError::Store`].
    pub async fn store_credential(&self, tenant_id: &str, kind: CredentialKind, plaintext: &[u8]) -> Result<Credential, VaultError> {
        let ciphertext = crypto::encrypt_for_storage(&self.kek, plaintext)?;
        self.credentials.insert(tenant_id, kind, &ciphertext, KEK_KEY_ID).await
    }

    /// Fetch a credential's ciphertext for a worker to decrypt locally.
    /// Decryption never happens inside this method, the Hub hands the
    /// ciphertext to the worker over `/internal/credentials/:id`, and the
    /// worker calls [`xvault_core::crypto::decrypt_from_storage`] itself
    /// using the same KEK (provisioned to it out-of-band, same as the Hub).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CredentialNotFound`] or [`VaultError::Store`].
    pub async fn get_credential(&self, id: &str) -> Result<Credential, VaultError> {
        self.credentials.get(id).await
    }

    /// Generate a tenant's x25519 artifact-encryption keypair, seal the
    /// private key under the KEK, and persist it as the tenant's active key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] or [`VaultError::Store`].
    pub async fn create_tenant_keypair(&self, tenant_id: &str) -> Result<TenantKey, VaultError> {
        let keypair = TenantKeypair::generate();
        let private_key_string = keypair.private_key_string();
        let encrypted_private_key = crypto::encrypt_for_storage(&self.kek, private_key_string.as_bytes())?;

        self.tenants
            .insert_key(tenant_id, "x25519", &keypair.public_key, &encrypted_private_key)
            .await
            .map_err(|e| VaultError::Store(e.to_string()))
    }

    /// The tenant's active public key, served to workers for backup
    /// encryption. Never requires decrypting anything.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoActiveKey`] or [`VaultError::Store`].
    pub async fn active_public_key(&self, tenant_id: &str) -> Result<String, VaultError> {
        let key = self
            .tenants
            .active_key(tenant_id)
            .await
            .map_err(|_| VaultError::NoActiveKey { tenant_id: tenant_id.to_owned() })?;
        Ok(key.public_key)
    }

    /// Decrypt a tenant's private key for a restore operation. The
    /// plaintext keypair never leaves the Hub process.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoActiveKey`], [`VaultError::Crypto`], or
    /// [`VaultError::Store`].
    pub async fn decrypt_tenant_keypair(&self, tenant_id: &str) -> Result<TenantKeypair, VaultError> {
        let key = self
            .tenants
            .active_key(tenant_id)
            .await
            .map_err(|_| VaultError::NoActiveKey { tenant_id: tenant_id.to_owned() })?;

        let private_key_bytes = crypto::decrypt_from_storage(&self.kek, &key.encrypted_private_key)?;
        let private_key_string = String::from_utf8(private_key_bytes)
            .map_err(|e| VaultError::Crypto(xvault_core::error::CryptoError::Age { reason: e.to_string() }))?;

        TenantKeypair::from_private_key_string(&private_key_string).map_err(VaultError::Crypto)
    }
}
