//! Cryptographic primitives for xVault.
//!
//! Two independent schemes are used, matching the two things xVault
//! encrypts:
//!
//! - **KEK envelope** (AES-256-GCM): wraps source-credential ciphertext and
//!   tenant private-key ciphertext at rest. The key-encryption-key is
//!   provided out-of-band via `HUB_ENCRYPTION_KEK` and never persisted.
//! - **Tenant recipient encryption** (age/x25519): encrypts finished backup
//!   artifacts to a tenant's public key so only that tenant's private key
//!   (held encrypted-at-rest under the KEK, decrypted only inside the Hub)
//!   can restore them.
//!
//! # Security model
//!
//! - Every KEK encryption generates a fresh 96-bit nonce via the OS CSPRNG.
//! - Ciphertext format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! - All key types derive `Zeroize` + `ZeroizeOnDrop`.

use std::fmt;
use std::io::{Read, Write};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Minimum ciphertext length: 12-byte nonce + 16-byte AES-GCM tag.
const MIN_CIPHERTEXT_LEN: usize = 12 + 16;

/// Nonce length for AES-256-GCM (96 bits).
const NONCE_LEN: usize = 12;

/// A 256-bit key-encryption-key, zeroized on drop. Never logged or persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Kek([u8; 32]);

impl Kek {
    /// Decode a KEK from a base64-encoded 32-byte value (the
    /// `HUB_ENCRYPTION_KEK` environment variable format).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if the input is not valid
    /// base64 or does not decode to exactly 32 bytes.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s.trim())
            .map_err(|e| CryptoError::KeyDerivation {
                context: "kek".to_owned(),
                reason: format!("invalid base64: {e}"),
            })?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| CryptoError::KeyDerivation {
            context: "kek".to_owned(),
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(arr))
    }

    /// Generate a fresh random KEK (used by tests and `xvault-hub init` tooling).
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Kek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kek").field("bytes", &"[REDACTED]").finish()
    }
}

/// Encrypt plaintext under the KEK using AES-256-GCM with a fresh random nonce.
///
/// Returns `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn encrypt_for_storage(kek: &Kek, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(kek.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption { reason: e.to_string() })?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt ciphertext produced by [`encrypt_for_storage`].
///
/// # Errors
///
/// Returns [`CryptoError::CiphertextTooShort`] if the input is shorter than
/// 28 bytes, or [`CryptoError::Decryption`] if authentication fails.
pub fn decrypt_from_storage(kek: &Kek, combined: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if combined.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextTooShort {
            expected: MIN_CIPHERTEXT_LEN,
            actual: combined.len(),
        });
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(kek.as_bytes()));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Decryption { reason: e.to_string() })
}

/// A tenant's x25519 keypair, used to encrypt/decrypt backup artifacts.
pub struct TenantKeypair {
    pub public_key: String,
    identity: age::x25519::Identity,
}

impl TenantKeypair {
    /// Generate a new x25519 keypair for a tenant.
    #[must_use]
    pub fn generate() -> Self {
        let identity = age::x25519::Identity::generate();
        let public_key = identity.to_public().to_string();
        Self { public_key, identity }
    }

    /// Re-create a keypair from a decrypted private-key string (the
    /// bech32 `AGE-SECRET-KEY-...` form produced by [`private_key_string`]).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Age`] if the string is not a valid identity.
    pub fn from_private_key_string(s: &str) -> Result<Self, CryptoError> {
        let identity: age::x25519::Identity = s
            .trim()
            .parse()
            .map_err(|e: &str| CryptoError::Age { reason: e.to_owned() })?;
        let public_key = identity.to_public().to_string();
        Ok(Self { public_key, identity })
    }

    /// The bech32 private-key string (`AGE-SECRET-KEY-...`). Only ever
    /// persisted encrypted under the KEK; never transmitted to a worker.
    #[must_use]
    pub fn private_key_string(&self) -> String {
        self.identity.to_string()
    }

    fn recipient(&self) -> age::x25519::Recipient {
        self.identity.to_public()
    }
}

/// Encrypt a byte stream to a tenant's public key using age/x25519.
///
/// Used by the Worker's Packager stage to produce `backup.tar.zst.enc` from
/// the tenant's public key string (the Hub serves public keys to workers;
/// private keys never leave the Hub).
///
/// # Errors
///
/// Returns [`CryptoError::Age`] if the recipient string is invalid or the
/// encryption stream fails.
pub fn age_encrypt_to_recipient(
    recipient_str: &str,
    plaintext: &mut impl Read,
    sink: &mut impl Write,
) -> Result<(), CryptoError> {
    let recipient: age::x25519::Recipient = recipient_str
        .parse()
        .map_err(|e: &str| CryptoError::Age { reason: e.to_owned() })?;

    let encryptor = age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
        .map_err(|e| CryptoError::Age { reason: e.to_string() })?;

    let mut writer = encryptor
        .wrap_output(sink)
        .map_err(|e| CryptoError::Age { reason: e.to_string() })?;

    std::io::copy(plaintext, &mut writer).map_err(|e| CryptoError::Age { reason: e.to_string() })?;

    writer.finish().map_err(|e| CryptoError::Age { reason: e.to_string() })?;
    Ok(())
}

/// Decrypt an artifact produced by [`age_encrypt_to_recipient`] using the
/// tenant's private key. Only ever called inside the Hub on restore.
///
/// # Errors
///
/// Returns [`CryptoError::Age`] if decryption fails (wrong key or corrupted
/// artifact).
pub fn age_decrypt_with_keypair(
    keypair: &TenantKeypair,
    ciphertext: &mut impl Read,
    sink: &mut impl Write,
) -> Result<(), CryptoError> {
    let decryptor = age::Decryptor::new(ciphertext)
        .map_err(|e| CryptoError::Age { reason: e.to_string() })?;

    let mut reader = decryptor
        .decrypt(std::iter::once(&keypair.identity as &dyn age::Identity))
        .map_err(|e| CryptoError::Age { reason: e.to_string() })?;

    std::io::copy(&mut reader, sink).map_err(|e| CryptoError::Age { reason: e.to_string() })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kek_roundtrip() {
        let kek = Kek::generate();
        let plaintext = b"hunter2";
        let ciphertext = encrypt_for_storage(&kek, plaintext).unwrap();
        let decrypted = decrypt_from_storage(&kek, &ciphertext).unwrap();
        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn kek_wrong_key_fails() {
        let k1 = Kek::generate();
        let k2 = Kek::generate();
        let ciphertext = encrypt_for_storage(&k1, b"secret").unwrap();
        assert!(decrypt_from_storage(&k2, &ciphertext).is_err());
    }

    #[test]
    fn kek_too_short_fails() {
        let kek = Kek::generate();
        assert!(matches!(
            decrypt_from_storage(&kek, &[0u8; 10]),
            Err(CryptoError::CiphertextTooShort { expected: 28, actual: 10 })
        ));
    }

    #[test]
    fn kek_base64_roundtrip() {
        use base64::Engine as _;
        let raw = [7u8; 32];
        let s = base64::engine::general_purpose::STANDARD.encode(raw);
        let kek = Kek::from_base64(&s).unwrap();
        assert_eq!(kek.as_bytes(), &raw);
    }

    #[test]
    fn age_encrypt_decrypt_roundtrip() {
        let keypair = TenantKeypair::generate();
        let plaintext = b"tar+zstd archive bytes";
        let mut ciphertext = Vec::new();
        age_encrypt_to_recipient(&keypair.public_key, &mut &plaintext[..], &mut ciphertext).unwrap();

        let mut decrypted = Vec::new();
        age_decrypt_with_keypair(&keypair, &mut ciphertext.as_slice(), &mut decrypted).unwrap();
        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn age_private_key_string_roundtrips() {
        let keypair = TenantKeypair::generate();
        let private = keypair.private_key_string();
        let restored = TenantKeypair::from_private_key_string(&private).unwrap();
        assert_eq!(keypair.public_key, restored.public_key);
    }

    #[test]
    fn age_wrong_keypair_fails() {
        let kp1 = TenantKeypair::generate();
        let kp2 = TenantKeypair::generate();
        let mut ciphertext = Vec::new();
        age_encrypt_to_recipient(&kp1.public_key, &mut &b"data"[..], &mut ciphertext).unwrap();
        let mut out = Vec::new();
        assert!(age_decrypt_with_keypair(&kp2, &mut ciphertext.as_slice(), &mut out).is_err());
    }
}
