//! Master key handling and per-secret AES-256-GCM encryption

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SecretError};

const KEY_SIZE: usize = 32; // 256 bits for AES-256
const NONCE_SIZE: usize = 12; // 96 bits for AES-GCM

/// Environment variable holding the hex-encoded master key
pub const MASTER_KEY_ENV: &str = "BMCSWEEP_MASTER_KEY";

/// Master encryption key (never persisted to disk)
///
/// Every secret is encrypted under a key derived from this one and the secret
/// ID, so losing it makes the whole store unrecoverable.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Parse a hex-encoded 32-byte key
    ///
    /// # Errors
    /// Returns `SecretError::InvalidMasterKey` if the input is not 64 hex characters.
    pub fn from_hex(input: &str) -> Result<Self> {
        let mut bytes = hex::decode(input.trim())
            .map_err(|e| SecretError::InvalidMasterKey(e.to_string()))?;

        if bytes.len() != KEY_SIZE {
            let len = bytes.len();
            bytes.zeroize();
            return Err(SecretError::InvalidMasterKey(format!(
                "expected {KEY_SIZE} bytes, got {len}"
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        bytes.zeroize();

        Ok(Self { key })
    }

    /// Load the master key from `BMCSWEEP_MASTER_KEY`
    ///
    /// # Errors
    /// Returns `SecretError::MissingMasterKey` if the variable is unset, or
    /// `SecretError::InvalidMasterKey` if it cannot be decoded.
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(MASTER_KEY_ENV)
            .map_err(|_| SecretError::MissingMasterKey(MASTER_KEY_ENV.to_string()))?;
        Self::from_hex(&value)
    }

    /// Generate a fresh random key
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Hex encoding of the key, for handing to the operator once
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }

    /// Derive the encryption key for one secret ID
    ///
    /// HKDF-SHA256 with the master key as input keying material and the secret
    /// ID as salt.
    fn derive(&self, secret_id: &str) -> Result<DerivedKey> {
        let hk = Hkdf::<Sha256>::new(Some(secret_id.as_bytes()), &self.key);
        let mut okm = [0u8; KEY_SIZE];
        hk.expand(&[], &mut okm)
            .map_err(|e| SecretError::KeyDerivation(e.to_string()))?;
        Ok(DerivedKey { key: okm })
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey {
    key: [u8; KEY_SIZE],
}

/// Generate a new hex-encoded master key
#[must_use]
pub fn generate_master_key() -> String {
    MasterKey::generate().to_hex()
}

/// Encrypt `plaintext` for `secret_id`
///
/// Returns hex(`nonce || ciphertext || tag`).
///
/// # Errors
/// Returns an error if key derivation or encryption fails.
pub fn encrypt(master: &MasterKey, secret_id: &str, plaintext: &[u8]) -> Result<String> {
    let derived = master.derive(secret_id)?;
    let cipher = Aes256Gcm::new_from_slice(&derived.key)
        .map_err(|e| SecretError::Encryption(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SecretError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(hex::encode(blob))
}

/// Decrypt a hex blob produced by [`encrypt`] for the same `secret_id`
///
/// The GCM tag is the only integrity check; a wrong master key, a different
/// secret ID or a tampered blob all fail here.
///
/// # Errors
/// Returns `SecretError::MalformedCiphertext` if the blob cannot be decoded and
/// `SecretError::Decryption` if authentication fails.
pub fn decrypt(master: &MasterKey, secret_id: &str, blob_hex: &str) -> Result<Vec<u8>> {
    let blob = hex::decode(blob_hex)
        .map_err(|_| SecretError::MalformedCiphertext(secret_id.to_string()))?;

    if blob.len() < NONCE_SIZE {
        return Err(SecretError::MalformedCiphertext(secret_id.to_string()));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let derived = master.derive(secret_id)?;
    let cipher = Aes256Gcm::new_from_slice(&derived.key)
        .map_err(|_| SecretError::Decryption(secret_id.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| SecretError::Decryption(secret_id.to_string()))
}
