//! Symmetric payload encryption.
//!
//! Keys are stretched from a high-entropy local secret with
//! PBKDF2-HMAC-SHA512 and a random salt. Payloads are sealed with
//! ChaCha20-Poly1305 under a fresh random nonce per message; the stored
//! nonce is zero-padded into the cipher's 12-byte IV and prepended to the
//! ciphertext before base64 encoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::error::{KeysError, Result};

/// PBKDF2 iteration count (fixed; matches the write side everywhere).
pub const KDF_ITERATIONS: u32 = 10_000;

/// Salt length in bytes for key derivation.
pub const KDF_SALT_LEN: usize = 16;

/// The cipher's IV width; stored nonces never exceed this.
pub const MAX_NONCE_LEN: usize = 12;

/// A 256-bit symmetric key. Wiped from memory on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base64 form for transport in key-share messages.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Parse from the base64 transport form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64.decode(encoded)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeysError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretKey {}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "SecretKey(..)")
    }
}

impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        SecretKey::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Stretch a high-entropy secret into a symmetric key.
///
/// PBKDF2-HMAC-SHA512 with a fixed iteration count and 32-byte output.
pub fn derive_key(secret: &str, salt: &[u8], iterations: u32) -> SecretKey {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha512>(secret.as_bytes(), salt, iterations, &mut out);
    SecretKey(out)
}

/// Generate a random key-derivation salt.
pub fn generate_salt() -> [u8; KDF_SALT_LEN] {
    let mut salt = [0u8; KDF_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Encrypt a payload under `key`.
///
/// A fresh random nonce of `nonce_len` bytes is generated per call (never
/// a counter), zero-padded to the IV width, and prepended to the
/// ciphertext before base64 encoding.
pub fn seal(key: &SecretKey, nonce_len: usize, plaintext: &[u8]) -> Result<String> {
    if nonce_len == 0 || nonce_len > MAX_NONCE_LEN {
        return Err(KeysError::InvalidNonceLength(nonce_len));
    }

    let mut nonce = vec![0u8; nonce_len];
    rand::thread_rng().fill_bytes(&mut nonce);

    let iv = padded_iv(&nonce);
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| KeysError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| KeysError::Encryption(e.to_string()))?;

    let mut wire = nonce;
    wire.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(wire))
}

/// Decrypt a sealed payload.
///
/// The leading `nonce_len` bytes of the decoded input are the nonce; the
/// rest is authenticated ciphertext. Wrong key or corrupt data fails with
/// an error the read pipeline maps to absence.
pub fn open(key: &SecretKey, nonce_len: usize, sealed: &str) -> Result<Vec<u8>> {
    if nonce_len == 0 || nonce_len > MAX_NONCE_LEN {
        return Err(KeysError::InvalidNonceLength(nonce_len));
    }

    let wire = BASE64.decode(sealed)?;
    if wire.len() <= nonce_len {
        return Err(KeysError::Decryption("ciphertext too short".to_string()));
    }

    let (nonce, ciphertext) = wire.split_at(nonce_len);
    let iv = padded_iv(nonce);
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| KeysError::Decryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext)
        .map_err(|e| KeysError::Decryption(e.to_string()))
}

/// Zero-pad a stored nonce into the cipher's IV width.
fn padded_iv(nonce: &[u8]) -> [u8; MAX_NONCE_LEN] {
    let mut iv = [0u8; MAX_NONCE_LEN];
    iv[..nonce.len()].copy_from_slice(nonce);
    iv
}
