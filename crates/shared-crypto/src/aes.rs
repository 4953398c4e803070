//! # AES-256-GCM (group `CipherKey`)
//!
//! Every trx payload is encrypted under the group's shared symmetric key
//! before publish, and decrypted on receive (§4.8). The wire format this
//! subsystem's seed/join flow uses is a hex-encoded 32-byte key, so this
//! module exposes `CipherKey` with hex round-tripping rather than raw bytes.
//!
//! Nonces are 96-bit per the GCM standard and are generated fresh per call
//! and prepended to the ciphertext, mirroring the sibling `symmetric`
//! module's "return what you need to decrypt" shape.

use crate::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as GcmNonce,
};
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;

/// The group's shared AES-256 key, as exchanged hex-encoded in `GroupItem`
/// and `JoinGroupSeed`.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct CipherKey([u8; 32]);

impl CipherKey {
    /// Construct from raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from the hex encoding used by `GroupItem::cipher_key`.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: v.len(),
            })?;
        Ok(Self(array))
    }

    /// Render as the hex encoding used by `GroupItem::cipher_key`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Generate a fresh random key (used when creating a new group).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }
}

/// Encrypt `plaintext` under the group `CipherKey`.
///
/// Returns `nonce || ciphertext`, matching the wire shape `Trx::data` is
/// expected to carry.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the underlying AEAD fails.
pub fn aes_encode(key: &CipherKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.0.as_ref().into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
    let nonce = GcmNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext` blob produced by [`aes_encode`].
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if the blob is too short to
/// contain a nonce, or if the underlying AEAD rejects the ciphertext.
pub fn aes_decode(key: &CipherKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_LEN {
        return Err(CryptoError::DecryptionFailed(
            "ciphertext shorter than nonce".into(),
        ));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(key.0.as_ref().into());
    cipher
        .decrypt(GcmNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
