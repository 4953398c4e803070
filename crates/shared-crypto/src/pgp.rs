//! # Per-Recipient Asymmetric Encryption (PGP-equivalent)
//!
//! POST trx in PRIVATE groups are encrypted for a specific recipient under
//! the group's announced user encryption key, *before* the AES layer is
//! applied (§4.8). The upstream system used PGP for this; this codebase has
//! no PGP dependency anywhere in its stack, so this module provides the same
//! "encrypt for one recipient's public key, only they can open it" contract
//! via ECIES: X25519 key agreement (ephemeral sender key × recipient's
//! static key) deriving a key for the existing XChaCha20-Poly1305 AEAD from
//! [`crate::symmetric`].
//!
//! Wire format of [`encrypt_for_recipient`]'s output: `ephemeral_pubkey (32
//! bytes) || nonce (24 bytes) || ciphertext`.

use crate::symmetric::{self, Nonce, SecretKey};
use crate::CryptoError;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

const PUBKEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

/// A recipient's encryption keypair (the "user encryption key" announced
/// to a group).
pub struct RecipientKeyPair {
    secret: StaticSecret,
}

impl RecipientKeyPair {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(rand::thread_rng()),
        }
    }

    /// Restore from raw secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// The public key to announce to the group.
    pub fn public_key(&self) -> [u8; 32] {
        PublicKey::from(&self.secret).to_bytes()
    }
}

impl Drop for RecipientKeyPair {
    fn drop(&mut self) {
        let mut bytes = self.secret.to_bytes();
        bytes.zeroize();
    }
}

/// Encrypt `plaintext` so only the holder of `recipient_pubkey`'s matching
/// secret can decrypt it.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the underlying AEAD fails.
pub fn encrypt_for_recipient(
    recipient_pubkey: &[u8; 32],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_pubkey = PublicKey::from(&ephemeral);
    let shared_secret = ephemeral.diffie_hellman(&PublicKey::from(*recipient_pubkey));

    let key = SecretKey::from_bytes(derive_key(shared_secret.as_bytes()));
    let (ciphertext, nonce) = symmetric::encrypt(&key, plaintext)?;

    let mut out = Vec::with_capacity(PUBKEY_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_pubkey.as_bytes());
    out.extend_from_slice(nonce.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt_for_recipient`] using the
/// recipient's secret key.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if the blob is malformed or the
/// AEAD rejects the ciphertext (e.g. wrong recipient).
pub fn decrypt_as_recipient(
    recipient: &RecipientKeyPair,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if data.len() < PUBKEY_LEN + NONCE_LEN {
        return Err(CryptoError::DecryptionFailed(
            "ciphertext shorter than header".into(),
        ));
    }
    let (ephemeral_pubkey_bytes, rest) = data.split_at(PUBKEY_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral_pubkey: [u8; 32] = ephemeral_pubkey_bytes
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed("bad ephemeral pubkey length".into()))?;
    let nonce_array: [u8; 24] = nonce_bytes
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed("bad nonce length".into()))?;

    let shared_secret = recipient
        .secret
        .diffie_hellman(&PublicKey::from(ephemeral_pubkey));
    let key = SecretKey::from_bytes(derive_key(shared_secret.as_bytes()));

    symmetric::decrypt(&key, ciphertext, &Nonce::from_bytes(nonce_array))
}

fn derive_key(shared_secret: &[u8; 32]) -> [u8; 32] {
    crate::hashing::blake3_derive_key("rumchain group-post recipient encryption", shared_secret)
}
