//! Key-management port `chain-core` programs against.

use shared_crypto::CipherKey;
use thiserror::Error;

/// Errors surfaced by a `Keystore` implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    /// No key registered under this name.
    #[error("no key named {0}")]
    KeyNotFound(String),

    /// No key registered for this public key.
    #[error("no key found for pubkey {0}")]
    PubkeyNotFound(String),

    /// The requested key exists but was created for the other purpose.
    #[error("key {0} is not a {1:?} key")]
    WrongPurpose(String, KeyPurpose),

    /// A key with this name already exists.
    #[error("key {0} already exists")]
    KeyAlreadyExists(String),

    /// The underlying cryptographic operation failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),
}

/// What a registered key is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// secp256k1 signing key.
    Sign,
    /// X25519 encryption key.
    Encrypt,
}

/// Sign by key name; verify; decrypt; AES helpers; key lifecycle.
///
/// Every private key operation in `chain-core` goes through this trait —
/// `Chain`/`TrxMgr`/consensus roles never hold raw key material.
pub trait Keystore: Send + Sync {
    /// Sign `hash` with the named key's signing secret.
    ///
    /// # Errors
    ///
    /// `KeystoreError::KeyNotFound` if no such key; `WrongPurpose` if the
    /// named key is an `Encrypt` key.
    fn sign_by_key_name(&self, name: &str, hash: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    /// Verify a signature against a base64-encoded public key.
    fn verify(&self, pubkey: &str, hash: &[u8], sig: &[u8]) -> Result<bool, KeystoreError>;

    /// Decrypt data addressed to `pubkey_of_recipient`'s encryption key,
    /// using whichever registered key matches that pubkey.
    ///
    /// # Errors
    ///
    /// `KeystoreError::PubkeyNotFound` if no registered key matches.
    fn decrypt(&self, pubkey_of_recipient: &str, data: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    /// Encrypt `plaintext` under a group's shared `CipherKey`.
    fn aes_encrypt(&self, key: &CipherKey, plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    /// Decrypt `data` under a group's shared `CipherKey`.
    fn aes_decrypt(&self, key: &CipherKey, data: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    /// Generate and register a new key under `name` for `purpose`.
    /// Returns the new key's base64-encoded public key ("address").
    ///
    /// # Errors
    ///
    /// `KeystoreError::KeyAlreadyExists` if `name` is taken.
    fn new_key(
        &self,
        name: &str,
        purpose: KeyPurpose,
        passphrase: &str,
    ) -> Result<String, KeystoreError>;

    /// Fetch the base64-encoded public key registered under `name` for
    /// `purpose`.
    fn get_encoded_pubkey(&self, name: &str, purpose: KeyPurpose) -> Result<String, KeystoreError>;
}
