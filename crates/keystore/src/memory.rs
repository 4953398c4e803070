//! In-memory `Keystore` adapter: keys live only for the process lifetime.
//! Adequate for tests and for the portions of this workspace that don't
//! yet need passphrase-encrypted on-disk key storage.

use crate::ports::{KeyPurpose, Keystore, KeystoreError};
use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::RwLock;
use shared_crypto::{
    aes::{aes_decode, aes_encode},
    ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature},
    pgp::{decrypt_as_recipient, RecipientKeyPair},
    CipherKey,
};
use std::collections::HashMap;

enum KeyEntry {
    Sign(Secp256k1KeyPair),
    Encrypt(RecipientKeyPair),
}

impl KeyEntry {
    fn purpose(&self) -> KeyPurpose {
        match self {
            Self::Sign(_) => KeyPurpose::Sign,
            Self::Encrypt(_) => KeyPurpose::Encrypt,
        }
    }

    fn encoded_pubkey(&self) -> String {
        match self {
            Self::Sign(kp) => STANDARD.encode(kp.public_key().as_bytes()),
            Self::Encrypt(kp) => STANDARD.encode(kp.public_key()),
        }
    }
}

/// In-memory, single-process `Keystore`.
#[derive(Default)]
pub struct InMemoryKeystore {
    keys: RwLock<HashMap<String, KeyEntry>>,
}

impl InMemoryKeystore {
    /// Create an empty keystore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for InMemoryKeystore {
    fn sign_by_key_name(&self, name: &str, hash: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let keys = self.keys.read();
        match keys.get(name) {
            Some(KeyEntry::Sign(kp)) => Ok(kp.sign(hash).as_bytes().to_vec()),
            Some(other) => Err(KeystoreError::WrongPurpose(name.to_string(), other.purpose())),
            None => Err(KeystoreError::KeyNotFound(name.to_string())),
        }
    }

    fn verify(&self, pubkey: &str, hash: &[u8], sig: &[u8]) -> Result<bool, KeystoreError> {
        let pubkey_bytes: [u8; 33] = STANDARD
            .decode(pubkey)
            .map_err(|e| KeystoreError::CryptoFailure(e.to_string()))?
            .try_into()
            .map_err(|_| KeystoreError::CryptoFailure("pubkey is not 33 bytes".into()))?;
        let sig_bytes: [u8; 64] = sig
            .try_into()
            .map_err(|_| KeystoreError::CryptoFailure("signature is not 64 bytes".into()))?;

        let public_key = Secp256k1PublicKey::from_bytes(pubkey_bytes)
            .map_err(|e| KeystoreError::CryptoFailure(e.to_string()))?;
        let signature = Secp256k1Signature::from_bytes(sig_bytes);

        Ok(public_key.verify(hash, &signature).is_ok())
    }

    fn decrypt(&self, pubkey_of_recipient: &str, data: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let keys = self.keys.read();
        let entry = keys.values().find(|entry| {
            matches!(entry, KeyEntry::Encrypt(_)) && entry.encoded_pubkey() == pubkey_of_recipient
        });

        match entry {
            Some(KeyEntry::Encrypt(kp)) => decrypt_as_recipient(kp, data)
                .map_err(|e| KeystoreError::CryptoFailure(e.to_string())),
            _ => Err(KeystoreError::PubkeyNotFound(pubkey_of_recipient.to_string())),
        }
    }

    fn aes_encrypt(&self, key: &CipherKey, plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        aes_encode(key, plaintext).map_err(|e| KeystoreError::CryptoFailure(e.to_string()))
    }

    fn aes_decrypt(&self, key: &CipherKey, data: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        aes_decode(key, data).map_err(|e| KeystoreError::CryptoFailure(e.to_string()))
    }

    fn new_key(
        &self,
        name: &str,
        purpose: KeyPurpose,
        _passphrase: &str,
    ) -> Result<String, KeystoreError> {
        let mut keys = self.keys.write();
        if keys.contains_key(name) {
            return Err(KeystoreError::KeyAlreadyExists(name.to_string()));
        }

        let entry = match purpose {
            KeyPurpose::Sign => KeyEntry::Sign(Secp256k1KeyPair::generate()),
            KeyPurpose::Encrypt => KeyEntry::Encrypt(RecipientKeyPair::generate()),
        };
        let addr = entry.encoded_pubkey();
        keys.insert(name.to_string(), entry);
        Ok(addr)
    }

    fn get_encoded_pubkey(&self, name: &str, purpose: KeyPurpose) -> Result<String, KeystoreError> {
        let keys = self.keys.read();
        match keys.get(name) {
            Some(entry) if entry.purpose() == purpose => Ok(entry.encoded_pubkey()),
            Some(entry) => Err(KeystoreError::WrongPurpose(name.to_string(), entry.purpose())),
            None => Err(KeystoreError::KeyNotFound(name.to_string())),
        }
    }
}
