//! # Shared Crypto - Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | XChaCha20-Poly1305 | Symmetric payload encryption |
//! | `aes` | AES-256-GCM | Group `CipherKey` encryption |
//! | `pgp` | X25519 + XChaCha20-Poly1305 (ECIES) | Per-recipient encryption for private-group posts |
//! | `hashing` | BLAKE3 | Fast hashing |
//! | `ecdsa` | secp256k1 | Transaction/producer/owner signing |
//!
//! ## Security Properties
//!
//! - **XChaCha20**: 192-bit nonce, constant-time, side-channel immune
//! - **AES-256-GCM**: hardware-accelerated on most targets
//! - **X25519**: Curve25519 Diffie-Hellman, used only for key agreement
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization (EIP-2)
//! - **BLAKE3**: SIMD-accelerated, 5-10x faster than SHA-256

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aes;
pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod pgp;
pub mod symmetric;

// Re-exports
pub use aes::CipherKey;
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{blake3_hash, Blake3Hasher};
pub use pgp::RecipientKeyPair;
pub use symmetric::{decrypt, encrypt, Cipher, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
