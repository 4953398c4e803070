//! Join-group seed verification (§4.8, §8 S6).
//!
//! A group invitation carries a [`JoinGroupSeed`] signed by the owner over
//! the genesis block and the group's public metadata. The recipient
//! recomputes the same hash and checks it against the owner's signature
//! before trusting any of the seed's fields.

use keystore::Keystore;
use shared_crypto::hashing::blake3_hash_many;
use shared_types::JoinGroupSeed;

/// Verify that `seed.signature` is the owner's signature over
/// `seed.hash_inputs()`.
///
/// Returns `Ok(false)` (not an error) for a seed that fails verification;
/// callers surface that as `"Failed to verify seed"` per §7.
pub fn verify_seed(seed: &JoinGroupSeed, keystore: &dyn Keystore) -> Result<bool, keystore::KeystoreError> {
    let inputs = seed.hash_inputs();
    let slices: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
    let hash = blake3_hash_many(&slices);
    keystore.verify(&seed.owner_pubkey, &hash, &seed.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystore::{InMemoryKeystore, KeyPurpose};
    use shared_types::{Block, ConsensusType, EncryptionType};

    fn sample_seed(keystore: &InMemoryKeystore, owner_pubkey: &str) -> JoinGroupSeed {
        let mut seed = JoinGroupSeed {
            genesis_block: Block {
                block_id: "b0".into(),
                producer_pubkey: owner_pubkey.into(),
                prev_block_id: String::new(),
                trxs: vec![],
                producer_sign: vec![],
            },
            group_id: "g1".into(),
            group_name: "group-one".into(),
            owner_pubkey: owner_pubkey.into(),
            consensus_type: ConsensusType::Poa,
            encryption_type: EncryptionType::Public,
            app_key: "app".into(),
            cipher_key: "cafebabe".into(),
            signature: vec![],
        };
        let inputs = seed.hash_inputs();
        let slices: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
        let hash = blake3_hash_many(&slices);
        seed.signature = keystore.sign_by_key_name("owner", &hash).unwrap();
        seed
    }

    #[test]
    fn verify_seed_accepts_a_genuine_owner_signature() {
        let keystore = InMemoryKeystore::new();
        let owner_pubkey = keystore.new_key("owner", KeyPurpose::Sign, "").unwrap();
        let seed = sample_seed(&keystore, &owner_pubkey);

        assert!(verify_seed(&seed, &keystore).unwrap());
    }

    #[test]
    fn verify_seed_rejects_a_one_byte_mutation() {
        let keystore = InMemoryKeystore::new();
        let owner_pubkey = keystore.new_key("owner", KeyPurpose::Sign, "").unwrap();
        let mut seed = sample_seed(&keystore, &owner_pubkey);

        seed.cipher_key.push('0');

        assert!(!verify_seed(&seed, &keystore).unwrap());
    }
}
