//! Signer keys and key blocks.

use crate::errors::CryptoError;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key may certify other keys.
pub const FLAG_CERTIFY: u8 = 0x01;
/// Key may sign documents.
pub const FLAG_SIGN: u8 = 0x02;
/// Key may encrypt communications.
pub const FLAG_ENCRYPT_COMMUNICATIONS: u8 = 0x04;
/// Key may encrypt storage.
pub const FLAG_ENCRYPT_STORAGE: u8 = 0x08;

/// Derive the 64-bit key id from a verifying key: the leading bytes of its
/// SHA-256 fingerprint, big-endian.
pub fn key_id_from_public(public_key: &[u8; 32]) -> u64 {
    let digest = Sha256::digest(public_key);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// One Ed25519 verifying key with its usage and revocation metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerKey {
    /// Derived key id (see [`key_id_from_public`]).
    pub key_id: u64,
    /// Raw Ed25519 verifying key.
    pub public_key: [u8; 32],
    /// Bitwise OR of the `FLAG_*` usage bits.
    pub flags: u8,
    /// Whether the flags field was set by the key holder. Keys without
    /// declared flags are accepted for any usage.
    pub flags_valid: bool,
    /// The key has been revoked outright.
    pub revoked: bool,
    /// A revocation reason on the self-signature also disqualifies the key.
    pub revocation_reason: Option<String>,
}

impl SignerKey {
    /// Wrap a verifying key with the default signing flags.
    pub fn from_public(public_key: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&public_key).map_err(|_| CryptoError::InvalidKey)?;

        Ok(Self {
            key_id: key_id_from_public(&public_key),
            public_key,
            flags: FLAG_CERTIFY | FLAG_SIGN,
            flags_valid: true,
            revoked: false,
            revocation_reason: None,
        })
    }

    /// Full SHA-256 fingerprint of the verifying key.
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.public_key).into()
    }

    /// Verify a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.public_key).map_err(|_| CryptoError::InvalidKey)?;
        let sig = Signature::from_bytes(signature);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::BadSignature {
                key_id: self.key_id,
            })
    }

    /// True when the key is usable for the required usage bits.
    pub fn permits(&self, required_usage: u8) -> bool {
        if self.revoked || self.revocation_reason.is_some() {
            return false;
        }

        // A key that never declared flags is accepted for any usage.
        if self.flags_valid && required_usage != 0 {
            return self.flags & required_usage == required_usage;
        }

        true
    }
}

/// A registered public key block: primary key, subkeys and holder identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBlock {
    /// Holder identity, conventionally `Name <email>`.
    pub identity: String,
    pub primary: SignerKey,
    #[serde(default)]
    pub subkeys: Vec<SignerKey>,
}

impl KeyBlock {
    pub fn new(identity: impl Into<String>, primary: SignerKey) -> Self {
        Self {
            identity: identity.into(),
            primary,
            subkeys: Vec::new(),
        }
    }

    /// All keys in the block (primary or subkey) matching `key_id`.
    pub fn keys_matching(&self, key_id: u64) -> Vec<&SignerKey> {
        let mut keys = Vec::new();

        if self.primary.key_id == key_id {
            keys.push(&self.primary);
        }

        for subkey in &self.subkeys {
            if subkey.key_id == key_id {
                keys.push(subkey);
            }
        }

        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SigningKeyPair;

    #[test]
    fn test_key_id_is_stable() {
        let pair = SigningKeyPair::from_seed([7u8; 32]);
        let key = pair.signer_key();

        assert_eq!(key.key_id, key_id_from_public(&key.public_key));
        assert_eq!(key.key_id, pair.key_id());
    }

    #[test]
    fn test_from_public_defaults() {
        let pair = SigningKeyPair::from_seed([9u8; 32]);
        let key = SignerKey::from_public(pair.public_key()).unwrap();

        assert_eq!(key.key_id, pair.key_id());
        assert!(key.flags_valid);
        assert!(key.permits(FLAG_SIGN));
        assert!(!key.revoked);
        assert_eq!(key.fingerprint()[..8], key.key_id.to_be_bytes());
    }

    #[test]
    fn test_permits_usage_superset() {
        let pair = SigningKeyPair::from_seed([1u8; 32]);
        let mut key = pair.signer_key();
        key.flags = FLAG_SIGN;

        assert!(key.permits(FLAG_SIGN));
        assert!(!key.permits(FLAG_SIGN | FLAG_CERTIFY));
        assert!(key.permits(0));
    }

    #[test]
    fn test_undeclared_flags_accept_any_usage() {
        let pair = SigningKeyPair::from_seed([2u8; 32]);
        let mut key = pair.signer_key();
        key.flags = 0;
        key.flags_valid = false;

        assert!(key.permits(FLAG_ENCRYPT_STORAGE));
    }

    #[test]
    fn test_revoked_key_never_permits() {
        let pair = SigningKeyPair::from_seed([3u8; 32]);
        let mut key = pair.signer_key();
        key.revoked = true;
        assert!(!key.permits(0));

        let mut key = pair.signer_key();
        key.revocation_reason = Some("superseded by new key".to_string());
        assert!(!key.permits(FLAG_SIGN));
    }

    #[test]
    fn test_subkey_lookup() {
        let primary = SigningKeyPair::from_seed([4u8; 32]);
        let sub = SigningKeyPair::from_seed([5u8; 32]);

        let mut block = KeyBlock::new("Ops <ops@example.com>", primary.signer_key());
        block.subkeys.push(sub.signer_key());

        assert_eq!(block.keys_matching(primary.key_id()).len(), 1);
        assert_eq!(block.keys_matching(sub.key_id()).len(), 1);
        assert!(block.keys_matching(0xDEAD_BEEF).is_empty());
    }
}
