//! Signing keypair for approver clients and tests.
//!
//! The registrar service itself never holds one of these; approvers sign on
//! their own machines and upload the clearsigned document.

use crate::clearsign::{encode_clearsign, SignatureBlock};
use crate::errors::CryptoError;
use crate::keys::{key_id_from_public, KeyBlock, SignerKey, FLAG_CERTIFY, FLAG_SIGN};
use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroize;

/// An Ed25519 keypair. Signatures are deterministic; no RNG is consulted at
/// signing time.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Create from a secret seed (32 bytes). Deterministic, for tests and
    /// key restoration.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Raw verifying key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Derived key id of the verifying key.
    pub fn key_id(&self) -> u64 {
        key_id_from_public(&self.public_key())
    }

    /// The public half as a signer key with default signing flags.
    pub fn signer_key(&self) -> SignerKey {
        SignerKey {
            key_id: self.key_id(),
            public_key: self.public_key(),
            flags: FLAG_CERTIFY | FLAG_SIGN,
            flags_valid: true,
            revoked: false,
            revocation_reason: None,
        }
    }

    /// The public half wrapped as a registrable key block.
    pub fn key_block(&self, identity: &str) -> KeyBlock {
        KeyBlock::new(identity, self.signer_key())
    }

    /// Sign raw bytes, producing a detached signature block.
    pub fn sign(&self, message: &[u8]) -> SignatureBlock {
        SignatureBlock {
            key_id: self.key_id(),
            signature: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Produce the clearsigned form of `body`.
    pub fn clearsign(&self, body: &[u8]) -> Result<String, CryptoError> {
        let signature = self.sign(body);
        encode_clearsign(body, &signature)
    }
}

impl Drop for SigningKeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
