//! Error types for key handling and signature verification.

use thiserror::Error;

/// Errors from armor decoding, keyring resolution and verification.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// The armored envelope is missing markers or carries a bad body.
    #[error("malformed armor: {0}")]
    MalformedArmor(String),

    /// The clearsigned document is missing markers or carries a bad
    /// signature block.
    #[error("malformed signed document: {0}")]
    MalformedSignature(String),

    /// No key in the ring matches the signature's key id.
    #[error("no key with id {key_id:#018x} in the keyring")]
    UnknownSigner { key_id: u64 },

    /// Every candidate key failed cryptographic verification.
    #[error("signature verification failed for key id {key_id:#018x}")]
    BadSignature { key_id: u64 },

    /// The key bytes do not describe a valid Ed25519 point.
    #[error("invalid public key")]
    InvalidKey,

    /// Attempted to verify against a revoked key.
    #[error("key {key_id:#018x} is revoked")]
    KeyRevoked { key_id: u64 },

    /// Key block or signature payload failed to (de)serialize.
    #[error("key material serialization failed: {0}")]
    Serialization(String),
}
