//! Trust-anchor keyrings.
//!
//! A keyring is assembled per approver set from the key blocks of its live
//! approvers and answers exactly three questions: which keys match a key id,
//! which of those are usable for a required usage, and does a clearsigned
//! document verify against any of them.

use crate::clearsign::{decode_clearsign, SignedMessage};
use crate::errors::CryptoError;
use crate::keys::{KeyBlock, SignerKey, FLAG_SIGN};

/// An ordered collection of trusted key blocks.
#[derive(Clone, Debug, Default)]
pub struct Keyring {
    blocks: Vec<KeyBlock>,
}

impl Keyring {
    pub fn new(blocks: Vec<KeyBlock>) -> Self {
        Self { blocks }
    }

    pub fn push(&mut self, block: KeyBlock) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[KeyBlock] {
        &self.blocks
    }

    /// All keys (primary or subkey) matching `key_id`, regardless of
    /// revocation or usage.
    pub fn keys_by_id(&self, key_id: u64) -> Vec<(&KeyBlock, &SignerKey)> {
        let mut keys = Vec::new();

        for block in &self.blocks {
            for key in block.keys_matching(key_id) {
                keys.push((block, key));
            }
        }

        keys
    }

    /// Keys matching `key_id` that are not revoked, carry no revocation
    /// reason, and whose declared flags cover `required_usage`. A zero
    /// `required_usage` skips the flag check; keys without declared flags are
    /// accepted for any usage.
    pub fn keys_by_id_usage(&self, key_id: u64, required_usage: u8) -> Vec<(&KeyBlock, &SignerKey)> {
        self.keys_by_id(key_id)
            .into_iter()
            .filter(|(_, key)| key.permits(required_usage))
            .collect()
    }

    /// Private keys usable for decryption. The registrar never stores
    /// private key material, so this is always empty.
    pub fn decryption_keys(&self) -> Vec<SignerKey> {
        Vec::new()
    }

    /// Verify a decoded signed message against the ring, requiring the
    /// given usage bits on the signer key. Returns the signing key block.
    pub fn verify_with_usage(
        &self,
        message: &SignedMessage,
        required_usage: u8,
    ) -> Result<&KeyBlock, CryptoError> {
        let key_id = message.signature.key_id;
        let candidates = self.keys_by_id_usage(key_id, required_usage);

        if candidates.is_empty() {
            // Distinguish "revoked" from "unknown" for diagnostics.
            if self
                .keys_by_id(key_id)
                .iter()
                .any(|(_, key)| key.revoked || key.revocation_reason.is_some())
            {
                return Err(CryptoError::KeyRevoked { key_id });
            }

            return Err(CryptoError::UnknownSigner { key_id });
        }

        for (block, key) in candidates {
            if key.verify(&message.body, &message.signature.signature).is_ok() {
                tracing::debug!(
                    key_id = format_args!("{key_id:#018x}"),
                    identity = %block.identity,
                    "signature verified"
                );

                return Ok(block);
            }
        }

        Err(CryptoError::BadSignature { key_id })
    }

    /// Verify a signed message with the signing usage required.
    pub fn verify(&self, message: &SignedMessage) -> Result<&KeyBlock, CryptoError> {
        self.verify_with_usage(message, FLAG_SIGN)
    }

    /// Decode a clearsigned document and verify it, returning the recovered
    /// body and the signing key block.
    pub fn verify_clearsign(&self, text: &str) -> Result<(Vec<u8>, &KeyBlock), CryptoError> {
        let message = decode_clearsign(text)?;
        let block = self.verify(&message)?;

        Ok((message.body, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::FLAG_CERTIFY;
    use crate::signing::SigningKeyPair;

    fn ring_with(pairs: &[(&SigningKeyPair, &str)]) -> Keyring {
        Keyring::new(
            pairs
                .iter()
                .map(|(pair, identity)| pair.key_block(identity))
                .collect(),
        )
    }

    #[test]
    fn test_verify_accepts_member_signature() {
        let alice = SigningKeyPair::from_seed([31u8; 32]);
        let bob = SigningKeyPair::from_seed([32u8; 32]);
        let ring = ring_with(&[(&alice, "alice <a@example.com>"), (&bob, "bob <b@example.com>")]);

        let text = bob.clearsign(b"approve this").unwrap();
        let (body, block) = ring.verify_clearsign(&text).unwrap();

        assert_eq!(body, b"approve this");
        assert_eq!(block.identity, "bob <b@example.com>");
    }

    #[test]
    fn test_verify_rejects_outsider() {
        let member = SigningKeyPair::from_seed([33u8; 32]);
        let outsider = SigningKeyPair::from_seed([34u8; 32]);
        let ring = ring_with(&[(&member, "m <m@example.com>")]);

        let text = outsider.clearsign(b"approve this").unwrap();
        assert!(matches!(
            ring.verify_clearsign(&text),
            Err(CryptoError::UnknownSigner { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let member = SigningKeyPair::from_seed([35u8; 32]);
        let ring = ring_with(&[(&member, "m <m@example.com>")]);

        let text = member.clearsign(b"approve request 41").unwrap();
        let tampered = text.replace("request 41", "request 42");

        assert!(matches!(
            ring.verify_clearsign(&tampered),
            Err(CryptoError::BadSignature { .. })
        ));
    }

    #[test]
    fn test_revoked_key_rejected() {
        let member = SigningKeyPair::from_seed([36u8; 32]);
        let mut block = member.key_block("m <m@example.com>");
        block.primary.revoked = true;
        let ring = Keyring::new(vec![block]);

        let text = member.clearsign(b"approve").unwrap();
        assert!(matches!(
            ring.verify_clearsign(&text),
            Err(CryptoError::KeyRevoked { .. })
        ));
    }

    #[test]
    fn test_revocation_reason_rejected() {
        let member = SigningKeyPair::from_seed([37u8; 32]);
        let mut block = member.key_block("m <m@example.com>");
        block.primary.revocation_reason = Some("compromised".to_string());
        let ring = Keyring::new(vec![block]);

        let text = member.clearsign(b"approve").unwrap();
        assert!(ring.verify_clearsign(&text).is_err());
    }

    #[test]
    fn test_usage_flags_must_cover_required_bits() {
        let member = SigningKeyPair::from_seed([38u8; 32]);
        let mut block = member.key_block("m <m@example.com>");
        block.primary.flags = FLAG_CERTIFY; // cannot sign
        let ring = Keyring::new(vec![block]);

        let text = member.clearsign(b"approve").unwrap();
        let message = decode_clearsign(&text).unwrap();

        assert!(ring.verify_with_usage(&message, FLAG_SIGN).is_err());
        // With no usage requirement the same key is acceptable.
        assert!(ring.verify_with_usage(&message, 0).is_ok());
    }

    #[test]
    fn test_subkey_signature_verifies() {
        let primary = SigningKeyPair::from_seed([39u8; 32]);
        let sub = SigningKeyPair::from_seed([40u8; 32]);

        let mut block = primary.key_block("m <m@example.com>");
        block.subkeys.push(sub.signer_key());
        let ring = Keyring::new(vec![block]);

        let text = sub.clearsign(b"signed by subkey").unwrap();
        let (body, _) = ring.verify_clearsign(&text).unwrap();
        assert_eq!(body, b"signed by subkey");
    }

    #[test]
    fn test_decryption_keys_always_empty() {
        let member = SigningKeyPair::from_seed([41u8; 32]);
        let ring = ring_with(&[(&member, "m <m@example.com>")]);

        assert!(ring.decryption_keys().is_empty());
    }
}
