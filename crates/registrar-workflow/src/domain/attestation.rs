//! Attestations: the signed payload binding an approval decision to an
//! exact revision snapshot.

use crate::errors::WorkflowError;
use registrar_crypto::Keyring;
use registrar_types::{ApprovalAction, RecordId, RecordKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an approver actually signs: the object type, the approval this
/// decision belongs to, the verb, and the exported pending-revision
/// snapshot the decision is tied to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub object_kind: RecordKind,
    pub approval_id: RecordId,
    pub action: ApprovalAction,
    pub exported_revision: Value,
}

impl Attestation {
    /// The canonical JSON body an approver signs. Stable formatting: the
    /// signature covers these exact bytes.
    pub fn canonical_json(&self) -> Result<String, WorkflowError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| WorkflowError::MalformedAttestation(err.to_string()))
    }

    /// Parse a verified signature body.
    pub fn parse(body: &[u8]) -> Result<Self, WorkflowError> {
        serde_json::from_slice(body)
            .map_err(|err| WorkflowError::MalformedAttestation(err.to_string()))
    }
}

/// Verifies clearsigned attestations against an approver set's keyring.
pub struct AttestationVerifier;

impl AttestationVerifier {
    /// Decode and cryptographically verify a clearsigned document, then
    /// parse its body as an attestation. Fails closed: any missing marker,
    /// unknown or revoked signer, bad signature or malformed payload is an
    /// error.
    pub fn verify(keyring: &Keyring, signed_text: &str) -> Result<Attestation, WorkflowError> {
        let (body, block) = keyring.verify_clearsign(signed_text)?;

        let attestation = Attestation::parse(&body)?;

        tracing::debug!(
            subsystem = "workflow",
            signer = %block.identity,
            approval_id = attestation.approval_id,
            action = %attestation.action,
            "attestation verified"
        );

        Ok(attestation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar_crypto::SigningKeyPair;
    use serde_json::json;

    fn attestation() -> Attestation {
        Attestation {
            object_kind: RecordKind::Approver,
            approval_id: 7,
            action: ApprovalAction::Approve,
            exported_revision: json!({"id": 12, "name": "Jane"}),
        }
    }

    #[test]
    fn test_canonical_json_round_trip() {
        let att = attestation();
        let body = att.canonical_json().unwrap();
        let parsed = Attestation::parse(body.as_bytes()).unwrap();
        assert_eq!(parsed, att);
    }

    #[test]
    fn test_verify_accepts_signed_attestation() {
        let pair = SigningKeyPair::from_seed([51u8; 32]);
        let ring = Keyring::new(vec![pair.key_block("jane <jane@example.com>")]);

        let body = attestation().canonical_json().unwrap();
        let signed = pair.clearsign(body.as_bytes()).unwrap();

        let verified = AttestationVerifier::verify(&ring, &signed).unwrap();
        assert_eq!(verified.approval_id, 7);
        assert_eq!(verified.action, ApprovalAction::Approve);
    }

    #[test]
    fn test_verify_rejects_unknown_signer() {
        let member = SigningKeyPair::from_seed([52u8; 32]);
        let outsider = SigningKeyPair::from_seed([53u8; 32]);
        let ring = Keyring::new(vec![member.key_block("m <m@example.com>")]);

        let body = attestation().canonical_json().unwrap();
        let signed = outsider.clearsign(body.as_bytes()).unwrap();

        assert!(matches!(
            AttestationVerifier::verify(&ring, &signed),
            Err(WorkflowError::Verification(_))
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_payload() {
        let pair = SigningKeyPair::from_seed([54u8; 32]);
        let ring = Keyring::new(vec![pair.key_block("m <m@example.com>")]);

        let signed = pair.clearsign(b"not an attestation").unwrap();
        assert!(matches!(
            AttestationVerifier::verify(&ring, &signed),
            Err(WorkflowError::MalformedAttestation(_))
        ));
    }

    #[test]
    fn test_unsigned_text_rejected() {
        let ring = Keyring::default();
        assert!(AttestationVerifier::verify(&ring, "").is_err());
    }
}
