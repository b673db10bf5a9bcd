//! Clearsigned documents.
//!
//! A clearsigned document carries its body as readable text between a
//! message marker and a signature marker, followed by the armored signature
//! block. The signature covers the exact body bytes.

use crate::errors::CryptoError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

const MESSAGE_HEADER: &str = "-----BEGIN REGISTRAR SIGNED MESSAGE-----";
const SIGNATURE_HEADER: &str = "-----BEGIN REGISTRAR SIGNATURE-----";
const SIGNATURE_FOOTER: &str = "-----END REGISTRAR SIGNATURE-----";

/// The detached signature and the id of the key that produced it.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub key_id: u64,
    #[serde_as(as = "serde_with::Bytes")]
    pub signature: [u8; 64],
}

/// A decoded clearsigned document: exact body bytes plus signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedMessage {
    pub body: Vec<u8>,
    pub signature: SignatureBlock,
}

/// Assemble the clearsigned form of `body`.
pub fn encode_clearsign(body: &[u8], signature: &SignatureBlock) -> Result<String, CryptoError> {
    let body_text = std::str::from_utf8(body)
        .map_err(|_| CryptoError::MalformedSignature("body is not valid UTF-8".to_string()))?;

    if body_text.contains(SIGNATURE_HEADER) || body_text.contains(MESSAGE_HEADER) {
        return Err(CryptoError::MalformedSignature(
            "body may not contain envelope markers".to_string(),
        ));
    }

    let sig_json =
        serde_json::to_vec(signature).map_err(|err| CryptoError::Serialization(err.to_string()))?;

    Ok(format!(
        "{MESSAGE_HEADER}\n\n{body_text}\n{SIGNATURE_HEADER}\n\n{}\n{SIGNATURE_FOOTER}\n",
        BASE64.encode(sig_json)
    ))
}

/// Decode a clearsigned document, recovering the exact body bytes and the
/// signature block. No cryptographic verification happens here.
pub fn decode_clearsign(text: &str) -> Result<SignedMessage, CryptoError> {
    let msg_start = text
        .find(MESSAGE_HEADER)
        .ok_or_else(|| CryptoError::MalformedSignature("missing message marker".to_string()))?;

    let after_header = &text[msg_start + MESSAGE_HEADER.len()..];
    let body_start = after_header.find("\n\n").ok_or_else(|| {
        CryptoError::MalformedSignature("missing blank line after message marker".to_string())
    })? + 2;

    let sig_start = after_header
        .find(SIGNATURE_HEADER)
        .ok_or_else(|| CryptoError::MalformedSignature("missing signature marker".to_string()))?;

    if sig_start < body_start {
        return Err(CryptoError::MalformedSignature(
            "signature marker precedes body".to_string(),
        ));
    }

    // The newline that separates the body from the signature marker is part
    // of the envelope, not the body.
    let body = after_header[body_start..sig_start]
        .strip_suffix('\n')
        .ok_or_else(|| {
            CryptoError::MalformedSignature("body not terminated by newline".to_string())
        })?
        .as_bytes()
        .to_vec();

    let sig_end = after_header
        .find(SIGNATURE_FOOTER)
        .ok_or_else(|| CryptoError::MalformedSignature("missing signature footer".to_string()))?;

    if sig_end < sig_start {
        return Err(CryptoError::MalformedSignature(
            "signature footer precedes signature marker".to_string(),
        ));
    }

    let sig_body: String = after_header[sig_start + SIGNATURE_HEADER.len()..sig_end]
        .lines()
        .map(str::trim)
        .collect();

    let raw = BASE64
        .decode(sig_body.as_bytes())
        .map_err(|err| CryptoError::MalformedSignature(format!("bad base64 signature: {err}")))?;

    let signature: SignatureBlock =
        serde_json::from_slice(&raw).map_err(|err| CryptoError::Serialization(err.to_string()))?;

    Ok(SignedMessage { body, signature })
}
