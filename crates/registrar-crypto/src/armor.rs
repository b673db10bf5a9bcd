//! ASCII armor for public key blocks.
//!
//! The envelope follows the familiar shape: a BEGIN marker, a blank line, a
//! base64 body wrapped at 64 columns, and an END marker. The body is the
//! JSON-serialized [`KeyBlock`].

use crate::errors::CryptoError;
use crate::keys::KeyBlock;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

const HEADER: &str = "-----BEGIN REGISTRAR PUBLIC KEY BLOCK-----";
const FOOTER: &str = "-----END REGISTRAR PUBLIC KEY BLOCK-----";

const WRAP_COLUMNS: usize = 64;

fn wrap(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / WRAP_COLUMNS + 1);

    // base64 output is ASCII, so byte offsets are char boundaries
    let mut start = 0;
    while start < encoded.len() {
        let end = (start + WRAP_COLUMNS).min(encoded.len());
        out.push_str(&encoded[start..end]);
        out.push('\n');
        start = end;
    }

    out
}

/// Encode a key block into its armored form.
pub fn encode_key_block(block: &KeyBlock) -> Result<String, CryptoError> {
    let body =
        serde_json::to_vec(block).map_err(|err| CryptoError::Serialization(err.to_string()))?;

    Ok(format!(
        "{HEADER}\n\n{}{FOOTER}\n",
        wrap(&BASE64.encode(body))
    ))
}

/// Decode an armored key block. Fails on missing markers, bad base64 or a
/// body that does not describe a key block.
pub fn decode_key_block(armored: &str) -> Result<KeyBlock, CryptoError> {
    let start = armored
        .find(HEADER)
        .ok_or_else(|| CryptoError::MalformedArmor("missing BEGIN marker".to_string()))?;
    let end = armored
        .find(FOOTER)
        .ok_or_else(|| CryptoError::MalformedArmor("missing END marker".to_string()))?;

    if end <= start {
        return Err(CryptoError::MalformedArmor(
            "END marker precedes BEGIN marker".to_string(),
        ));
    }

    let body: String = armored[start + HEADER.len()..end]
        .lines()
        .map(str::trim)
        .collect();

    let raw = BASE64
        .decode(body.as_bytes())
        .map_err(|err| CryptoError::MalformedArmor(format!("bad base64 body: {err}")))?;

    serde_json::from_slice(&raw).map_err(|err| CryptoError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SigningKeyPair;

    #[test]
    fn test_armor_round_trip() {
        let pair = SigningKeyPair::from_seed([11u8; 32]);
        let block = pair.key_block("Jane Approver <jane@example.com>");

        let armored = encode_key_block(&block).unwrap();
        assert!(armored.starts_with(HEADER));
        assert!(armored.trim_end().ends_with(FOOTER));

        let decoded = decode_key_block(&armored).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_missing_markers_rejected() {
        assert!(matches!(
            decode_key_block("not armor at all"),
            Err(CryptoError::MalformedArmor(_))
        ));

        let headless = format!("{FOOTER}\n");
        assert!(decode_key_block(&headless).is_err());
    }

    #[test]
    fn test_corrupt_body_rejected() {
        let pair = SigningKeyPair::from_seed([12u8; 32]);
        let armored = encode_key_block(&pair.key_block("x <x@example.com>")).unwrap();

        let corrupted = armored.replacen('A', "!", 1);
        // Either the base64 or the JSON layer rejects, depending on where the
        // flipped byte lands; both are decode failures.
        if corrupted != armored {
            assert!(decode_key_block(&corrupted).is_err());
        }
    }

    #[test]
    fn test_body_wraps_at_64_columns() {
        let pair = SigningKeyPair::from_seed([13u8; 32]);
        let mut block = pair.key_block("wrap <wrap@example.com>");
        for seed in 20u8..28 {
            block
                .subkeys
                .push(SigningKeyPair::from_seed([seed; 32]).signer_key());
        }

        let armored = encode_key_block(&block).unwrap();
        for line in armored.lines() {
            assert!(line.len() <= HEADER.len().max(64));
        }
    }
}
