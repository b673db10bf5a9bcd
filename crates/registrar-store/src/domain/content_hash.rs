//! Content hashing for change detection.
//!
//! The digest covers a record's own scalar columns and nothing else: it is
//! computed from the canonical row JSON (sorted keys), so two records with
//! identical column values always hash alike. Association contents never
//! participate — join-link maintenance decides dirtiness for those.

use crate::domain::errors::StoreError;
use crate::domain::row::Row;
use sha2::{Digest, Sha256};

/// A SHA-256 digest of a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form for log lines.
    pub fn short_hex(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Computes stable digests over rows.
pub struct ContentHasher;

impl ContentHasher {
    /// Digest a row. The `id` column participates like any other column; a
    /// freshly assigned id therefore changes the hash, which is correct —
    /// the row was just created.
    pub fn digest_row(row: &Row) -> Result<ContentHash, StoreError> {
        let canonical =
            serde_json::to_vec(row).map_err(|err| StoreError::Serialization(err.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&canonical);

        Ok(ContentHash(hasher.finalize().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_equal_rows_equal_hashes() {
        let a = row(&[("id", json!(1)), ("name", json!("x"))]);
        let b = row(&[("name", json!("x")), ("id", json!(1))]);

        // Maps are key-sorted, so insertion order cannot matter.
        assert_eq!(
            ContentHasher::digest_row(&a).unwrap(),
            ContentHasher::digest_row(&b).unwrap()
        );
    }

    #[test]
    fn test_value_change_changes_hash() {
        let a = row(&[("id", json!(1)), ("name", json!("x"))]);
        let b = row(&[("id", json!(1)), ("name", json!("y"))]);

        assert_ne!(
            ContentHasher::digest_row(&a).unwrap(),
            ContentHasher::digest_row(&b).unwrap()
        );
    }

    #[test]
    fn test_null_and_absent_differ() {
        let a = row(&[("id", json!(1)), ("promoted_at", json!(null))]);
        let b = row(&[("id", json!(1))]);

        assert_ne!(
            ContentHasher::digest_row(&a).unwrap(),
            ContentHasher::digest_row(&b).unwrap()
        );
    }

    #[test]
    fn test_short_hex_length() {
        let hash = ContentHasher::digest_row(&row(&[("id", json!(1))])).unwrap();
        assert_eq!(hash.short_hex().len(), 8);
    }
}
