//! Rows: the canonical on-store shape of a record.
//!
//! A row is a JSON object holding the record's own scalar columns, keyed by
//! column name. `serde_json`'s default map keeps keys sorted, which makes the
//! serialized form canonical — the content hasher depends on that.

use crate::domain::errors::StoreError;
use registrar_types::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One stored row: column name to scalar value.
pub type Row = serde_json::Map<String, Value>;

/// The primary key of a row; 0 when absent or unset.
pub fn row_id(row: &Row) -> RecordId {
    row.get("id").and_then(Value::as_i64).unwrap_or(0)
}

/// Serialize a record into its row. Association collections and in-memory
/// flags are expected to be `serde(skip)`ed on the record type, so only
/// scalar columns land here.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Serialization(format!(
            "record serialized to {other:?}, expected an object"
        ))),
        Err(err) => Err(StoreError::Serialization(err.to_string())),
    }
}

/// Deserialize a record from its row.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|err| StoreError::Serialization(err.to_string()))
}
