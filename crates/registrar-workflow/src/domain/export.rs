//! Export projections and structural comparison.
//!
//! Every registry object exports to a JSON document holding its identity and
//! the snapshots of its current and pending revisions. The export is what a
//! change request records, what approvers sign, and what the consistency
//! checker compares against live state.

use crate::domain::diff::line_diff;
use crate::errors::ExportError;
use registrar_types::{EntityState, RecordId, RecordKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Columns that describe where a revision is in its lifecycle rather than
/// what it proposes. Ignored when deciding whether a proposal is a no-op.
const LIFECYCLE_COLUMNS: &[&str] = &[
    "id",
    "revision_state",
    "change_request_id",
    "approval_started_at",
    "approval_started_by",
    "promoted_at",
    "superseded_at",
    "approval_failed_at",
    "created_at",
    "created_by",
    "updated_at",
    "updated_by",
];

/// Full export of a registry object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectExport {
    pub id: RecordId,
    pub kind: RecordKind,
    pub state: EntityState,
    pub current_revision: Option<Value>,
    pub pending_revision: Option<Value>,
}

impl ObjectExport {
    /// Pretty JSON form. Objects without a positive id cannot be exported.
    pub fn to_json(&self) -> Result<String, ExportError> {
        if self.id <= 0 {
            return Err(ExportError::IdNotSet);
        }

        serde_json::to_string_pretty(self).map_err(|err| ExportError::Json(err.to_string()))
    }

    /// Line diff of the current revision snapshot against the pending one.
    pub fn diff(&self) -> Result<String, ExportError> {
        let current = pretty_or_empty(self.current_revision.as_ref())?;
        let pending = pretty_or_empty(self.pending_revision.as_ref())?;

        Ok(line_diff(&current, &pending))
    }

    /// Structural comparison against another export. Returns whether they
    /// match and the list of field-level differences found.
    pub fn compare(&self, other: &ObjectExport) -> (bool, Vec<String>) {
        let mut diffs = Vec::new();

        let expected = serde_json::to_value(self).unwrap_or(Value::Null);
        let got = serde_json::to_value(other).unwrap_or(Value::Null);
        compare_values("", &expected, &got, &mut diffs);

        (diffs.is_empty(), diffs)
    }

    /// True when the pending revision proposes exactly what the current one
    /// already holds, lifecycle columns aside.
    pub fn is_noop_proposal(&self) -> bool {
        match (&self.current_revision, &self.pending_revision) {
            (Some(current), Some(pending)) => {
                strip_lifecycle(current) == strip_lifecycle(pending)
            }
            _ => false,
        }
    }

    /// Parse an export document back from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, ExportError> {
        serde_json::from_str(raw).map_err(|err| ExportError::Json(err.to_string()))
    }
}

/// A lone revision snapshot. Exists so callers that only hold a revision get
/// the same projection surface as full objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionExport(pub Value);

impl RevisionExport {
    pub fn to_json(&self) -> Result<String, ExportError> {
        let id = self.0.get("id").and_then(Value::as_i64).unwrap_or(0);
        if id <= 0 {
            return Err(ExportError::IdNotSet);
        }

        serde_json::to_string_pretty(&self.0).map_err(|err| ExportError::Json(err.to_string()))
    }

    /// Revisions cannot be diffed against themselves.
    pub fn diff(&self) -> Result<String, ExportError> {
        Err(ExportError::UndiffableObject)
    }
}

fn pretty_or_empty(value: Option<&Value>) -> Result<String, ExportError> {
    match value {
        Some(value) => {
            serde_json::to_string_pretty(value).map_err(|err| ExportError::Json(err.to_string()))
        }
        None => Ok(String::new()),
    }
}

fn strip_lifecycle(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !LIFECYCLE_COLUMNS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Recursively compare two JSON values, appending a human-readable entry to
/// `diffs` for every mismatch.
pub fn compare_values(path: &str, expected: &Value, got: &Value, diffs: &mut Vec<String>) {
    match (expected, got) {
        (Value::Object(expected_map), Value::Object(got_map)) => {
            for (key, expected_value) in expected_map {
                let child_path = join_path(path, key);

                match got_map.get(key) {
                    Some(got_value) => {
                        compare_values(&child_path, expected_value, got_value, diffs)
                    }
                    None => diffs.push(format!("{child_path}: expected {expected_value}, missing")),
                }
            }

            for key in got_map.keys() {
                if !expected_map.contains_key(key) {
                    let child_path = join_path(path, key);
                    diffs.push(format!("{child_path}: unexpected field"));
                }
            }
        }
        (Value::Array(expected_items), Value::Array(got_items)) => {
            if expected_items.len() != got_items.len() {
                diffs.push(format!(
                    "{path}: expected {} elements, got {}",
                    expected_items.len(),
                    got_items.len()
                ));
                return;
            }

            for (index, (expected_item, got_item)) in
                expected_items.iter().zip(got_items.iter()).enumerate()
            {
                compare_values(&format!("{path}[{index}]"), expected_item, got_item, diffs);
            }
        }
        (expected, got) => {
            if expected != got {
                diffs.push(format!("{path}: expected {expected}, got {got}"));
            }
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}
