//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the persistence cache requires from its host.

use crate::domain::errors::StoreError;
use crate::domain::row::Row;
use registrar_types::{RecordId, RecordKind};
use serde_json::Value;

/// Abstract interface for the relational record store.
///
/// Production backends map this onto their SQL layer; tests and the default
/// runtime use [`crate::adapters::memory::MemoryStore`]. All lookups are
/// keyed by integer primary keys and the association catalog declared on
/// [`RecordKind`].
pub trait RecordStore {
    /// Additively ensure the schema for one record kind exists. Run for
    /// every kind at startup; never destructive.
    fn ensure_schema(&mut self, kind: RecordKind) -> Result<(), StoreError>;

    /// Fetch one row by primary key.
    fn find_by_id(&self, kind: RecordKind, id: RecordId) -> Result<Option<Row>, StoreError>;

    /// Fetch the rows related to `(kind, id)` through a declared
    /// association, ordered by id.
    fn find_related(
        &self,
        kind: RecordKind,
        id: RecordId,
        association: &str,
    ) -> Result<Vec<Row>, StoreError>;

    /// Insert a row, assigning and returning its primary key.
    fn create(&mut self, kind: RecordKind, row: Row) -> Result<RecordId, StoreError>;

    /// Overwrite the given columns of an existing row.
    fn update_columns(&mut self, kind: RecordKind, id: RecordId, columns: Row)
        -> Result<(), StoreError>;

    /// Delete all rows whose column equals `value`; returns the count.
    fn delete_where(
        &mut self,
        kind: RecordKind,
        column: &str,
        value: &Value,
    ) -> Result<u64, StoreError>;

    /// Replace the join-table links of a many-to-many association so that
    /// `(id, target)` rows exist exactly for `targets`.
    fn replace_links(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        association: &str,
        targets: &[RecordId],
    ) -> Result<(), StoreError>;

    /// Open a transaction. Transactions nest; an inner commit only closes
    /// the inner frame.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Commit the innermost open transaction.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Roll the innermost open transaction back, restoring every row and
    /// link it touched.
    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Rows created or updated so far; diagnostics only.
    fn row_writes(&self) -> u64 {
        0
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource {
    /// Current timestamp in seconds since epoch.
    fn now(&self) -> u64;
}

/// Default time source using system time.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Fixed time source for unit tests.
pub struct FixedTimeSource(pub u64);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.0
    }
}
