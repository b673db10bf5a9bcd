//! In-memory record store.
//!
//! The id-indexed arena backing the default runtime and every unit test:
//! BTreeMap tables per record kind, join-link sets per join table, and
//! snapshot-stack transactions. Ordered maps give `find_related` its
//! by-id ordering for free.

use crate::domain::errors::StoreError;
use crate::domain::row::Row;
use crate::ports::outbound::RecordStore;
use registrar_types::{AssociationDecl, AssociationKind, RecordId, RecordKind};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Clone, Default)]
struct StoreState {
    tables: HashMap<RecordKind, BTreeMap<RecordId, Row>>,
    /// join table name -> (left id, right id)
    links: HashMap<&'static str, BTreeSet<(RecordId, RecordId)>>,
    next_ids: HashMap<RecordKind, RecordId>,
}

/// In-memory record store with snapshot transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: StoreState,
    snapshots: Vec<StoreState>,
    row_writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: RecordKind) -> Option<&BTreeMap<RecordId, Row>> {
        self.state.tables.get(&kind)
    }

    fn association(kind: RecordKind, name: &str) -> Result<&'static AssociationDecl, StoreError> {
        kind.association(name)
            .ok_or_else(|| StoreError::UnknownAssociation {
                kind,
                name: name.to_string(),
            })
    }
}

impl RecordStore for MemoryStore {
    fn ensure_schema(&mut self, kind: RecordKind) -> Result<(), StoreError> {
        self.state.tables.entry(kind).or_default();

        for decl in kind.associations() {
            if let AssociationKind::ManyToMany { join_table, .. } = decl.kind {
                self.state.links.entry(join_table).or_default();
            }
        }

        Ok(())
    }

    fn find_by_id(&self, kind: RecordKind, id: RecordId) -> Result<Option<Row>, StoreError> {
        Ok(self.table(kind).and_then(|table| table.get(&id)).cloned())
    }

    fn find_related(
        &self,
        kind: RecordKind,
        id: RecordId,
        association: &str,
    ) -> Result<Vec<Row>, StoreError> {
        let decl = Self::association(kind, association)?;

        match decl.kind {
            AssociationKind::BelongsTo { fk_column } => {
                let own = self
                    .find_by_id(kind, id)?
                    .ok_or(StoreError::NotFound { kind, id })?;

                let target_id = own.get(fk_column).and_then(Value::as_i64).unwrap_or(0);
                if target_id == 0 {
                    return Ok(Vec::new());
                }

                Ok(self
                    .find_by_id(decl.target, target_id)?
                    .into_iter()
                    .collect())
            }
            AssociationKind::HasMany { fk_column } => {
                let rows = self
                    .table(decl.target)
                    .map(|table| {
                        table
                            .values()
                            .filter(|row| {
                                row.get(fk_column).and_then(Value::as_i64) == Some(id)
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(rows)
            }
            AssociationKind::ManyToMany { join_table, .. } => {
                let Some(links) = self.state.links.get(join_table) else {
                    return Ok(Vec::new());
                };

                let mut rows = Vec::new();

                for (left, right) in links.iter() {
                    if *left != id {
                        continue;
                    }

                    if let Some(row) = self.find_by_id(decl.target, *right)? {
                        rows.push(row);
                    }
                }

                Ok(rows)
            }
        }
    }

    fn create(&mut self, kind: RecordKind, mut row: Row) -> Result<RecordId, StoreError> {
        let table = self.state.tables.entry(kind).or_default();

        let next = self.state.next_ids.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;

        row.insert("id".to_string(), Value::from(id));
        table.insert(id, row);
        self.row_writes += 1;

        tracing::trace!(subsystem = "store", %kind, id, "row created");

        Ok(id)
    }

    fn update_columns(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        columns: Row,
    ) -> Result<(), StoreError> {
        let table = self.state.tables.entry(kind).or_default();
        let row = table.get_mut(&id).ok_or(StoreError::NotFound { kind, id })?;

        for (column, value) in columns {
            if column == "id" {
                continue;
            }

            row.insert(column, value);
        }

        self.row_writes += 1;

        tracing::trace!(subsystem = "store", %kind, id, "row updated");

        Ok(())
    }

    fn delete_where(
        &mut self,
        kind: RecordKind,
        column: &str,
        value: &Value,
    ) -> Result<u64, StoreError> {
        let table = self.state.tables.entry(kind).or_default();

        let doomed: Vec<RecordId> = table
            .iter()
            .filter(|(id, row)| {
                if column == "id" {
                    Value::from(**id) == *value
                } else {
                    row.get(column) == Some(value)
                }
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            table.remove(id);
        }

        if !doomed.is_empty() {
            self.row_writes += doomed.len() as u64;
        }

        Ok(doomed.len() as u64)
    }

    fn replace_links(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        association: &str,
        targets: &[RecordId],
    ) -> Result<(), StoreError> {
        let decl = Self::association(kind, association)?;

        let AssociationKind::ManyToMany { join_table, .. } = decl.kind else {
            return Err(StoreError::UnsupportedAssociation {
                kind,
                name: association.to_string(),
            });
        };

        let links = self.state.links.entry(join_table).or_default();
        links.retain(|(left, _)| *left != id);

        for target in targets {
            links.insert((id, *target));
        }

        Ok(())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.snapshots.push(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshots.pop().ok_or(StoreError::TransactionClosed)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.state = self.snapshots.pop().ok_or(StoreError::TransactionClosed)?;
        Ok(())
    }

    fn row_writes(&self) -> u64 {
        self.row_writes
    }
}
