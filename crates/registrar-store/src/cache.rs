//! The request-scoped persistence cache.
//!
//! One cache instance serves one logical request. Reads go through the cache
//! (a hit returns the hydrated copy without touching the store); writes run
//! the cascade save: belongs-to parents before the primary row, children and
//! join links after, the whole thing inside one transaction. A record whose
//! scalar columns hash the same as they did at load skips its row write but
//! still cascades, because a child may have changed even when the parent row
//! is byte-identical.
//!
//! Any successful outermost write wipes the entire cache. Coarse, but it
//! cannot go stale.

use crate::domain::content_hash::{ContentHash, ContentHasher};
use crate::domain::errors::StoreError;
use crate::domain::guard::SaveGuard;
use crate::domain::row::{from_row, to_row, Row};
use crate::ports::outbound::RecordStore;
use registrar_types::{RecordId, RecordKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// A record type the store knows how to persist.
pub trait StoredRecord: Serialize + DeserializeOwned + Clone {
    const KIND: RecordKind;

    fn id(&self) -> RecordId;

    /// Assign the id the store handed out. Errors if the record already has
    /// one or the id is not positive.
    fn assign_id(&mut self, id: RecordId) -> Result<(), StoreError>;
}

/// The join links a record wants written alongside its row.
#[derive(Debug, Clone)]
pub struct LinkSet {
    pub association: &'static str,
    pub targets: Vec<RecordId>,
}

impl LinkSet {
    pub fn new(association: &'static str, targets: Vec<RecordId>) -> Self {
        Self {
            association,
            targets,
        }
    }
}

/// A record that participates in cascade saves.
///
/// The default hooks do nothing; record types override them to descend into
/// their associations. Cross-record edges are followed through cache-resident
/// copies (see [`PersistenceCache::resident`]), which together with the
/// [`SaveGuard`] bounds recursion by the number of distinct nodes in the
/// graph.
pub trait Persist: StoredRecord {
    /// Save belongs-to parents before this record's row, so foreign keys
    /// exist by the time the row is written.
    fn save_parents<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        let _ = (cache, guard);
        Ok(())
    }

    /// Save has-many and many-to-many children after this record's row.
    fn save_children<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        let _ = (cache, guard);
        Ok(())
    }

    /// Join links to (re)write for this record, or `None` when the record's
    /// association lists were never hydrated and the stored links must be
    /// left alone.
    fn links(&self) -> Option<Vec<LinkSet>> {
        None
    }
}

struct CacheEntry {
    row: Row,
    hash: ContentHash,
}

/// Request-scoped record cache and save coordinator.
pub struct PersistenceCache<S: RecordStore> {
    store: S,
    entries: HashMap<(RecordKind, RecordId), CacheEntry>,
    cache_hits: u64,
    cache_misses: u64,
    tx_depth: u32,
}

impl<S: RecordStore> PersistenceCache<S> {
    /// Wrap a store, running the additive schema-ensure for every record
    /// kind.
    pub fn new(mut store: S) -> Result<Self, StoreError> {
        for kind in RecordKind::ALL {
            store.ensure_schema(kind)?;
        }

        Ok(Self {
            store,
            entries: HashMap::new(),
            cache_hits: 0,
            cache_misses: 0,
            tx_depth: 0,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drop every cached record.
    pub fn wipe(&mut self) {
        self.entries.clear();
    }

    /// Evict one record from the cache.
    pub fn purge<T: StoredRecord>(&mut self, id: RecordId) {
        self.entries.remove(&(T::KIND, id));
    }

    pub fn purge_kind(&mut self, kind: RecordKind, id: RecordId) {
        self.entries.remove(&(kind, id));
    }

    /// Cache stats for a request log line.
    pub fn stats_log(&self) -> String {
        format!("H:{} M:{}", self.cache_hits, self.cache_misses)
    }

    /// The content hash remembered for a record at its last load or save.
    pub fn loaded_hash(&self, kind: RecordKind, id: RecordId) -> Option<ContentHash> {
        self.entries.get(&(kind, id)).map(|entry| entry.hash)
    }

    /// A hydrated copy of a cached record, without touching the store.
    pub fn resident<T: StoredRecord>(&self, id: RecordId) -> Option<T> {
        self.entries
            .get(&(T::KIND, id))
            .and_then(|entry| from_row(entry.row.clone()).ok())
    }

    /// Fetch a record by id, through the cache.
    pub fn find_by_id<T: StoredRecord>(&mut self, id: RecordId) -> Result<T, StoreError> {
        self.try_find_by_id(id)?
            .ok_or(StoreError::NotFound { kind: T::KIND, id })
    }

    /// Fetch a record by id, returning `None` when it does not exist.
    pub fn try_find_by_id<T: StoredRecord>(&mut self, id: RecordId) -> Result<Option<T>, StoreError> {
        if let Some(entry) = self.entries.get(&(T::KIND, id)) {
            self.cache_hits += 1;
            return Ok(Some(from_row(entry.row.clone())?));
        }

        let Some(row) = self.store.find_by_id(T::KIND, id)? else {
            return Ok(None);
        };

        self.cache_misses += 1;
        self.remember(T::KIND, id, row.clone())?;

        Ok(Some(from_row(row)?))
    }

    /// Fetch the records related to an owner through a declared association,
    /// caching each one.
    pub fn related<T: StoredRecord>(
        &mut self,
        owner_kind: RecordKind,
        owner_id: RecordId,
        association: &str,
    ) -> Result<Vec<T>, StoreError> {
        let rows = self.store.find_related(owner_kind, owner_id, association)?;
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let id = crate::domain::row::row_id(&row);
            if id != 0 && !self.entries.contains_key(&(T::KIND, id)) {
                self.remember(T::KIND, id, row.clone())?;
            }

            records.push(from_row(row)?);
        }

        Ok(records)
    }

    /// Ids of the records related through a declared association.
    pub fn related_ids(
        &mut self,
        owner_kind: RecordKind,
        owner_id: RecordId,
        association: &str,
    ) -> Result<Vec<RecordId>, StoreError> {
        let rows = self.store.find_related(owner_kind, owner_id, association)?;
        Ok(rows.iter().map(crate::domain::row::row_id).collect())
    }

    /// Run `f` inside a transaction. The outermost frame commits (wiping the
    /// cache) or rolls back; nested calls just join the ambient transaction.
    pub fn transaction<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<R, E>,
    {
        if self.tx_depth == 0 {
            self.store.begin()?;
        }

        self.tx_depth += 1;
        let result = f(self);
        self.tx_depth -= 1;

        if self.tx_depth > 0 {
            return result;
        }

        match result {
            Ok(value) => {
                self.store.commit()?;
                self.wipe();
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::error!(subsystem = "store", error = %rollback_err, "rollback failed");
                }
                self.wipe();
                Err(err)
            }
        }
    }

    /// Cycle-safe cascade save of a record and its associated records,
    /// inside one transaction.
    pub fn save<T: Persist>(&mut self, record: &mut T) -> Result<(), StoreError> {
        self.transaction(|cache| {
            let mut guard = SaveGuard::new();
            cache.save_node(record, &mut guard)
        })
    }

    /// One node of the cascade. Callers outside the crate reach this from
    /// `Persist` hooks to descend into their associations.
    pub fn save_node<T: Persist>(
        &mut self,
        record: &mut T,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if !guard.enter(T::KIND, record.id()) {
            return Ok(());
        }

        record.save_parents(self, guard)?;

        let row = to_row(record)?;
        let hash = ContentHasher::digest_row(&row)?;

        if record.id() == 0 {
            let id = self.store.create(T::KIND, row)?;
            record.assign_id(id)?;
            guard.mark(T::KIND, id);

            tracing::debug!(subsystem = "store", kind = %T::KIND, id, "record created");
        } else if self.loaded_hash(T::KIND, record.id()) != Some(hash) {
            self.store.update_columns(T::KIND, record.id(), row)?;

            tracing::debug!(subsystem = "store", kind = %T::KIND, id = record.id(), "record updated");
        } else {
            tracing::trace!(
                subsystem = "store",
                kind = %T::KIND,
                id = record.id(),
                hash = %hash.short_hex(),
                "unchanged, row write skipped"
            );
        }

        // Refresh the cached copy so mid-transaction reads and later hash
        // comparisons see what was just written.
        let current = to_row(record)?;
        self.remember(T::KIND, record.id(), current)?;

        if let Some(link_sets) = record.links() {
            for link_set in link_sets {
                self.store.replace_links(
                    T::KIND,
                    record.id(),
                    link_set.association,
                    &link_set.targets,
                )?;
            }
        }

        record.save_children(self, guard)?;

        Ok(())
    }

    /// Save a cache-resident record by id as part of an ongoing cascade.
    /// A record that was never loaded in this request is skipped: there is
    /// no in-memory state to write for it.
    pub fn save_resident<T: Persist>(
        &mut self,
        id: RecordId,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if guard.visited(T::KIND, id) {
            return Ok(());
        }

        if let Some(mut record) = self.resident::<T>(id) {
            self.save_node(&mut record, guard)?;
        }

        Ok(())
    }

    /// Update specific columns of a record and evict it from the cache.
    pub fn update_columns<T: StoredRecord>(
        &mut self,
        id: RecordId,
        columns: Row,
    ) -> Result<(), StoreError> {
        self.transaction(|cache| cache.store.update_columns(T::KIND, id, columns))?;
        self.purge::<T>(id);
        Ok(())
    }

    fn remember(&mut self, kind: RecordKind, id: RecordId, row: Row) -> Result<(), StoreError> {
        let hash = ContentHasher::digest_row(&row)?;
        self.entries.insert((kind, id), CacheEntry { row, hash });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use serde::Deserialize;

    // Two minimal record types that reference each other, enough to model
    // the approver-set/approver cycle at the store level. The edge id lists
    // are ordinary columns here so resident copies keep them.

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Team {
        id: RecordId,
        name: String,
        member_ids: Vec<RecordId>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Member {
        id: RecordId,
        name: String,
        team_ids: Vec<RecordId>,
    }

    impl StoredRecord for Team {
        const KIND: RecordKind = RecordKind::ApproverSet;

        fn id(&self) -> RecordId {
            self.id
        }

        fn assign_id(&mut self, id: RecordId) -> Result<(), StoreError> {
            if self.id != 0 {
                return Err(StoreError::IdAlreadyAssigned { kind: Self::KIND });
            }
            if id <= 0 {
                return Err(StoreError::InvalidId { id });
            }
            self.id = id;
            Ok(())
        }
    }

    impl Persist for Team {
        fn save_children<S: RecordStore>(
            &mut self,
            cache: &mut PersistenceCache<S>,
            guard: &mut SaveGuard,
        ) -> Result<(), StoreError> {
            for member_id in self.member_ids.clone() {
                cache.save_resident::<Member>(member_id, guard)?;
            }
            Ok(())
        }
    }

    impl StoredRecord for Member {
        const KIND: RecordKind = RecordKind::Approver;

        fn id(&self) -> RecordId {
            self.id
        }

        fn assign_id(&mut self, id: RecordId) -> Result<(), StoreError> {
            if self.id != 0 {
                return Err(StoreError::IdAlreadyAssigned { kind: Self::KIND });
            }
            if id <= 0 {
                return Err(StoreError::InvalidId { id });
            }
            self.id = id;
            Ok(())
        }
    }

    impl Persist for Member {
        fn save_children<S: RecordStore>(
            &mut self,
            cache: &mut PersistenceCache<S>,
            guard: &mut SaveGuard,
        ) -> Result<(), StoreError> {
            for team_id in self.team_ids.clone() {
                cache.save_resident::<Team>(team_id, guard)?;
            }
            Ok(())
        }
    }

    fn cache() -> PersistenceCache<MemoryStore> {
        PersistenceCache::new(MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_create_assigns_id_and_wipes_cache() {
        let mut cache = cache();
        let mut team = Team {
            id: 0,
            name: "infosec".to_string(),
            member_ids: vec![],
        };

        cache.save(&mut team).unwrap();
        assert_eq!(team.id, 1);

        // Wipe on successful save: the next read is a miss.
        let _: Team = cache.find_by_id(team.id).unwrap();
        assert_eq!(cache.stats_log(), "H:0 M:1");
    }

    #[test]
    fn test_read_through_cache_hits() {
        let mut cache = cache();
        let mut team = Team {
            id: 0,
            name: "infosec".to_string(),
            member_ids: vec![],
        };
        cache.save(&mut team).unwrap();

        let _: Team = cache.find_by_id(team.id).unwrap();
        let _: Team = cache.find_by_id(team.id).unwrap();
        assert_eq!(cache.stats_log(), "H:1 M:1");
    }

    #[test]
    fn test_unchanged_record_skips_row_write() {
        let mut cache = cache();
        let mut team = Team {
            id: 0,
            name: "infosec".to_string(),
            member_ids: vec![],
        };
        cache.save(&mut team).unwrap();

        let mut loaded: Team = cache.find_by_id(team.id).unwrap();
        let writes_before = cache.store().row_writes();

        cache.save(&mut loaded).unwrap();
        assert_eq!(cache.store().row_writes(), writes_before);

        // A real change writes again.
        let mut loaded: Team = cache.find_by_id(team.id).unwrap();
        loaded.name = "operations".to_string();
        cache.save(&mut loaded).unwrap();
        assert_eq!(cache.store().row_writes(), writes_before + 1);
    }

    #[test]
    fn test_cyclic_graph_save_terminates_and_visits_once() {
        let mut cache = cache();

        let mut team = Team {
            id: 0,
            name: "ring".to_string(),
            member_ids: vec![],
        };
        cache.save(&mut team).unwrap();

        let mut member = Member {
            id: 0,
            name: "alice".to_string(),
            team_ids: vec![team.id],
        };
        cache.save(&mut member).unwrap();

        // Close the loop, then reload both sides so the cache holds the
        // settled rows and their hashes.
        let mut looped: Team = cache.find_by_id(team.id).unwrap();
        looped.member_ids = vec![member.id];
        cache.save(&mut looped).unwrap();

        let mut team: Team = cache.find_by_id(team.id).unwrap();
        let _member: Member = cache.find_by_id(member.id).unwrap();

        let writes_before = cache.store().row_writes();

        let mut guard = SaveGuard::new();
        cache
            .transaction(|c| c.save_node(&mut team, &mut guard))
            .unwrap();

        // Each node entered at most once, and neither row changed.
        assert_eq!(guard.len(), 2);
        assert_eq!(cache.store().row_writes(), writes_before);
    }

    #[test]
    fn test_save_failure_rolls_back_everything() {
        let mut cache = cache();
        let mut team = Team {
            id: 0,
            name: "ops".to_string(),
            member_ids: vec![],
        };
        cache.save(&mut team).unwrap();
        let team_id = team.id;

        let result: Result<(), StoreError> = cache.transaction(|c| {
            let mut renamed: Team = c.find_by_id(team_id)?;
            renamed.name = "renamed".to_string();
            let mut guard = SaveGuard::new();
            c.save_node(&mut renamed, &mut guard)?;

            Err(StoreError::InvalidId { id: -1 })
        });
        assert!(result.is_err());

        let reloaded: Team = cache.find_by_id(team_id).unwrap();
        assert_eq!(reloaded.name, "ops");
    }

    #[test]
    fn test_nested_transaction_joins_outer() {
        let mut cache = cache();

        let team_id = cache
            .transaction(|c| {
                let mut team = Team {
                    id: 0,
                    name: "outer".to_string(),
                    member_ids: vec![],
                };
                c.save(&mut team)?; // joins the ambient transaction

                let mut member = Member {
                    id: 0,
                    name: "inner".to_string(),
                    team_ids: vec![team.id],
                };
                c.save(&mut member)?;

                Ok::<_, StoreError>(team.id)
            })
            .unwrap();

        let team: Team = cache.find_by_id(team_id).unwrap();
        assert_eq!(team.name, "outer");
    }

    #[test]
    fn test_update_columns_purges_entry() {
        let mut cache = cache();
        let mut team = Team {
            id: 0,
            name: "before".to_string(),
            member_ids: vec![],
        };
        cache.save(&mut team).unwrap();
        let _: Team = cache.find_by_id(team.id).unwrap(); // prime the cache

        let mut columns = Row::new();
        columns.insert("name".to_string(), serde_json::json!("after"));
        cache.update_columns::<Team>(team.id, columns).unwrap();

        let reloaded: Team = cache.find_by_id(team.id).unwrap();
        assert_eq!(reloaded.name, "after");
    }

    #[test]
    fn test_missing_record_not_found() {
        let mut cache = cache();

        let result: Result<Team, _> = cache.find_by_id(404);
        assert!(matches!(result, Err(StoreError::NotFound { .. })));

        let maybe: Option<Team> = cache.try_find_by_id(404).unwrap();
        assert!(maybe.is_none());
    }
}
