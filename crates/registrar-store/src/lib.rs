//! # registrar-store
//!
//! The persistence layer of the registrar core. Records form an object graph
//! that is cyclic (approver sets reference approvers, whose revisions
//! reference approver sets), so a naive cascade save would recurse forever
//! and a naive writer would rewrite rows that never changed. This crate
//! provides the three pieces that make graph saves safe and cheap:
//!
//! - a re-entrancy guard ([`domain::guard::SaveGuard`]): an explicit,
//!   call-scoped visiting set of `(kind, id)` pairs that bounds recursive
//!   descent by the number of distinct nodes, independent of how many cyclic
//!   edges exist;
//! - change detection ([`domain::content_hash::ContentHasher`]): a SHA-256
//!   digest over a record's own scalar columns, remembered at load and
//!   compared at save — an unchanged record skips its row write but still
//!   cascades into its associations;
//! - the request-scoped [`cache::PersistenceCache`]: read-through caching,
//!   cascade ordering (belongs-to parents before the row, children and join
//!   links after), and a transactional envelope that rolls the whole save
//!   back on any failure and wipes the cache after any successful write.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): rows, hashing, guard — no I/O
//! - **Ports Layer** (`ports/`): the [`ports::outbound::RecordStore`] and
//!   [`ports::outbound::TimeSource`] traits the host must provide
//! - **Adapters** (`adapters/`): the in-memory record store
//! - **Service Layer** (`cache.rs`): the persistence cache itself

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod ports;

pub use adapters::memory::MemoryStore;
pub use cache::{LinkSet, Persist, PersistenceCache, StoredRecord};
pub use domain::content_hash::{ContentHash, ContentHasher};
pub use domain::errors::StoreError;
pub use domain::guard::SaveGuard;
pub use domain::row::{from_row, row_id, to_row, Row};
pub use ports::outbound::{FixedTimeSource, RecordStore, SystemTimeSource, TimeSource};
