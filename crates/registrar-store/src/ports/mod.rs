//! # Ports Layer
//!
//! Trait definitions the host application implements for the persistence
//! layer.
//!
//! - `outbound.rs` - Driven ports (record store, time source)

pub mod outbound;
