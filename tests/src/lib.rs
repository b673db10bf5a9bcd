//! # Registrar Test Suite
//!
//! Cross-crate tests: the end-to-end approval, decline and cancel flows of
//! the workflow service, and the persistence properties of the cycle-safe
//! cache, exercised against the in-memory store.

#[cfg(test)]
mod integration;
