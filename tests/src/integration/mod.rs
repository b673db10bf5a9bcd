//! Integration tests.

mod approval_flows;
mod persistence;
mod support;
