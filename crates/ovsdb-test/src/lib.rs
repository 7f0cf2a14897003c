//! Test infrastructure for OVSDB clients
//!
//! Provides:
//! - An in-memory database implementing the transaction seam
//! - Fixtures for the northbound and southbound global tables

mod fake;
pub mod fixtures;

pub use fake::FakeOvsdb;
pub use fixtures::*;
