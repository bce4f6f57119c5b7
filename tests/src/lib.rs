//! Shared helpers for the inbox engine integration tests.
//!
//! Every test runs against a temporary SQLite file and scriptable
//! collaborators; no external services are needed.

pub mod fixtures;
pub mod mocks;
pub mod setup;
