//! # Roster Testkit
//!
//! Shared fixtures for integration tests: deterministic named users
//! (alice, bob, eve, ...) and helpers for the common team setups.

pub mod fixtures;

pub use fixtures::{founder_team, join_as_member, TestUser};

/// Install a tracing subscriber that writes to the test output. Safe to
/// call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
