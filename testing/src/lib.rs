//! Shared test fixtures for the page mirror workspace.
//!
//! Provides:
//! - `InMemoryRemote`, a `RemoteApi` fake with remote-side version semantics
//! - `MirrorFixture`, a throwaway mirror directory with file helpers
//! - `unique_id` for collision-free identifiers across tests

mod fixtures;
mod remote;

pub use fixtures::*;
pub use remote::InMemoryRemote;
