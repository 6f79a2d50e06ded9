//! Profile storage module
//!
//! SQLite-backed persistence for Yapper profiles and the follow graph.

pub mod profile_store;

pub use profile_store::ProfileStore;
