//! Durable job persistence.
//!
//! The whole job collection lives in one JSON document on disk and in an
//! ordered in-memory index. See [`JobStore`].

pub mod store;

pub use store::{JobStore, StoreError};
