//! Persistence for tallydeck
//!
//! This module provides two layers:
//! - **kv**: the injected key-value capability and its backends
//! - **gateway**: the entry-level reader/writer the store talks to

pub mod gateway;
pub mod kv;

// Re-export commonly used types
pub use gateway::{PersistenceGateway, RawState};
pub use kv::{FileStore, KeyValueStore, StorageError};
