//! Conversation thread stores for Nexus.
//!
//! All stores implement the `nexus_core::ThreadStore` trait.

pub mod in_memory;

pub use in_memory::InMemoryThreadStore;

use std::time::Duration;

/// Build the thread store described by the `[sessions]` config section.
pub fn build_from_config(config: &nexus_config::SessionsConfig) -> InMemoryThreadStore {
    InMemoryThreadStore::with_eviction(
        config.idle_ttl_secs.map(Duration::from_secs),
        config.max_threads,
    )
}
