// ============================================================================
// Storage Adapters
// ============================================================================
//
// Implementations of the registration repository contracts.
//
// ============================================================================

mod scylla_store;

#[cfg(test)]
pub mod memory;

pub use scylla_store::{ensure_schema, ScyllaRepository};
