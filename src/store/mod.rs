//! Consistency record persistence.
//!
//! `ConsistencyStore` is the contract the core consumes; a production
//! deployment backs it with the same database that holds the business data
//! so the record commits atomically with the business change.
//! `InMemoryConsistencyStore` is the reference implementation.

mod error;
mod in_memory;
mod store;

pub use error::StoreError;
pub use in_memory::InMemoryConsistencyStore;
pub use store::ConsistencyStore;
