//! Document store
//!
//! Typed key-value document storage with point reads/writes, atomic
//! closure-based updates, server-assigned timestamps, per-document TTL and
//! push subscriptions. The production system behind this interface is a
//! hosted document database; the in-memory engine here implements the same
//! logical contract and is what every other component is written against.
//!
//! Handles are explicitly constructed and injected into their consumers;
//! there is no ambient global store.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::{Collection, DocEntry, DocSnapshot};
