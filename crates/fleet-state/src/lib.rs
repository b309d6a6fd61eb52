//! fleet-state: domain types and durable storage for fleetgrid.
//!
//! Backed by [redb](https://docs.rs/redb). The worker registry is kept in
//! memory and persisted as a single JSON snapshot blob after every
//! mutation; the store only has to save and load that blob.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
