//! Client-side note synchronization engine
//!
//! This library keeps a local, optimistic copy of a user's notes in step with
//! a remote REST API: it tracks unsaved drafts, reconciles server responses
//! with local edits, and derives the filtered list view a UI renders.

mod api;
mod clock;
mod config;
mod drafts;
mod errors;
mod filter;
mod logging;
mod note;
mod reconcile;
mod shared;
mod store;
mod sweeper;
mod types;

#[cfg(test)]
mod testing;

// Re-export key components
pub use api::*;
pub use clock::*;
pub use config::*;
pub use drafts::*;
pub use errors::*;
pub use filter::*;
pub use logging::*;
pub use note::*;
pub use reconcile::*;
pub use shared::*;
pub use store::*;
pub use sweeper::*;
pub use types::*;
