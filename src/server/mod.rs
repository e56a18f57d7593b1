//! HTTP surface
//!
//! Thin axum layer over the resolver: path segments become a
//! `LookupDescriptor`, results are returned as JSON option lists.

pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
