//! Record stores
//!
//! The resolver reads records through the `RecordStore` trait so the same
//! lookup logic runs against fixtures in memory or a Postgres database.

pub mod fixtures;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;
pub mod sql;
pub mod traits;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::PgStore;
pub use traits::{LinkQuery, RecordStore, StoreError};
