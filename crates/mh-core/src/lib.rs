//! memehustle/crates/mh-core/src/lib.rs
//!
//! The domain models and interface definitions for MemeHustle.

pub mod ballot;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use ballot::*;
pub use error::*;
pub use models::*;
pub use traits::*;
