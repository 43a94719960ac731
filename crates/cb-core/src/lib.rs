//! confession-board/crates/cb-core/src/lib.rs
//!
//! The central domain model, pure logic and port definitions for
//! Confession Board.

pub mod error;
pub mod fingerprint;
pub mod media;
pub mod models;
pub mod tally;
pub mod thread;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use fingerprint::*;
pub use media::*;
pub use models::*;
pub use tally::*;
pub use thread::*;
pub use traits::*;
