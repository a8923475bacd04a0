//! gs-core: shared foundation for gridseq.
//!
//! Contains:
//! - error (shared error taxonomy)
//! - ids (component identifiers, step/stage numbers)
//! - keys (optimization container keys)
//! - period (resolution / interval arithmetic)
//! - timing (wall-clock timers for build and solve phases)

pub mod error;
pub mod ids;
pub mod keys;
pub mod period;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{GsError, GsResult};
pub use ids::*;
pub use keys::{ArtifactKind, ContainerKey};
pub use period::{Resolution, periods_in};
