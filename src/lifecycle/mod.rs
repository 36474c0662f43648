//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Cluster start:
//!     Shutdown::new() → health task subscribes
//!
//! Cluster close:
//!     Shutdown::trigger() → health task exits → pools closed
//! ```
//!
//! # Design Decisions
//! - Background tasks observe one broadcast signal instead of polling flags
//! - Triggering more than once is harmless

pub mod shutdown;

pub use shutdown::Shutdown;
