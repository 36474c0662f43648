//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Opening a pool at startup:
//!     → retries.rs (retry connect with backoff)
//!     → backoff.rs (exponential delay + jitter)
//!
//! Probing a node:
//!     → timeouts.rs (bound the probe so a hung node cannot stall callers)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every liveness probe has a deadline
//! - Retries cover connectivity only; statements are never replayed
//! - Jittered backoff prevents every replica reconnecting in lockstep

pub mod backoff;
pub mod retries;
pub mod timeouts;
