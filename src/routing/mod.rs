//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Facade call (read / write / transaction)
//!     → classifier.rs (statement text starts with a write keyword?)
//!     → router.rs
//!         write or transaction      → primary
//!         read, by ReadPolicy:
//!             master                → primary
//!             slave                 → replica or error
//!             master_first          → primary if it answers, else replica, else primary
//!             slave_first           → replica, else primary
//!     → Return: Route (pool + which node)
//! ```
//!
//! # Design Decisions
//! - Writes never touch a replica, whatever the policy
//! - The classifier is the only text-based rule; it can only move a read
//!   to the primary, never a write to a replica
//! - Fallbacks are logged and counted, not hidden

pub mod classifier;
pub mod router;

pub use classifier::{classify, StatementKind};
pub use router::{Route, Router, Target};
