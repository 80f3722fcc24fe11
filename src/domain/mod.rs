//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts and invariants of the filter:
//! - Filter key construction
//! - Per-key observation records
//! - Duplicate and burst suppression policies
//! - Operating modes
//!
//! All types in this layer are pure and easily testable.

pub mod key;
pub mod mode;
pub mod policy;
pub mod record;
