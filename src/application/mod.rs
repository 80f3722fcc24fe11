//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Record registry (shared per-key state)
//! - Suppressors (a policy bound to the registry)
//! - Log filter (mode dispatch, lifecycle, fail-open handling)
//! - Idle sweeper (optional periodic cleanup)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod filter;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod suppressor;

#[cfg(feature = "async")]
pub mod sweeper;
