//! Mock implementations for testing.
//!
//! Test doubles for the clock, the key store and the output side of a
//! subscriber.

pub mod clock;
pub mod layer;
pub mod store;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use store::MockUnavailableStore;
