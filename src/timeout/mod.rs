//! Per-request deadline enforcement.
//!
//! # Data Flow
//! ```text
//! Request enters TimeoutService
//!     → deadline.rs (derive a deadline-bound cancellable context)
//!     → capture.rs (fresh ResponseCapture replaces the real sink)
//!     → coordinator.rs (handler on its own task, raced against the deadline)
//!         Completed → commit buffered status/headers/body
//!         TimedOut  → commit policy status/body, discard buffered output
//!         Failed    → re-raise the handler's panic or error
//!     → Response to client
//! ```
//!
//! # Design Decisions
//! - Timed-out handlers are orphaned, never aborted; their late writes are absorbed
//! - The real sink is consumed by value on commit, so it is written exactly once
//! - Deadline expiry is a successful outcome, not an error

pub mod capture;
pub mod coordinator;
pub mod deadline;
pub mod layer;
pub mod policy;

pub use capture::{ResponseCapture, ResponseSink};
pub use coordinator::{Failure, Outcome, RaceCoordinator};
pub use deadline::{DeadlineExceeded, RequestDeadline};
pub use layer::{TimeoutLayer, TimeoutService};
pub use policy::{PolicyError, TimeoutPolicy, TimeoutPolicyBuilder};
