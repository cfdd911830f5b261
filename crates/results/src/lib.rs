//! Typed result correlation for the navigation engine
//!
//! This crate routes completion values from instances that close back to the
//! callers that opened them:
//! - ResultRegistry: controller-wide store of pending results and active
//!   observers, enforcing at-most-one observer per correlation id and
//!   exactly-once delivery
//! - ResultChannel: a typed caller-facing handle that stamps correlation ids
//!   and registers `T`-typed callbacks
//! - SilencePolicy: how silent closes interact with delivery
//!
//! The engine records close events while committing a transition and asks the
//! registry to deliver once its execution guard has been released, so result
//! callbacks are free to navigate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod registry;

pub use channel::{ResultChannel, ResultSubscription};
pub use registry::{CloseEvent, ResultOutcome, ResultRegistry, SilencePolicy};
