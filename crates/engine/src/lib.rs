//! Navigation instruction engine
//!
//! This crate implements the executable half of Waypoint:
//! - Operation: the closed command algebra (open/close/complete/aggregate/side-effect)
//! - OperationInterceptor / InterceptorChain: ordered transformers and vetoers
//!   of in-flight operations, applied local-first then controller-wide
//! - Container: owner of one backstack, committing transitions under a
//!   single-flight reentrancy guard
//! - NavigationController: the owning object wiring global interceptors, the
//!   result registry, and the codec registry together
//!
//! The engine assumes a single logical thread of control per container. The
//! reentrancy guard detects and rejects same-thread re-entry; it is not a
//! cross-thread coordination primitive.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod controller;
pub mod interceptor;
pub mod operation;

pub use container::{BackstackSubscription, Container, ContainerKey, ExecutionOutcome};
pub use controller::{ControllerBuilder, NavigationController};
pub use interceptor::{FnInterceptor, Intercepted, InterceptorChain, OperationInterceptor};
pub use operation::{Operation, SideEffect};

// Re-export the foundational types alongside the engine surface
pub use waypoint_core::{
    CodecPolicy, CodecRegistry, CorrelationId, Error, Instance, InstanceId, Metadata, MetadataKey,
    NavigationKey, OwnerId, Payload, Result, ResultKey, Transition, TypeDescriptor,
};
pub use waypoint_results::{ResultChannel, ResultRegistry, ResultSubscription, SilencePolicy};
