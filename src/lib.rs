//! Waypoint - a declarative, typed navigation instruction engine
//!
//! Waypoint models navigation as data: callers describe *where to go* as a
//! typed key, the engine realizes keys into backstack instances, and every
//! change flows through a single operation pipeline that can be observed,
//! intercepted, and correlated back to the caller that asked for it.
//!
//! # Quick Start
//!
//! ```ignore
//! use waypoint::{ContainerKey, Instance, NavigationController, Operation};
//!
//! #[derive(Debug)]
//! struct Settings;
//!
//! impl waypoint::NavigationKey for Settings {
//!     fn as_any(&self) -> &dyn std::any::Any {
//!         self
//!     }
//! }
//!
//! let controller = NavigationController::new();
//! let container = controller.new_container(ContainerKey::new("root"), None);
//!
//! container.execute(Operation::open(Instance::new(Settings)))?;
//! ```
//!
//! # Architecture
//!
//! All mutation goes through [`Container::execute`], which runs the local and
//! global interceptor chains, applies the operation against a snapshot,
//! derives the transition, and publishes the new backstack under a
//! single-flight guard. Typed results travel through the controller's
//! [`ResultRegistry`] and are delivered exactly once.
//!
//! Internal layering (core types, engine, results) is not exposed - only the
//! engine API is public.

// Re-export the public API from waypoint-engine
pub use waypoint_engine::*;
