//! Core types for the Waypoint navigation engine
//!
//! This crate defines the foundational types used throughout the system:
//! - NavigationKey / ResultKey: typed screen intents
//! - InstanceId: unique identifier for realized backstack entries
//! - Instance: a realized occurrence of a key in a backstack
//! - Metadata: typed key-value bag attached to an instance
//! - CodecRegistry: type-to-codec registry for persistent metadata
//! - CorrelationId: result-channel correlation pair
//! - Payload: type-erased completion value with a runtime type tag
//! - Transition: closed/opened sets between two backstack snapshots
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod correlation;
pub mod error;
pub mod instance;
pub mod key;
pub mod metadata;
pub mod payload;
pub mod transition;

// Re-export commonly used types
pub use codec::{CodecPolicy, CodecRegistry, MetadataCodec};
pub use correlation::{result_channel_key, CorrelationId, OwnerId};
pub use error::{Error, Result};
pub use instance::{Instance, InstanceId};
pub use key::{NavigationKey, ResultKey, TypeDescriptor};
pub use metadata::{Metadata, MetadataKey};
pub use payload::Payload;
pub use transition::Transition;
