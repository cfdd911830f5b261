//! Realized occurrences of navigation keys
//!
//! An [`Instance`] is one occurrence of a key in a backstack: the key, a
//! stable random id assigned at construction, and a metadata bag. Two
//! instances of an identical key are distinct because their ids differ.
//!
//! Instances are created when an `Open` operation is *constructed*, not when
//! it is committed, so correlation data can be stamped before the open is
//! executed. After creation an instance is never mutated structurally; only
//! metadata set/remove is permitted, and identity/equality hinge on the id
//! alone.

use crate::correlation::{result_channel_key, CorrelationId};
use crate::key::NavigationKey;
use crate::metadata::Metadata;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a realized backstack entry
///
/// An InstanceId is a wrapper around a UUID v4, assigned once at instance
/// construction and stable for the instance's whole life (including across
/// the persistence boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Create a new random InstanceId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an InstanceId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this InstanceId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A realized occurrence of a key in a backstack
///
/// Cloning an instance is cheap (the key is shared, the metadata is a shared
/// handle) and preserves identity: a clone in a backstack snapshot is "the
/// same instance" for every purpose in the engine.
#[derive(Clone)]
pub struct Instance {
    key: Arc<dyn NavigationKey>,
    id: InstanceId,
    metadata: Metadata,
}

impl Instance {
    /// Realize `key` with a fresh random id and empty metadata
    pub fn new(key: impl NavigationKey) -> Self {
        Self::from_arc(Arc::new(key))
    }

    /// Realize an already-shared key
    pub fn from_arc(key: Arc<dyn NavigationKey>) -> Self {
        Self {
            key,
            id: InstanceId::new(),
            metadata: Metadata::new(),
        }
    }

    /// The key this instance realizes
    pub fn key(&self) -> &dyn NavigationKey {
        self.key.as_ref()
    }

    /// Shared handle to the key
    pub fn key_arc(&self) -> Arc<dyn NavigationKey> {
        Arc::clone(&self.key)
    }

    /// Downcast the key to a concrete key type
    pub fn key_as<K: NavigationKey>(&self) -> Option<&K> {
        self.key().downcast_ref::<K>()
    }

    /// Stable unique id of this instance
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The instance's metadata bag
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Whether this instance's key declares a typed result expectation
    pub fn expects_result(&self) -> bool {
        self.key.expected_result().is_some()
    }

    // === Correlation stamping ===

    /// The correlation id stamped on this instance, if any
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.metadata.get(result_channel_key())
    }

    /// Stamp a correlation id into this instance's metadata
    ///
    /// Must happen before the instance is opened for the result to be
    /// trackable; the shared metadata cell makes later stamping visible to
    /// snapshots, but the registry only tags instances at close time.
    pub fn set_correlation_id(&self, correlation: CorrelationId) {
        self.metadata.set(result_channel_key(), Some(correlation));
    }

    /// Remove any correlation stamp from this instance
    pub fn clear_correlation_id(&self) {
        self.metadata.remove(result_channel_key());
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("metadata", &self.metadata)
            .finish()
    }
}
