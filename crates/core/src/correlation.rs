//! Result-channel correlation identifiers
//!
//! A correlation id is an `(owner, result)` pair: the owner identifies the
//! requesting handle, the result string disambiguates multiple concurrent
//! requests from the same handle (e.g. two call sites on one screen).
//!
//! A correlation id is stamped into an instance's *persistent* metadata under
//! the well-known [`result_channel_key`] before that instance is opened, so a
//! pending request survives persistence. The built-in codecs for these types
//! are registered by `CodecRegistry::with_defaults`.

use crate::metadata::MetadataKey;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a result-requesting handle
///
/// An OwnerId is a wrapper around a UUID v4. Each `ResultChannel` owns one;
/// every request that channel issues shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Create a new random OwnerId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an OwnerId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this OwnerId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one specific waiting result observer
///
/// Two requests from the same handle differ in `result`; two handles always
/// differ in `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId {
    /// The requesting handle
    pub owner: OwnerId,
    /// Disambiguates concurrent requests from one handle
    pub result: String,
}

impl CorrelationId {
    /// Create a correlation id for `owner`'s request named `result`
    pub fn new(owner: OwnerId, result: impl Into<String>) -> Self {
        Self {
            owner,
            result: result.into(),
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.result)
    }
}

/// Well-known metadata key under which a correlation id is stamped
///
/// Persistent by design: a pending request must survive the persistence
/// boundary to be deliverable after restoration.
pub fn result_channel_key() -> &'static MetadataKey<Option<CorrelationId>> {
    static KEY: Lazy<MetadataKey<Option<CorrelationId>>> =
        Lazy::new(|| MetadataKey::persistent("waypoint.result_channel", None));
    &KEY
}
