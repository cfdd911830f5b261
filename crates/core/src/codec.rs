//! Type-to-codec registry for persistent metadata
//!
//! Persistent metadata values are type-erased, so the persistence boundary
//! needs an explicit registry mapping a value's [`TypeDescriptor`] to an
//! encode/decode pair. The registry is consulted in two places:
//!
//! 1. **Commit boundary**: when an `Open` operation passes through the
//!    engine, every persistent entry of the opened instance is verified to
//!    have a codec. Severity is governed by [`CodecPolicy`].
//! 2. **Persistence boundary**: [`CodecRegistry::encode_metadata`] and
//!    [`CodecRegistry::decode_value`] perform the actual conversion. The
//!    on-disk format itself is owned by the (external) persistence layer.
//!
//! The registry is an explicit object owned by a controller, never a global.

use crate::correlation::CorrelationId;
use crate::error::{Error, Result};
use crate::key::TypeDescriptor;
use crate::metadata::Metadata;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// Severity of the missing-codec check
///
/// The check is never silently swallowed: `Enforce` fails the operation,
/// `Warn` logs through `tracing` and lets it proceed with undefined
/// persistence behavior for the offending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPolicy {
    /// Missing codec is an error (`Error::MissingCodec`)
    Enforce,
    /// Missing codec logs a warning and proceeds
    Warn,
}

impl Default for CodecPolicy {
    /// Enforce in debug builds, warn in release builds
    fn default() -> Self {
        if cfg!(debug_assertions) {
            CodecPolicy::Enforce
        } else {
            CodecPolicy::Warn
        }
    }
}

type EncodeFn = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Result<serde_json::Value> + Send + Sync>;
type DecodeFn = Box<dyn Fn(serde_json::Value) -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync>;

/// Encode/decode pair for one concrete metadata value type
pub struct MetadataCodec {
    descriptor: TypeDescriptor,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl MetadataCodec {
    /// Build the serde-backed codec for `T`
    pub fn of<T>() -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        let descriptor = TypeDescriptor::of::<T>();
        MetadataCodec {
            descriptor,
            encode: Box::new(move |value| {
                let typed = value.downcast_ref::<T>().ok_or_else(|| {
                    Error::Serialization(format!(
                        "codec for {} received a value of another type",
                        descriptor
                    ))
                })?;
                serde_json::to_value(typed).map_err(Error::from)
            }),
            decode: Box::new(|json| {
                let typed: T = serde_json::from_value(json)?;
                Ok(Arc::new(typed) as Arc<dyn Any + Send + Sync>)
            }),
        }
    }

    /// Descriptor of the type this codec handles
    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }
}

impl std::fmt::Debug for MetadataCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCodec")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Registry mapping value types to their metadata codecs
///
/// Registration is expected at configuration time; lookups happen on every
/// commit that opens an instance with persistent metadata.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: DashMap<TypeDescriptor, MetadataCodec>,
}

impl CodecRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in codecs
    ///
    /// Pre-registers the correlation id types (so result stamping always
    /// survives persistence) and the common scalar types.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register::<CorrelationId>();
        registry.register::<Option<CorrelationId>>();
        registry.register::<String>();
        registry.register::<i64>();
        registry.register::<f64>();
        registry.register::<bool>();
        registry
    }

    /// Register the serde-backed codec for `T`
    pub fn register<T>(&self)
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        let codec = MetadataCodec::of::<T>();
        self.codecs.insert(codec.descriptor(), codec);
    }

    /// Whether a codec exists for the described type
    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.codecs.contains_key(descriptor)
    }

    /// Verify every persistent entry of `metadata` has a codec
    ///
    /// Under [`CodecPolicy::Enforce`] the first uncovered entry fails with
    /// [`Error::MissingCodec`]; under [`CodecPolicy::Warn`] each uncovered
    /// entry is logged and verification succeeds.
    pub fn verify(&self, metadata: &Metadata, policy: CodecPolicy) -> Result<()> {
        for (name, descriptor) in metadata.persistent_entries() {
            if self.contains(&descriptor) {
                continue;
            }
            match policy {
                CodecPolicy::Enforce => {
                    return Err(Error::MissingCodec {
                        key: name.to_string(),
                        type_name: descriptor.name().to_string(),
                    });
                }
                CodecPolicy::Warn => {
                    tracing::warn!(
                        target: "waypoint::codec",
                        key = name,
                        value_type = descriptor.name(),
                        "persistent metadata value has no registered codec; \
                         persistence behavior for this entry is undefined"
                    );
                }
            }
        }
        Ok(())
    }

    /// Encode the persistent map of `metadata` as a JSON object keyed by entry name
    ///
    /// Transient entries are never touched. Fails on the first entry without
    /// a codec, regardless of policy: actual encoding cannot proceed without one.
    pub fn encode_metadata(&self, metadata: &Metadata) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for (name, descriptor) in metadata.persistent_entries() {
            let codec = self.codecs.get(&descriptor).ok_or_else(|| Error::MissingCodec {
                key: name.to_string(),
                type_name: descriptor.name().to_string(),
            })?;
            let encoded = metadata
                .with_persistent_value(name, |value, _| (codec.encode)(value))
                .ok_or_else(|| {
                    Error::Serialization(format!("persistent entry '{}' vanished mid-encode", name))
                })??;
            object.insert(name.to_string(), encoded);
        }
        Ok(serde_json::Value::Object(object))
    }

    /// Decode one previously encoded value back to its erased form
    pub fn decode_value(
        &self,
        descriptor: &TypeDescriptor,
        json: serde_json::Value,
    ) -> Result<Arc<dyn Any + Send + Sync>> {
        let codec = self.codecs.get(descriptor).ok_or_else(|| Error::MissingCodec {
            key: String::new(),
            type_name: descriptor.name().to_string(),
        })?;
        (codec.decode)(json)
    }
}
