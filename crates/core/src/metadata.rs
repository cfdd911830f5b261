//! Typed, serializable key-value metadata attached to an instance
//!
//! ## Design Principles
//!
//! 1. **Two maps**: a *persistent* map whose values must round-trip through a
//!    registered codec, and a *transient* map that lives for the process only
//!    and is invisible to persistence.
//! 2. **Typed keys**: a [`MetadataKey<T>`] carries a default returned when the
//!    entry is absent, and decides which map its values land in. A transient
//!    key can never populate the persistent map, and vice versa.
//! 3. **Shared cell**: metadata is a cheap-clone handle over shared state, so
//!    stamping a value after an instance has been snapshotted into a backstack
//!    is observable in place. Instance identity never depends on metadata.
//!
//! Removal is spelled [`Metadata::remove`]; there is no `set(key, null)`.

use crate::key::TypeDescriptor;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Typed handle naming one metadata entry
///
/// The key's name is the storage identity; the type parameter is enforced at
/// every access through the entry's [`TypeDescriptor`].
#[derive(Debug, Clone)]
pub struct MetadataKey<T> {
    name: &'static str,
    default: T,
    transient: bool,
}

impl<T: Clone + Send + Sync + 'static> MetadataKey<T> {
    /// Create a key whose values belong to the persistent map
    ///
    /// Persistent values must have a codec registered before they cross the
    /// persistence boundary; the engine verifies this when an instance
    /// carrying them is opened.
    pub fn persistent(name: &'static str, default: T) -> Self {
        Self {
            name,
            default,
            transient: false,
        }
    }

    /// Create a key whose values live for the process only
    pub fn transient(name: &'static str, default: T) -> Self {
        Self {
            name,
            default,
            transient: true,
        }
    }

    /// Storage name of this key
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether values of this key are excluded from persistence
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// The default value returned when the entry is absent
    pub fn default_value(&self) -> T {
        self.default.clone()
    }
}

/// One stored metadata value with its runtime type tag
#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    descriptor: TypeDescriptor,
}

#[derive(Default)]
struct Maps {
    persistent: HashMap<&'static str, Entry>,
    transient: HashMap<&'static str, Entry>,
}

/// Typed key-value bag attached to an [`Instance`]
///
/// Cloning produces another handle to the same underlying maps.
///
/// [`Instance`]: crate::instance::Instance
#[derive(Clone, Default)]
pub struct Metadata {
    inner: Arc<RwLock<Maps>>,
}

impl Metadata {
    /// Create an empty metadata bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for `key`, or the key's default when absent
    ///
    /// O(1). An entry written under the same name but a different type is
    /// treated as absent rather than coerced.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &MetadataKey<T>) -> T {
        self.try_get(key).unwrap_or_else(|| key.default_value())
    }

    /// Get the value for `key`, or `None` when absent
    pub fn try_get<T: Clone + Send + Sync + 'static>(&self, key: &MetadataKey<T>) -> Option<T> {
        let maps = self.inner.read();
        let map = if key.transient {
            &maps.transient
        } else {
            &maps.persistent
        };
        let entry = map.get(key.name)?;
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Set the value for `key`
    ///
    /// O(1). Overwrites any previous value under the same name.
    pub fn set<T: Clone + Send + Sync + 'static>(&self, key: &MetadataKey<T>, value: T) {
        let entry = Entry {
            value: Arc::new(value),
            descriptor: TypeDescriptor::of::<T>(),
        };
        let mut maps = self.inner.write();
        let map = if key.transient {
            &mut maps.transient
        } else {
            &mut maps.persistent
        };
        map.insert(key.name, entry);
    }

    /// Remove the entry for `key`, returning whether one existed
    pub fn remove<T: Clone + Send + Sync + 'static>(&self, key: &MetadataKey<T>) -> bool {
        let mut maps = self.inner.write();
        let map = if key.transient {
            &mut maps.transient
        } else {
            &mut maps.persistent
        };
        map.remove(key.name).is_some()
    }

    /// Whether an entry exists for `key`
    pub fn contains<T: Clone + Send + Sync + 'static>(&self, key: &MetadataKey<T>) -> bool {
        let maps = self.inner.read();
        let map = if key.transient {
            &maps.transient
        } else {
            &maps.persistent
        };
        map.contains_key(key.name)
    }

    /// Whether both maps are empty
    pub fn is_empty(&self) -> bool {
        let maps = self.inner.read();
        maps.persistent.is_empty() && maps.transient.is_empty()
    }

    /// Names and type tags of every persistent entry
    ///
    /// This is the surface the codec registry verifies against; transient
    /// entries are intentionally not listed.
    pub fn persistent_entries(&self) -> Vec<(&'static str, TypeDescriptor)> {
        let maps = self.inner.read();
        maps.persistent
            .iter()
            .map(|(name, entry)| (*name, entry.descriptor))
            .collect()
    }

    /// Read access to a persistent entry's erased value, for codec encoding
    pub(crate) fn with_persistent_value<R>(
        &self,
        name: &str,
        f: impl FnOnce(&(dyn Any + Send + Sync), TypeDescriptor) -> R,
    ) -> Option<R> {
        let maps = self.inner.read();
        let entry = maps.persistent.get(name)?;
        Some(f(entry.value.as_ref(), entry.descriptor))
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let maps = self.inner.read();
        f.debug_struct("Metadata")
            .field("persistent", &maps.persistent.keys().collect::<Vec<_>>())
            .field("transient", &maps.transient.keys().collect::<Vec<_>>())
            .finish()
    }
}
