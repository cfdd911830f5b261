//! Navigation keys and runtime type descriptors
//!
//! A key is an immutable, serializable value describing *what* destination is
//! wanted and its parameters. Keys carry no identity and no runtime state;
//! identity only appears when a key is realized into an [`Instance`].
//!
//! A key may declare that it expects a typed result by implementing
//! [`ResultKey`] and overriding [`NavigationKey::expected_result`]. All
//! runtime type checks in the system compare [`TypeDescriptor`] tags; no
//! reflection is involved.
//!
//! [`Instance`]: crate::instance::Instance

use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Runtime type tag carried alongside type-erased values
///
/// A descriptor pairs a `TypeId` (the actual comparison key) with the type's
/// name (for diagnostics). Descriptors are attached to payloads and to result
/// observers, and compared at delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// Create the descriptor for a concrete type
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Whether two descriptors denote the same type
    pub fn matches(&self, other: &TypeDescriptor) -> bool {
        self.id == other.id
    }

    /// Whether this descriptor denotes the unit type
    ///
    /// A unit expectation is trivially satisfied by any delivered outcome.
    pub fn is_unit(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    /// Diagnostic name of the described type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A typed screen intent
///
/// Construction is pure and side-effect-free. Keys are compared and stored by
/// the instances that realize them; two instances of an identical key are
/// still distinct because each carries a unique [`InstanceId`].
///
/// # Implementing
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct SettingsKey { tab: String }
///
/// impl NavigationKey for SettingsKey {
///     fn as_any(&self) -> &dyn Any { self }
/// }
/// ```
///
/// A key expecting a typed result additionally implements [`ResultKey`] and
/// reports its expectation:
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct PromptKey { message: String }
///
/// impl NavigationKey for PromptKey {
///     fn as_any(&self) -> &dyn Any { self }
///     fn expected_result(&self) -> Option<TypeDescriptor> {
///         Some(TypeDescriptor::of::<String>())
///     }
/// }
///
/// impl ResultKey for PromptKey { type Output = String; }
/// ```
///
/// [`InstanceId`]: crate::instance::InstanceId
pub trait NavigationKey: Any + fmt::Debug + Send + Sync {
    /// Upcast to `Any` for downcasting back to the concrete key type
    fn as_any(&self) -> &dyn Any;

    /// The result type this key expects, if any
    ///
    /// `None` means the key is plain: completing it with a payload is a
    /// contract violation. `Some(descriptor)` means completion must carry a
    /// payload of exactly that type.
    fn expected_result(&self) -> Option<TypeDescriptor> {
        None
    }
}

impl dyn NavigationKey {
    /// Whether the erased key is a `K`
    pub fn is<K: NavigationKey>(&self) -> bool {
        self.as_any().is::<K>()
    }

    /// Downcast the erased key to a concrete key type
    pub fn downcast_ref<K: NavigationKey>(&self) -> Option<&K> {
        self.as_any().downcast_ref::<K>()
    }
}

/// Marker for keys that expect a typed result
///
/// The associated `Output` type is what `Operation::complete_with` requires
/// and what a `ResultChannel` for this key delivers. Implementors must keep
/// [`NavigationKey::expected_result`] in agreement with `Output`.
pub trait ResultKey: NavigationKey {
    /// The payload type a completion of this key must carry
    type Output: Any + Send;
}
