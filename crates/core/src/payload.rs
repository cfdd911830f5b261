//! Type-erased completion payloads
//!
//! A payload carries the value of a `Complete` operation from the completing
//! screen to the waiting observer. The value is erased for transport; the
//! [`TypeDescriptor`] travels with it so delivery can check the runtime type
//! against the observer's expectation instead of relying on reflection.

use crate::key::TypeDescriptor;
use std::any::Any;
use std::fmt;

/// A typed completion value in erased form
pub struct Payload {
    value: Box<dyn Any + Send>,
    descriptor: TypeDescriptor,
}

impl Payload {
    /// Erase `value`, recording its type tag
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            descriptor: TypeDescriptor::of::<T>(),
        }
    }

    /// Type tag of the carried value
    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    /// Whether the carried value is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.descriptor.matches(&TypeDescriptor::of::<T>())
    }

    /// Recover the value, returning the payload unchanged on a type mismatch
    pub fn downcast<T: Any>(self) -> Result<T, Payload> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.value.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(value) => Err(Payload {
                value,
                descriptor: self.descriptor,
            }),
        }
    }

    /// Borrow the value as a `T`, if the type matches
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.descriptor.name())
            .finish()
    }
}
