//! The navigation operation algebra
//!
//! Operations are the instruction set of the engine. Every mutation a caller
//! can request is represented as a variant of [`Operation`]:
//!
//! | Variant | Effect on the backstack |
//! |-------------|-------------------------------------------------------|
//! | `Open` | appends its instance at the end |
//! | `Close` | removes the named instance wherever it occurs |
//! | `Complete` | removes the named instance, carrying a typed payload |
//! | `Aggregate` | folds sub-operations into one atomic transition |
//! | `SideEffect`| no mutation; its thunk runs after the guard releases |
//!
//! Contract checks happen at construction, not at commit: completing a
//! result-bearing key without a payload (or a plain key with one) fails the
//! constructor with `Error::ContractViolation`.

use std::fmt;

use once_cell::sync::Lazy;
use waypoint_core::{
    Error, Instance, Metadata, MetadataKey, Payload, Result, Transition, TypeDescriptor,
};

/// Marks an instance whose correlation id was aliased from another request.
///
/// Transient: forwarding is a process-local fact, never persisted.
pub(crate) fn forwarded_key() -> &'static MetadataKey<bool> {
    static KEY: Lazy<MetadataKey<bool>> =
        Lazy::new(|| MetadataKey::transient("waypoint.forwarded", false));
    &KEY
}

/// A named once-thunk deferred until after the current execution unlocks
pub struct SideEffect {
    name: String,
    thunk: Box<dyn FnOnce() + Send>,
}

impl SideEffect {
    /// Create a side effect; the name is for diagnostics only
    pub fn new(name: impl Into<String>, thunk: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            thunk: Box::new(thunk),
        }
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consume and run the thunk
    pub fn run(self) {
        tracing::debug!(target: "waypoint::exec", effect = %self.name, "running deferred side effect");
        (self.thunk)();
    }
}

impl fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffect").field("name", &self.name).finish()
    }
}

/// A navigation command
///
/// The set of variants is closed: the two places that interpret an operation
/// (application to a backstack snapshot, and result-registry tagging) match
/// exhaustively.
#[derive(Debug)]
pub enum Operation {
    /// Add an instance to the end of the backstack
    Open {
        /// The instance to open
        instance: Instance,
    },
    /// Remove an instance from the backstack
    Close {
        /// The instance to close
        instance: Instance,
        /// Suppress result delivery for this specific close event
        silent: bool,
    },
    /// Remove an instance, optionally delivering a typed payload
    Complete {
        /// The instance to complete
        instance: Instance,
        /// The completion value; present iff the key expects a result
        payload: Option<Payload>,
    },
    /// An ordered composite committed as one transition
    Aggregate {
        /// Sub-operations, applied left to right against one snapshot
        operations: Vec<Operation>,
    },
    /// No backstack mutation; the effect runs after the execution unlocks
    SideEffect {
        /// The deferred thunk
        effect: SideEffect,
    },
}

impl Operation {
    /// Request to open `instance`
    pub fn open(instance: Instance) -> Self {
        Operation::Open { instance }
    }

    /// Request to close `instance`, notifying any waiting result channel
    pub fn close(instance: Instance) -> Self {
        Operation::Close {
            instance,
            silent: false,
        }
    }

    /// Request to close `instance` without notifying result channels
    pub fn close_silently(instance: Instance) -> Self {
        Operation::Close {
            instance,
            silent: true,
        }
    }

    /// Request to complete `instance` with no payload
    ///
    /// # Errors
    /// `ContractViolation` if the instance's key expects a typed result.
    pub fn complete(instance: Instance) -> Result<Self> {
        if let Some(expected) = instance.key().expected_result() {
            return Err(Error::contract_violation(format!(
                "key expects a result of type {expected}; use complete_with"
            )));
        }
        Ok(Operation::Complete {
            instance,
            payload: None,
        })
    }

    /// Request to complete `instance` with a typed payload
    ///
    /// # Errors
    /// `ContractViolation` if the key expects no result, or expects a result
    /// of a different type than `T`.
    pub fn complete_with<T: std::any::Any + Send>(instance: Instance, value: T) -> Result<Self> {
        let provided = TypeDescriptor::of::<T>();
        match instance.key().expected_result() {
            None => Err(Error::contract_violation(format!(
                "key expects no result but a payload of type {provided} was supplied"
            ))),
            Some(expected) if !expected.matches(&provided) => Err(Error::contract_violation(
                format!("key expects a result of type {expected}, got {provided}"),
            )),
            Some(_) => Ok(Operation::Complete {
                instance,
                payload: Some(Payload::new(value)),
            }),
        }
    }

    /// Open `replacement` so that it ultimately satisfies `original`'s requester
    ///
    /// Aliases `original`'s correlation id onto `replacement` and returns an
    /// `Open(replacement)`: whatever `replacement` eventually does (close or
    /// complete) is delivered to the observer that was waiting on `original`,
    /// without `replacement`'s own caller knowing about the original request.
    ///
    /// # Errors
    /// `ContractViolation` if `original` expects a typed result and
    /// `replacement`'s key does not declare the same expectation.
    pub fn complete_from(original: &Instance, replacement: Instance) -> Result<Self> {
        if let Some(expected) = original.key().expected_result() {
            match replacement.key().expected_result() {
                Some(provided) if expected.matches(&provided) => {}
                Some(provided) => {
                    return Err(Error::contract_violation(format!(
                        "forwarding a request for {expected} onto a key producing {provided}"
                    )));
                }
                None => {
                    return Err(Error::contract_violation(format!(
                        "forwarding a request for {expected} onto a key producing no result"
                    )));
                }
            }
        }
        if let Some(correlation) = original.correlation_id() {
            replacement.set_correlation_id(correlation);
            replacement.metadata().set(forwarded_key(), true);
        }
        Ok(Operation::Open {
            instance: replacement,
        })
    }

    /// An ordered composite committed as a single transition
    pub fn aggregate(operations: Vec<Operation>) -> Self {
        Operation::Aggregate { operations }
    }

    /// A pure side effect, run once after the current execution unlocks
    pub fn side_effect(name: impl Into<String>, thunk: impl FnOnce() + Send + 'static) -> Self {
        Operation::SideEffect {
            effect: SideEffect::new(name, thunk),
        }
    }

    /// The aggregate that turns `current` into `target`
    ///
    /// Defined as `Close` for every instance in `current − target` followed by
    /// `Open` for every instance in `target − current`; its committed
    /// transition is identical to `Transition::between(current, target)`.
    pub fn set_backstack(current: &[Instance], target: Vec<Instance>) -> Self {
        let transition = Transition::between(current, &target);
        let mut operations: Vec<Operation> =
            transition.closed.into_iter().map(Operation::close).collect();
        operations.extend(transition.opened.into_iter().map(Operation::open));
        Operation::Aggregate { operations }
    }

    // === Application to a snapshot ===

    /// Apply this operation to a backstack snapshot
    ///
    /// Pure with respect to the container: the snapshot is not mutated, the
    /// result carries the candidate backstack plus the close records and
    /// deferred effects the engine needs downstream.
    pub(crate) fn apply(self, snapshot: &[Instance]) -> Result<Applied> {
        let mut applied = Applied {
            backstack: snapshot.to_vec(),
            closes: Vec::new(),
            effects: Vec::new(),
        };
        self.apply_into(&mut applied)?;
        Ok(applied)
    }

    fn apply_into(self, applied: &mut Applied) -> Result<()> {
        match self {
            Operation::Open { instance } => {
                applied.backstack.push(instance);
            }
            Operation::Close { instance, silent } => {
                if remove_by_id(&mut applied.backstack, &instance) {
                    applied.closes.push(CloseRecord {
                        instance,
                        silent,
                        payload: None,
                    });
                } else {
                    tracing::debug!(
                        target: "waypoint::exec",
                        instance = %instance.id(),
                        "close ignored: instance not in backstack"
                    );
                }
            }
            Operation::Complete { instance, payload } => {
                if remove_by_id(&mut applied.backstack, &instance) {
                    applied.closes.push(CloseRecord {
                        instance,
                        silent: false,
                        payload,
                    });
                } else {
                    tracing::debug!(
                        target: "waypoint::exec",
                        instance = %instance.id(),
                        "complete ignored: instance not in backstack"
                    );
                }
            }
            Operation::Aggregate { operations } => {
                for operation in operations {
                    operation.apply_into(applied)?;
                }
            }
            Operation::SideEffect { effect } => {
                applied.effects.push(effect);
            }
        }
        Ok(())
    }

    /// Short description for tracing
    pub fn describe(&self) -> String {
        match self {
            Operation::Open { instance } => format!("open({})", instance.id()),
            Operation::Close {
                instance,
                silent: false,
            } => format!("close({})", instance.id()),
            Operation::Close {
                instance,
                silent: true,
            } => format!("close_silently({})", instance.id()),
            Operation::Complete { instance, payload } => match payload {
                Some(p) => format!("complete({}, {})", instance.id(), p.descriptor()),
                None => format!("complete({})", instance.id()),
            },
            Operation::Aggregate { operations } => format!("aggregate[{}]", operations.len()),
            Operation::SideEffect { effect } => format!("side_effect({})", effect.name()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

fn remove_by_id(backstack: &mut Vec<Instance>, instance: &Instance) -> bool {
    let before = backstack.len();
    backstack.retain(|existing| existing.id() != instance.id());
    backstack.len() != before
}

/// Result of folding an operation against a snapshot
pub(crate) struct Applied {
    /// The candidate backstack
    pub backstack: Vec<Instance>,
    /// Every close/complete that actually removed an instance, in fold order
    pub closes: Vec<CloseRecord>,
    /// Deferred thunks, run after the guard releases
    pub effects: Vec<SideEffect>,
}

/// One recorded removal, joined with the transition's closed set for tagging
pub(crate) struct CloseRecord {
    pub instance: Instance,
    pub silent: bool,
    pub payload: Option<Payload>,
}

/// Whether `metadata` carries the forwarding mark set by [`Operation::complete_from`]
pub(crate) fn is_forwarded(metadata: &Metadata) -> bool {
    metadata.get(forwarded_key())
}
