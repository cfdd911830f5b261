//! Pending-result storage and exactly-once delivery
//!
//! The registry is the rendezvous point between instances that close and the
//! observers waiting on their correlation ids. Close events are recorded at
//! commit time, before the new backstack is published; delivery happens after
//! the executing container's guard releases, so observers are free to
//! navigate from inside their callbacks.
//!
//! Invariants:
//! - at most one live observer per correlation id
//! - each recorded close event is delivered at most once
//! - typed payloads are checked against the observer's expectation before
//!   the callback runs

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use waypoint_core::{CorrelationId, Error, Instance, Payload, Result, TypeDescriptor};

/// How silent closes interact with result delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilencePolicy {
    /// When a silent close arrives, also discard a not-yet-delivered
    /// completion already recorded for the same correlation id
    pub suppress_racing_complete: bool,
    /// Whether a silent close also suppresses delivery for instances whose
    /// correlation id was forwarded from another request
    pub silence_forwarded: bool,
}

impl Default for SilencePolicy {
    fn default() -> Self {
        Self {
            suppress_racing_complete: false,
            silence_forwarded: true,
        }
    }
}

/// What happened to a correlated instance when it left the backstack
#[derive(Debug)]
pub enum ResultOutcome {
    /// Closed without a completion value
    Closed,
    /// Completed with a typed payload
    Completed(Payload),
}

/// One instance leaving a backstack, as seen by the registry
#[derive(Debug)]
pub struct CloseEvent {
    /// The instance that left the backstack
    pub instance: Instance,
    /// The close was requested silently
    pub silent: bool,
    /// The instance carried a forwarded correlation id
    pub forwarded: bool,
    /// Completion value, if the close was a `Complete`
    pub payload: Option<Payload>,
}

struct PendingResult {
    correlation: CorrelationId,
    outcome: ResultOutcome,
}

struct ObserverEntry {
    expected: TypeDescriptor,
    on_completed: Box<dyn FnMut(Payload) + Send>,
    on_closed: Box<dyn FnMut() + Send>,
}

#[derive(Default)]
struct RegistryState {
    pending: Vec<PendingResult>,
    active: HashSet<CorrelationId>,
    observers: HashMap<CorrelationId, ObserverEntry>,
}

/// Controller-wide store of pending results and active observers
pub struct ResultRegistry {
    state: Mutex<RegistryState>,
    policy: SilencePolicy,
}

impl ResultRegistry {
    /// Create a registry with the default silence policy
    pub fn new() -> Self {
        Self::with_policy(SilencePolicy::default())
    }

    /// Create a registry with an explicit silence policy
    pub fn with_policy(policy: SilencePolicy) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            policy,
        }
    }

    /// The registry's silence policy
    pub fn policy(&self) -> SilencePolicy {
        self.policy
    }

    /// Record a batch of close events from one committed transition
    ///
    /// Uncorrelated instances are skipped. Silent closes suppress delivery
    /// according to the [`SilencePolicy`]. Recording does not deliver;
    /// callers invoke [`deliver_pending`](Self::deliver_pending) once the
    /// execution guard has been released.
    pub fn register_closed(&self, events: Vec<CloseEvent>) {
        let mut state = self.state.lock();
        for event in events {
            let Some(correlation) = event.instance.correlation_id() else {
                continue;
            };
            let silenced = event.silent && (self.policy.silence_forwarded || !event.forwarded);
            if silenced {
                tracing::debug!(
                    target: "waypoint::results",
                    %correlation,
                    "silent close suppressed result delivery"
                );
                if self.policy.suppress_racing_complete {
                    state.pending.retain(|pending| pending.correlation != correlation);
                }
                continue;
            }
            let outcome = match event.payload {
                Some(payload) => ResultOutcome::Completed(payload),
                None => ResultOutcome::Closed,
            };
            tracing::debug!(
                target: "waypoint::results",
                %correlation,
                outcome = ?outcome,
                "recorded pending result"
            );
            state.pending.push(PendingResult {
                correlation,
                outcome,
            });
        }
    }

    /// Deliver every pending result that has a registered observer
    ///
    /// Each result is removed from the pending set before its callback runs,
    /// and the callback runs with no registry lock held, so observers may
    /// observe, release, or navigate reentrantly.
    ///
    /// # Errors
    /// `ResultTypeMismatch` if a completion payload does not match the
    /// observer's declared expectation. The mismatched result is dropped;
    /// the observer stays registered.
    pub fn deliver_pending(&self) -> Result<()> {
        loop {
            let (correlation, outcome, mut entry) = {
                let mut state = self.state.lock();
                let Some(position) = state
                    .pending
                    .iter()
                    .position(|pending| state.observers.contains_key(&pending.correlation))
                else {
                    return Ok(());
                };
                let pending = state.pending.remove(position);
                // Entry is taken out for the duration of the callback and
                // restored afterwards unless the observer released itself.
                let entry = state
                    .observers
                    .remove(&pending.correlation)
                    .ok_or_else(|| Error::contract_violation("observer vanished under lock"))?;
                (pending.correlation, pending.outcome, entry)
            };

            let delivery = self.deliver_one(&correlation, outcome, &mut entry);

            {
                let mut state = self.state.lock();
                if state.active.contains(&correlation) && !state.observers.contains_key(&correlation)
                {
                    state.observers.insert(correlation.clone(), entry);
                }
            }

            delivery?;
        }
    }

    fn deliver_one(
        &self,
        correlation: &CorrelationId,
        outcome: ResultOutcome,
        entry: &mut ObserverEntry,
    ) -> Result<()> {
        match outcome {
            ResultOutcome::Closed => {
                if entry.expected.is_unit() {
                    // A unit expectation treats any close as completion.
                    tracing::debug!(target: "waypoint::results", %correlation, "delivering unit completion");
                    (entry.on_completed)(Payload::new(()));
                } else {
                    tracing::debug!(target: "waypoint::results", %correlation, "delivering close");
                    (entry.on_closed)();
                }
                Ok(())
            }
            ResultOutcome::Completed(payload) => {
                if entry.expected.is_unit() {
                    (entry.on_completed)(Payload::new(()));
                    return Ok(());
                }
                let actual = payload.descriptor();
                if !entry.expected.matches(&actual) {
                    return Err(Error::ResultTypeMismatch {
                        expected: entry.expected.name().to_string(),
                        actual: actual.name().to_string(),
                    });
                }
                tracing::debug!(
                    target: "waypoint::results",
                    %correlation,
                    payload = %actual,
                    "delivering completion"
                );
                (entry.on_completed)(payload);
                Ok(())
            }
        }
    }

    /// Register an observer for `correlation`
    ///
    /// If results for the correlation are already pending they are delivered
    /// immediately, so late observers never miss an earlier close.
    ///
    /// # Errors
    /// `DuplicateObserver` if the correlation already has a live observer;
    /// `ResultTypeMismatch` if an already-pending result carries the wrong
    /// type, in which case the registration is rolled back and the
    /// correlation id stays free.
    pub fn observe(
        &self,
        correlation: CorrelationId,
        expected: TypeDescriptor,
        on_completed: Box<dyn FnMut(Payload) + Send>,
        on_closed: Box<dyn FnMut() + Send>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.active.contains(&correlation) {
                return Err(Error::DuplicateObserver {
                    correlation: correlation.to_string(),
                });
            }
            state.active.insert(correlation.clone());
            state.observers.insert(
                correlation.clone(),
                ObserverEntry {
                    expected,
                    on_completed,
                    on_closed,
                },
            );
        }
        tracing::debug!(target: "waypoint::results", %correlation, "observer registered");
        if let Err(error) = self.deliver_pending() {
            self.release(&correlation);
            return Err(error);
        }
        Ok(())
    }

    /// Remove the observer for `correlation`, if any
    ///
    /// Pending results for the correlation stay recorded; a future observer
    /// for the same id would still receive them.
    pub fn release(&self, correlation: &CorrelationId) {
        let mut state = self.state.lock();
        state.active.remove(correlation);
        state.observers.remove(correlation);
        tracing::debug!(target: "waypoint::results", %correlation, "observer released");
    }

    /// Number of recorded, not-yet-delivered results
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether `correlation` has a live observer
    pub fn is_active(&self, correlation: &CorrelationId) -> bool {
        self.state.lock().active.contains(correlation)
    }
}

impl Default for ResultRegistry {
    fn default() -> Self {
        Self::new()
    }
}
