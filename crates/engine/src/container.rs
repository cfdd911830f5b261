//! Backstack containers and the single-flight execution guard
//!
//! A container owns one ordered backstack and is the only way to mutate it.
//! [`Container::execute`] runs the full commit pipeline (interceptor chains,
//! application against a snapshot, transition derivation, codec verification,
//! result tagging, publication, subscriber notification) while a non-blocking
//! reentrancy guard is held. Re-entering `execute` from an interceptor or a
//! backstack subscriber is a detected error, never a deadlock. Deferred side
//! effects and result delivery run after the guard releases, so they may
//! legally navigate.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use waypoint_core::{Error, Instance, InstanceId, Result, Transition};
use waypoint_results::CloseEvent;

use crate::controller::NavigationController;
use crate::interceptor::{Intercepted, InterceptorChain, OperationInterceptor};
use crate::operation::{is_forwarded, CloseRecord, Operation};

/// Stable name of a container within its controller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey(String);

impl ContainerKey {
    /// Create a container key
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an execution concluded
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The operation committed; the transition records what changed
    Committed(Transition),
    /// An interceptor vetoed the operation; nothing changed
    Vetoed,
    /// An interceptor cancelled the operation and its replacement effect ran
    Cancelled,
}

type SubscriberFn = Arc<dyn Fn(&[Instance]) + Send + Sync>;

/// Owner of one backstack
pub struct Container {
    key: ContainerKey,
    parent: Option<ContainerKey>,
    controller: NavigationController,
    backstack: RwLock<Vec<Instance>>,
    local_interceptors: Mutex<InterceptorChain>,
    subscribers: Mutex<Vec<(u64, SubscriberFn)>>,
    next_subscriber: AtomicU64,
    executing: AtomicBool,
    self_weak: Weak<Container>,
}

/// Releases the reentrancy flag on every exit path
struct ExecutionToken<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ExecutionToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Container {
    pub(crate) fn new(
        key: ContainerKey,
        parent: Option<ContainerKey>,
        controller: NavigationController,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            key,
            parent,
            controller,
            backstack: RwLock::new(Vec::new()),
            local_interceptors: Mutex::new(InterceptorChain::new()),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
            executing: AtomicBool::new(false),
            self_weak: weak.clone(),
        })
    }

    /// This container's key
    pub fn key(&self) -> &ContainerKey {
        &self.key
    }

    /// Key of the logical parent container, if any
    pub fn parent(&self) -> Option<&ContainerKey> {
        self.parent.as_ref()
    }

    /// The controller this container belongs to
    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    /// Snapshot of the current backstack
    pub fn backstack(&self) -> Vec<Instance> {
        self.backstack.read().clone()
    }

    /// Append an interceptor to this container's local chain
    ///
    /// Local interceptors run before the controller's global chain.
    pub fn add_interceptor(&self, interceptor: Arc<dyn OperationInterceptor>) {
        self.local_interceptors.lock().push(interceptor);
    }

    /// Execute one operation against this container
    ///
    /// The pipeline, in order: local interceptors, global interceptors,
    /// application against a snapshot, transition derivation, codec
    /// verification of opened instances, result tagging, backstack
    /// publication, subscriber notification. Deferred side effects and
    /// pending-result delivery run after the guard releases.
    ///
    /// # Errors
    /// `ReentrantExecution` when called while another execution on this
    /// container is in flight (for example from inside an interceptor or a
    /// backstack subscriber). Contract and codec errors from the pipeline
    /// propagate; none of them leave a partially applied backstack behind.
    pub fn execute(&self, operation: Operation) -> Result<ExecutionOutcome> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                target: "waypoint::exec",
                container = %self.key,
                operation = %operation,
                "reentrant execution rejected"
            );
            return Err(Error::ReentrantExecution {
                container: self.key.to_string(),
            });
        }
        let token = ExecutionToken {
            flag: &self.executing,
        };

        tracing::debug!(
            target: "waypoint::exec",
            container = %self.key,
            operation = %operation,
            "executing"
        );

        let snapshot = self.backstack.read().clone();

        // Chains are cloned out of their locks before running: an interceptor
        // that touches the container must never deadlock on the chain lock.
        let local_chain = self.local_interceptors.lock().clone();
        let operation = match local_chain.intercept(operation) {
            Intercepted::Continue(operation) => operation,
            Intercepted::Veto => {
                tracing::debug!(target: "waypoint::exec", container = %self.key, "vetoed by local chain");
                return Ok(ExecutionOutcome::Vetoed);
            }
            Intercepted::CancelWith(effect) => {
                drop(token);
                effect.run();
                return Ok(ExecutionOutcome::Cancelled);
            }
        };

        let global_chain = self.controller.interceptor_chain();
        let operation = match global_chain.intercept(operation) {
            Intercepted::Continue(operation) => operation,
            Intercepted::Veto => {
                tracing::debug!(target: "waypoint::exec", container = %self.key, "vetoed by global chain");
                return Ok(ExecutionOutcome::Vetoed);
            }
            Intercepted::CancelWith(effect) => {
                drop(token);
                effect.run();
                return Ok(ExecutionOutcome::Cancelled);
            }
        };

        let applied = operation.apply(&snapshot)?;
        let transition = Transition::between(&snapshot, &applied.backstack);

        let codecs = self.controller.codec_registry();
        let policy = self.controller.codec_policy();
        for opened in &transition.opened {
            codecs.verify(opened.metadata(), policy)?;
        }

        let events = close_events(&transition, applied.closes);
        self.controller.result_registry().register_closed(events);

        *self.backstack.write() = applied.backstack;

        if !transition.is_empty() {
            // Subscribers are notified once per committed transition, while
            // the guard is still held: a subscriber that navigates
            // synchronously gets ReentrantExecution instead of a nested
            // commit.
            let subscribers: Vec<SubscriberFn> = self
                .subscribers
                .lock()
                .iter()
                .map(|(_, subscriber)| Arc::clone(subscriber))
                .collect();
            let published = self.backstack.read().clone();
            for subscriber in subscribers {
                subscriber(&published);
            }
        }

        tracing::debug!(
            target: "waypoint::exec",
            container = %self.key,
            closed = transition.closed.len(),
            opened = transition.opened.len(),
            "committed"
        );

        drop(token);

        for effect in applied.effects {
            effect.run();
        }
        self.controller.result_registry().deliver_pending()?;

        Ok(ExecutionOutcome::Committed(transition))
    }

    /// Replace the whole backstack with `target`
    ///
    /// Equivalent to executing the aggregate of closes for departing
    /// instances followed by opens for arriving ones.
    pub fn set_backstack(&self, target: Vec<Instance>) -> Result<ExecutionOutcome> {
        let current = self.backstack.read().clone();
        self.execute(Operation::set_backstack(&current, target))
    }

    /// Observe committed backstack changes
    ///
    /// The callback fires once per committed non-empty transition, with the
    /// newly published backstack. Dropping the returned subscription
    /// unsubscribes.
    pub fn subscribe(
        &self,
        subscriber: impl Fn(&[Instance]) + Send + Sync + 'static,
    ) -> BackstackSubscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(subscriber)));
        BackstackSubscription {
            id,
            container: self.self_weak.clone(),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .retain(|(existing, _)| *existing != id);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("backstack_len", &self.backstack.read().len())
            .finish()
    }
}

/// Live backstack observer; dropping it unsubscribes
pub struct BackstackSubscription {
    id: u64,
    container: Weak<Container>,
}

impl Drop for BackstackSubscription {
    fn drop(&mut self) {
        if let Some(container) = self.container.upgrade() {
            container.unsubscribe(self.id);
        }
    }
}

/// Join the transition's closed set with the fold's close records
///
/// Instances removed by the fold carry their recorded silent flag and
/// payload; instances that left the backstack some other way (a
/// `set_backstack` drop, or a close-then-reopen collapse) default to a
/// plain, non-silent close.
fn close_events(transition: &Transition, records: Vec<CloseRecord>) -> Vec<CloseEvent> {
    let mut by_id: HashMap<InstanceId, CloseRecord> = records
        .into_iter()
        .map(|record| (record.instance.id(), record))
        .collect();

    transition
        .closed
        .iter()
        .map(|closed| {
            let (silent, payload) = match by_id.remove(&closed.id()) {
                Some(record) => (record.silent, record.payload),
                None => (false, None),
            };
            CloseEvent {
                instance: closed.clone(),
                silent,
                forwarded: is_forwarded(closed.metadata()),
                payload,
            }
        })
        .collect()
}
