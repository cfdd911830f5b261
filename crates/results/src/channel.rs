//! Typed result channels over the registry
//!
//! A [`ResultChannel<T>`] is the caller-facing view of the registry: it owns
//! an [`OwnerId`], stamps correlation ids onto instances before they are
//! opened, and registers typed observers whose callbacks receive a `T`
//! instead of an erased payload.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use waypoint_core::{CorrelationId, Instance, OwnerId, Payload, Result, TypeDescriptor};

use crate::registry::ResultRegistry;

/// A typed handle for requesting and observing results of type `T`
pub struct ResultChannel<T> {
    owner: OwnerId,
    registry: Arc<ResultRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send> ResultChannel<T> {
    /// Create a channel with a fresh owner id
    pub fn new(registry: Arc<ResultRegistry>) -> Self {
        Self {
            owner: OwnerId::new(),
            registry,
            _marker: PhantomData,
        }
    }

    /// The owner id this channel stamps onto instances
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Stamp `instance` so that its eventual close is routed to this channel
    ///
    /// Must be called before the instance is opened. The returned correlation
    /// id names the `(owner, result_id)` pair used by
    /// [`observe`](Self::observe).
    pub fn prepare(&self, instance: &Instance, result_id: impl Into<String>) -> CorrelationId {
        let correlation = CorrelationId::new(self.owner, result_id);
        instance.set_correlation_id(correlation.clone());
        correlation
    }

    /// Register typed callbacks for `result_id`
    ///
    /// `on_completed` fires when a correlated instance completes with a `T`
    /// (or, for `T = ()`, when it closes at all); `on_closed` fires when a
    /// correlated instance closes without completing. Results already pending
    /// are delivered before this returns.
    ///
    /// # Errors
    /// `DuplicateObserver` if the `(owner, result_id)` pair already has a
    /// live observer; `ResultTypeMismatch` if an already-pending result
    /// carries the wrong type.
    pub fn observe(
        &self,
        result_id: impl Into<String>,
        mut on_completed: impl FnMut(T) + Send + 'static,
        on_closed: impl FnMut() + Send + 'static,
    ) -> Result<ResultSubscription> {
        let correlation = CorrelationId::new(self.owner, result_id);
        self.registry.observe(
            correlation.clone(),
            TypeDescriptor::of::<T>(),
            Box::new(move |payload: Payload| {
                if let Ok(value) = payload.downcast::<T>() {
                    on_completed(value);
                }
            }),
            Box::new(on_closed),
        )?;
        Ok(ResultSubscription {
            correlation,
            registry: Arc::clone(&self.registry),
        })
    }
}

/// Live observer registration; dropping it releases the observer
pub struct ResultSubscription {
    correlation: CorrelationId,
    registry: Arc<ResultRegistry>,
}

impl ResultSubscription {
    /// The correlation id this subscription observes
    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    /// Release the observer now instead of at drop
    pub fn close(self) {}
}

impl Drop for ResultSubscription {
    fn drop(&mut self) {
        self.registry.release(&self.correlation);
    }
}

impl std::fmt::Debug for ResultSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSubscription")
            .field("correlation", &self.correlation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CloseEvent;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use waypoint_core::{Error, NavigationKey};

    #[derive(Debug, Clone)]
    struct PickerKey;

    impl NavigationKey for PickerKey {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn expected_result(&self) -> Option<TypeDescriptor> {
            Some(TypeDescriptor::of::<i64>())
        }
    }

    fn completed_event(instance: Instance, payload: Payload) -> CloseEvent {
        CloseEvent {
            instance,
            silent: false,
            forwarded: false,
            payload: Some(payload),
        }
    }

    #[test]
    fn test_prepare_stamps_correlation() {
        let registry = Arc::new(ResultRegistry::new());
        let channel: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));

        let instance = Instance::new(PickerKey);
        let correlation = channel.prepare(&instance, "pick");

        assert_eq!(instance.correlation_id(), Some(correlation.clone()));
        assert_eq!(correlation.owner, channel.owner());
        assert_eq!(correlation.result, "pick");
    }

    #[test]
    fn test_typed_round_trip() {
        let registry = Arc::new(ResultRegistry::new());
        let channel: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));
        let received = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let instance = Instance::new(PickerKey);
        channel.prepare(&instance, "pick");

        let received_in = Arc::clone(&received);
        let _subscription = channel
            .observe("pick", move |value: i64| received_in.lock().push(value), || {})
            .unwrap();

        registry.register_closed(vec![completed_event(instance, Payload::new(7i64))]);
        registry.deliver_pending().unwrap();

        assert_eq!(*received.lock(), vec![7]);
    }

    #[test]
    fn test_distinct_result_ids_are_independent() {
        let registry = Arc::new(ResultRegistry::new());
        let channel: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));
        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&hits_a);
        let _sub_a = channel
            .observe("a", move |_| { a.fetch_add(1, Ordering::SeqCst); }, || {})
            .unwrap();
        let b = Arc::clone(&hits_b);
        let _sub_b = channel
            .observe("b", move |_| { b.fetch_add(1, Ordering::SeqCst); }, || {})
            .unwrap();

        let instance = Instance::new(PickerKey);
        channel.prepare(&instance, "b");
        registry.register_closed(vec![completed_event(instance, Payload::new(1i64))]);
        registry.deliver_pending().unwrap();

        assert_eq!(hits_a.load(Ordering::SeqCst), 0);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_two_channels_never_collide() {
        let registry = Arc::new(ResultRegistry::new());
        let first: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));
        let second: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));

        // Same result id, different owners
        let _a = first.observe("pick", |_| {}, || {}).unwrap();
        let _b = second.observe("pick", |_| {}, || {}).unwrap();
    }

    #[test]
    fn test_duplicate_observation_rejected() {
        let registry = Arc::new(ResultRegistry::new());
        let channel: ResultChannel<i64> = ResultChannel::new(registry);

        let _first = channel.observe("pick", |_| {}, || {}).unwrap();
        let err = channel.observe("pick", |_| {}, || {}).unwrap_err();
        assert!(matches!(err, Error::DuplicateObserver { .. }));
    }

    #[test]
    fn test_failed_observe_leaves_id_reusable() {
        let registry = Arc::new(ResultRegistry::new());
        let channel: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));

        let instance = Instance::new(PickerKey);
        let correlation = channel.prepare(&instance, "pick");
        registry.register_closed(vec![completed_event(
            instance,
            Payload::new("wrong".to_string()),
        )]);

        let err = channel.observe("pick", |_| {}, || {}).unwrap_err();
        assert!(matches!(err, Error::ResultTypeMismatch { .. }));
        assert!(!registry.is_active(&correlation));

        let _retry = channel.observe("pick", |_| {}, || {}).unwrap();
    }

    #[test]
    fn test_drop_releases_observer() {
        let registry = Arc::new(ResultRegistry::new());
        let channel: ResultChannel<i64> = ResultChannel::new(Arc::clone(&registry));

        let subscription = channel.observe("pick", |_| {}, || {}).unwrap();
        let correlation = subscription.correlation().clone();
        assert!(registry.is_active(&correlation));

        drop(subscription);
        assert!(!registry.is_active(&correlation));

        // Observing again is now legal
        let _again = channel.observe("pick", |_| {}, || {}).unwrap();
    }
}
