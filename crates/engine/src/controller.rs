//! The controller owning cross-container state
//!
//! A [`NavigationController`] ties together everything containers share: the
//! global interceptor chain, the result registry, and the codec registry. It
//! is a cheap-clone handle over shared state; containers are created through
//! it and keep a handle back, while the controller itself only tracks them
//! weakly.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use waypoint_core::{CodecPolicy, CodecRegistry};
use waypoint_results::{ResultChannel, ResultRegistry, SilencePolicy};

use crate::container::{Container, ContainerKey};
use crate::interceptor::{InterceptorChain, OperationInterceptor};

struct ControllerInner {
    interceptors: Mutex<InterceptorChain>,
    results: Arc<ResultRegistry>,
    codecs: CodecRegistry,
    codec_policy: CodecPolicy,
    containers: Mutex<HashMap<ContainerKey, Weak<Container>>>,
}

/// Shared engine state behind every container
///
/// Cloning produces another handle to the same controller.
#[derive(Clone)]
pub struct NavigationController {
    inner: Arc<ControllerInner>,
}

impl NavigationController {
    /// A controller with default configuration
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a controller
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    /// Create (or replace) the container named `key`
    ///
    /// The controller keeps only a weak reference; the returned `Arc` owns
    /// the container.
    pub fn new_container(
        &self,
        key: ContainerKey,
        parent: Option<ContainerKey>,
    ) -> Arc<Container> {
        let container = Container::new(key.clone(), parent, self.clone());
        self.inner
            .containers
            .lock()
            .insert(key.clone(), Arc::downgrade(&container));
        tracing::debug!(target: "waypoint::exec", container = %key, "container created");
        container
    }

    /// Look up a live container by key
    pub fn container(&self, key: &ContainerKey) -> Option<Arc<Container>> {
        self.inner.containers.lock().get(key)?.upgrade()
    }

    /// Keys of every container still alive
    pub fn active_containers(&self) -> Vec<ContainerKey> {
        let mut containers = self.inner.containers.lock();
        containers.retain(|_, weak| weak.strong_count() > 0);
        containers.keys().cloned().collect()
    }

    /// Append an interceptor to the global chain
    ///
    /// Global interceptors run after every container's local chain, in
    /// insertion order. Adding one affects executions that start afterwards.
    pub fn add_interceptor(&self, interceptor: Arc<dyn OperationInterceptor>) {
        self.inner.interceptors.lock().push(interceptor);
    }

    /// Snapshot of the global interceptor chain
    pub fn interceptor_chain(&self) -> InterceptorChain {
        self.inner.interceptors.lock().clone()
    }

    /// The controller-wide result registry
    pub fn result_registry(&self) -> &Arc<ResultRegistry> {
        &self.inner.results
    }

    /// A fresh typed result channel over this controller's registry
    pub fn result_channel<T: Any + Send>(&self) -> ResultChannel<T> {
        ResultChannel::new(Arc::clone(&self.inner.results))
    }

    /// The codec registry consulted when instances are opened
    pub fn codec_registry(&self) -> &CodecRegistry {
        &self.inner.codecs
    }

    /// Severity of the missing-codec check
    pub fn codec_policy(&self) -> CodecPolicy {
        self.inner.codec_policy
    }
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("global_interceptors", &self.inner.interceptors.lock().len())
            .field("codec_policy", &self.inner.codec_policy)
            .finish()
    }
}

/// Configures and builds a [`NavigationController`]
pub struct ControllerBuilder {
    interceptors: InterceptorChain,
    codecs: CodecRegistry,
    codec_policy: CodecPolicy,
    silence_policy: SilencePolicy,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self {
            interceptors: InterceptorChain::new(),
            codecs: CodecRegistry::with_defaults(),
            codec_policy: CodecPolicy::default(),
            silence_policy: SilencePolicy::default(),
        }
    }
}

impl ControllerBuilder {
    /// Append a global interceptor
    pub fn with_interceptor(mut self, interceptor: Arc<dyn OperationInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Register a metadata codec for `T`
    pub fn register_codec<T>(self) -> Self
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Any + Send + Sync,
    {
        self.codecs.register::<T>();
        self
    }

    /// Override the missing-codec severity
    pub fn with_codec_policy(mut self, policy: CodecPolicy) -> Self {
        self.codec_policy = policy;
        self
    }

    /// Override how silent closes interact with result delivery
    pub fn with_silence_policy(mut self, policy: SilencePolicy) -> Self {
        self.silence_policy = policy;
        self
    }

    /// Build the controller
    pub fn build(self) -> NavigationController {
        NavigationController {
            inner: Arc::new(ControllerInner {
                interceptors: Mutex::new(self.interceptors),
                results: Arc::new(ResultRegistry::with_policy(self.silence_policy)),
                codecs: self.codecs,
                codec_policy: self.codec_policy,
                containers: Mutex::new(HashMap::new()),
            }),
        }
    }
}
