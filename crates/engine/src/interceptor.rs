//! Ordered operation interceptor chains
//!
//! Every operation passes through two chains before it is applied: the
//! executing container's local chain, then the controller's global chain.
//! Within a chain, interceptors run in insertion order; each sees the output
//! of the previous one. An interceptor can pass an operation through
//! (possibly rewritten), veto it outright, or cancel it while scheduling a
//! replacement side effect.

use std::fmt;
use std::sync::Arc;

use crate::operation::{Operation, SideEffect};

/// Verdict of one interceptor on an in-flight operation
pub enum Intercepted {
    /// Proceed with this (possibly rewritten) operation
    Continue(Operation),
    /// Drop the operation; the backstack does not change and no events fire
    Veto,
    /// Drop the operation, then run the given effect after the guard releases
    CancelWith(SideEffect),
}

impl fmt::Debug for Intercepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intercepted::Continue(op) => write!(f, "Continue({op})"),
            Intercepted::Veto => write!(f, "Veto"),
            Intercepted::CancelWith(effect) => write!(f, "CancelWith({})", effect.name()),
        }
    }
}

/// A transformer applied to every operation before it commits
pub trait OperationInterceptor: Send + Sync {
    /// Inspect (and possibly replace) an in-flight operation
    fn intercept(&self, operation: Operation) -> Intercepted;
}

/// Adapter turning a closure into an interceptor
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(Operation) -> Intercepted + Send + Sync,
{
    /// Wrap a closure as an interceptor
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> OperationInterceptor for FnInterceptor<F>
where
    F: Fn(Operation) -> Intercepted + Send + Sync,
{
    fn intercept(&self, operation: Operation) -> Intercepted {
        (self.f)(operation)
    }
}

/// An insertion-ordered sequence of interceptors
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn OperationInterceptor>>,
}

impl InterceptorChain {
    /// An empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; it runs after every interceptor added before it
    pub fn push(&mut self, interceptor: Arc<dyn OperationInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Number of interceptors in the chain
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Fold `operation` through the chain
    ///
    /// Stops at the first `Veto` or `CancelWith`; otherwise each interceptor
    /// receives the previous one's output.
    pub fn intercept(&self, operation: Operation) -> Intercepted {
        let mut current = operation;
        for interceptor in &self.interceptors {
            match interceptor.intercept(current) {
                Intercepted::Continue(next) => current = next,
                halted => return halted,
            }
        }
        Intercepted::Continue(current)
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
