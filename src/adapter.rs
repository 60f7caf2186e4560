//! Pluggable recognition of asynchronous step results.
//!
//! The engine never imports a concrete async primitive. A step that wants to
//! suspend returns an opaque handle; the registry asks each adapter whether
//! it recognizes the handle and the recognizing adapter delivers the
//! eventual result through the registered continuations.

use std::any::Any;
use std::sync::{Arc, RwLock};

use crate::context::Context;
use crate::error::Failure;

/// Continuation receiving a suspended step's eventual context.
pub type SuccessFn = Box<dyn FnOnce(Context) + Send>;

/// Continuation receiving a suspended step's eventual failure payload.
pub type FailureFn = Box<dyn FnOnce(Failure) + Send>;

/// Capability contract over one asynchronous handle type.
///
/// Callbacks may fire synchronously from inside the registration call when
/// the handle is already settled, or later from whatever thread the adapter
/// chooses. For a given handle exactly one of the two callbacks fires, once.
pub trait AsyncAdapter: Send + Sync {
    /// Whether this adapter recognizes the handle.
    fn is_async(&self, handle: &(dyn Any + Send)) -> bool;

    /// Register the success continuation.
    fn on_success(&self, handle: &(dyn Any + Send), callback: SuccessFn);

    /// Register the failure continuation.
    fn on_failure(&self, handle: &(dyn Any + Send), callback: FailureFn);
}

/// Open set of registered adapters, consulted in registration order.
pub struct AdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AsyncAdapter>>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        AdapterRegistry {
            adapters: RwLock::new(Vec::new()),
        }
    }

    /// Register an adapter for an additional handle type.
    pub fn register(&self, adapter: Arc<dyn AsyncAdapter>) {
        self.adapters
            .write()
            .expect("adapter registry lock poisoned")
            .push(adapter);
    }

    /// Find the first adapter recognizing the handle.
    pub fn recognize(&self, handle: &(dyn Any + Send)) -> Option<Arc<dyn AsyncAdapter>> {
        self.adapters
            .read()
            .expect("adapter registry lock poisoned")
            .iter()
            .find(|adapter| adapter.is_async(handle))
            .cloned()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnitAdapter;

    impl AsyncAdapter for UnitAdapter {
        fn is_async(&self, handle: &(dyn Any + Send)) -> bool {
            handle.downcast_ref::<()>().is_some()
        }

        fn on_success(&self, _handle: &(dyn Any + Send), _callback: SuccessFn) {}

        fn on_failure(&self, _handle: &(dyn Any + Send), _callback: FailureFn) {}
    }

    #[test]
    fn test_registry_recognizes_by_handle_type() {
        let registry = AdapterRegistry::new();
        assert!(registry.recognize(&()).is_none());

        registry.register(Arc::new(UnitAdapter));
        assert!(registry.recognize(&()).is_some());
        assert!(registry.recognize(&1u8).is_none());
    }
}
