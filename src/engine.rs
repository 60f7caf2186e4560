//! Chain assembly and execution entry points.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;

use crate::adapter::{AdapterRegistry, AsyncAdapter};
use crate::completion::CompletionAdapter;
use crate::context::Context;
use crate::error::Failure;
#[cfg(feature = "futures-bridge")]
use crate::future_bridge::FutureAdapter;
use crate::interceptor::{Interceptor, IntoInterceptor};
use crate::machine::{self, ChainResult};
use crate::value::Value;

/// An ordered, normalized sequence of interceptors.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    interceptors: Vec<Arc<Interceptor>>,
}

impl Chain {
    /// An empty chain.
    pub fn new() -> Self {
        Chain {
            interceptors: Vec::new(),
        }
    }

    /// Append a chain element, normalizing it into a canonical interceptor.
    pub fn then(mut self, element: impl IntoInterceptor) -> Self {
        self.interceptors.push(Arc::new(element.into_interceptor()));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    fn pending(&self) -> VecDeque<Arc<Interceptor>> {
        self.interceptors.iter().cloned().collect()
    }
}

impl<T: IntoInterceptor> FromIterator<T> for Chain {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Chain::new(), |chain, element| chain.then(element))
    }
}

/// Executes chains against a registry of async adapters.
///
/// Cloning an engine shares its registry. The default engine recognizes
/// [`Completion`](crate::completion::Completion) handles, plus
/// [`BridgedFuture`](crate::future_bridge::BridgedFuture) handles when the
/// `futures-bridge` feature is enabled.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<AdapterRegistry>,
}

impl Engine {
    /// An engine with the built-in adapters registered.
    pub fn new() -> Self {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(CompletionAdapter));
        #[cfg(feature = "futures-bridge")]
        registry.register(Arc::new(FutureAdapter));
        Engine {
            registry: Arc::new(registry),
        }
    }

    /// An engine over a caller-assembled registry.
    pub fn with_registry(registry: Arc<AdapterRegistry>) -> Self {
        Engine { registry }
    }

    /// Register an adapter for an additional async handle type.
    pub fn register_adapter(&self, adapter: Arc<dyn AsyncAdapter>) {
        self.registry.register(adapter);
    }

    /// Execute a chain, blocking the calling thread across suspensions.
    ///
    /// Success yields the terminal response, which is absent when no step
    /// set one. Failure re-surfaces the unrecovered failure payload. If the
    /// execution is abandoned mid-suspension (every resumption path
    /// dropped), a descriptive failure is returned instead of deadlocking.
    pub fn execute(&self, chain: &Chain, input: impl Into<Value>) -> ChainResult {
        let (tx, rx) = mpsc::channel();
        let ctx = Context::new(chain.pending(), input.into());
        machine::run(
            Arc::clone(&self.registry),
            ctx,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        match rx.recv() {
            Ok(result) => result,
            Err(_) => Err(Failure::message(
                "execution abandoned before a terminal outcome was produced",
            )),
        }
    }

    /// Execute a chain without blocking; exactly one callback fires.
    pub fn execute_async(
        &self,
        chain: &Chain,
        input: impl Into<Value>,
        on_success: impl FnOnce(Option<Value>) + Send + 'static,
        on_failure: impl FnOnce(Failure) + Send + 'static,
    ) {
        let ctx = Context::new(chain.pending(), input.into());
        machine::run(
            Arc::clone(&self.registry),
            ctx,
            Box::new(move |result| match result {
                Ok(response) => on_success(response),
                Err(failure) => on_failure(failure),
            }),
        );
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute a chain on a fresh default engine. See [`Engine::execute`].
pub fn execute(chain: &Chain, input: impl Into<Value>) -> ChainResult {
    Engine::new().execute(chain, input)
}

/// Execute a chain on a fresh default engine without blocking.
/// See [`Engine::execute_async`].
pub fn execute_async(
    chain: &Chain,
    input: impl Into<Value>,
    on_success: impl FnOnce(Option<Value>) + Send + 'static,
    on_failure: impl FnOnce(Failure) + Send + 'static,
) {
    Engine::new().execute_async(chain, input, on_success, on_failure);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_assembly_preserves_order() {
        let chain = Chain::new()
            .then(Interceptor::named("a"))
            .then(Interceptor::named("b"))
            .then(|input: Value| input);
        assert_eq!(chain.len(), 3);
        let names: Vec<&str> = chain.interceptors.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["a", "b", "handler"]);
    }

    #[test]
    fn test_chain_from_iterator() {
        let chain: Chain = vec![Interceptor::named("x"), Interceptor::named("y")]
            .into_iter()
            .collect();
        assert_eq!(chain.len(), 2);
        assert!(!chain.is_empty());
    }

    #[test]
    fn test_empty_chain_produces_no_response() {
        let outcome = execute(&Chain::new(), 1i64);
        assert_eq!(outcome, Ok(None));
    }
}
