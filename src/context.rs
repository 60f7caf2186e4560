//! Execution context threaded through every step.
//!
//! A context is consumed by value and a new one is returned; nothing is
//! shared between steps or between executions. `pending` is the step-visible
//! work list; `completed` is engine-maintained bookkeeping for the unwind.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Failure;
use crate::interceptor::{Interceptor, IntoInterceptor};
use crate::value::Value;

/// State of one execution, threaded by value through every step.
#[derive(Debug, Clone)]
pub struct Context {
    input: Value,
    response: Option<Value>,
    error: Option<Failure>,
    pending: Option<VecDeque<Arc<Interceptor>>>,
    completed: Vec<Arc<Interceptor>>,
}

impl Context {
    /// Build the initial context for an execution.
    pub(crate) fn new(pending: VecDeque<Arc<Interceptor>>, input: Value) -> Self {
        Context {
            input,
            response: None,
            error: None,
            pending: Some(pending),
            completed: Vec::new(),
        }
    }

    /// A context with no pending work, for driving steps directly in tests
    /// or when composing interceptors outside an engine.
    pub fn for_input(input: impl Into<Value>) -> Self {
        Context::new(VecDeque::new(), input.into())
    }

    /// The original input value. Read-only after creation.
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// The response, if some step has set one.
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    /// The in-flight failure, if any.
    pub fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    /// Set the response. During the forward phase this stops forward
    /// progress and begins the unwind.
    pub fn with_response(mut self, response: impl Into<Value>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Remove the response.
    pub fn clear_response(mut self) -> Self {
        self.response = None;
        self
    }

    /// Set (or replace) the in-flight failure.
    pub fn with_error(mut self, failure: Failure) -> Self {
        self.error = Some(failure);
        self
    }

    /// Clear the in-flight failure. In an error step this recovers the
    /// execution: the rest of the unwind runs in leave mode.
    pub fn clear_error(mut self) -> Self {
        self.error = None;
        self
    }

    /// The not-yet-entered work list, front first. Absent after [`halt`].
    ///
    /// [`halt`]: Context::halt
    pub fn pending(&self) -> Option<&VecDeque<Arc<Interceptor>>> {
        self.pending.as_ref()
    }

    /// Replace the pending work list wholesale.
    pub fn set_pending(mut self, pending: VecDeque<Arc<Interceptor>>) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Append an interceptor to the back of the pending list.
    pub fn enqueue(mut self, element: impl IntoInterceptor) -> Self {
        self.pending
            .get_or_insert_with(VecDeque::new)
            .push_back(Arc::new(element.into_interceptor()));
        self
    }

    /// Insert an interceptor to run next, before everything else pending.
    pub fn push_next(mut self, element: impl IntoInterceptor) -> Self {
        self.pending
            .get_or_insert_with(VecDeque::new)
            .push_front(Arc::new(element.into_interceptor()));
        self
    }

    /// Drop the interceptor that would otherwise enter next.
    pub fn drop_next(mut self) -> Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.pop_front();
        }
        self
    }

    /// Remove the pending list entirely.
    ///
    /// Remaining pending interceptors never enter. Unlike leaving an empty
    /// list in place, the interceptor whose step halts is itself excluded
    /// from the unwind.
    pub fn halt(mut self) -> Self {
        self.pending = None;
        self
    }

    /// Interceptors whose enter step completed cleanly, in entry order
    /// (most recently entered last). Maintained by the engine.
    pub fn completed(&self) -> &[Arc<Interceptor>] {
        &self.completed
    }

    pub(crate) fn pop_pending(&mut self) -> Option<Arc<Interceptor>> {
        self.pending.as_mut()?.pop_front()
    }

    pub(crate) fn push_completed(&mut self, interceptor: Arc<Interceptor>) {
        self.completed.push(interceptor);
    }

    pub(crate) fn pop_completed(&mut self) -> Option<Arc<Interceptor>> {
        self.completed.pop()
    }

    pub(crate) fn into_outcome(self) -> (Option<Value>, Option<Failure>) {
        (self.response, self.error)
    }
}
