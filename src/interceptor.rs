//! Canonical interceptor values and chain-element normalization.

use std::any::Any;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Failure;
use crate::value::Value;

/// What a step function hands back to the engine.
pub enum StepReturn {
    /// The step finished synchronously with this context.
    Ready(Context),
    /// The step suspended; the handle is resolved by a registered
    /// [`AsyncAdapter`](crate::adapter::AsyncAdapter).
    Suspended(Box<dyn Any + Send>),
}

impl StepReturn {
    /// Wrap an async handle for the adapter registry to recognize.
    pub fn suspended(handle: impl Any + Send) -> Self {
        StepReturn::Suspended(Box::new(handle))
    }
}

impl std::fmt::Debug for StepReturn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepReturn::Ready(ctx) => f.debug_tuple("Ready").field(ctx).finish(),
            StepReturn::Suspended(_) => f.write_str("Suspended(..)"),
        }
    }
}

/// Result of invoking one step function.
///
/// `Err` is the explicit-error form: equivalent to the step raising, with
/// the failure payload recorded on the pre-call context.
pub type StepResult = Result<StepReturn, Failure>;

/// A step function: consumes one context, produces the next.
pub type StepFn = dyn Fn(Context) -> StepResult + Send + Sync;

/// Conversions accepted as a step function's return value.
///
/// Lets step closures return a plain `Context`, a [`StepReturn`], or either
/// `Result` form without wrapping ceremony.
pub trait IntoStepResult {
    fn into_step_result(self) -> StepResult;
}

impl IntoStepResult for Context {
    fn into_step_result(self) -> StepResult {
        Ok(StepReturn::Ready(self))
    }
}

impl IntoStepResult for StepReturn {
    fn into_step_result(self) -> StepResult {
        Ok(self)
    }
}

impl IntoStepResult for Result<Context, Failure> {
    fn into_step_result(self) -> StepResult {
        self.map(StepReturn::Ready)
    }
}

impl IntoStepResult for StepResult {
    fn into_step_result(self) -> StepResult {
        self
    }
}

/// A named bundle of up to three phase steps.
///
/// Immutable once constructed; cloning shares the step functions, so one
/// interceptor value can sit in many chains and executions concurrently.
#[derive(Clone)]
pub struct Interceptor {
    name: String,
    enter: Option<Arc<StepFn>>,
    leave: Option<Arc<StepFn>>,
    error: Option<Arc<StepFn>>,
}

impl Interceptor {
    /// Create an interceptor with no steps. Absent steps are no-ops.
    pub fn named(name: impl Into<String>) -> Self {
        Interceptor {
            name: name.into(),
            enter: None,
            leave: None,
            error: None,
        }
    }

    /// Attach the forward-phase step.
    pub fn on_enter<F, R>(mut self, step: F) -> Self
    where
        F: Fn(Context) -> R + Send + Sync + 'static,
        R: IntoStepResult,
    {
        self.enter = Some(Arc::new(move |ctx| step(ctx).into_step_result()));
        self
    }

    /// Attach the unwind-phase step taken when no error is in flight.
    pub fn on_leave<F, R>(mut self, step: F) -> Self
    where
        F: Fn(Context) -> R + Send + Sync + 'static,
        R: IntoStepResult,
    {
        self.leave = Some(Arc::new(move |ctx| step(ctx).into_step_result()));
        self
    }

    /// Attach the unwind-phase step taken while an error is in flight.
    pub fn on_error<F, R>(mut self, step: F) -> Self
    where
        F: Fn(Context) -> R + Send + Sync + 'static,
        R: IntoStepResult,
    {
        self.error = Some(Arc::new(move |ctx| step(ctx).into_step_result()));
        self
    }

    /// The interceptor's name. Diagnostics only.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn enter_step(&self) -> Option<&Arc<StepFn>> {
        self.enter.as_ref()
    }

    pub(crate) fn leave_step(&self) -> Option<&Arc<StepFn>> {
        self.leave.as_ref()
    }

    pub(crate) fn error_step(&self) -> Option<&Arc<StepFn>> {
        self.error.as_ref()
    }

    /// Which steps are present, as `(enter, leave, error)`.
    pub fn steps_present(&self) -> (bool, bool, bool) {
        (
            self.enter.is_some(),
            self.leave.is_some(),
            self.error.is_some(),
        )
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (enter, leave, error) = self.steps_present();
        f.debug_struct("Interceptor")
            .field("name", &self.name)
            .field("enter", &enter)
            .field("leave", &leave)
            .field("error", &error)
            .finish()
    }
}

/// Normalization of raw chain elements into canonical interceptors.
///
/// Canonical interceptors pass through unchanged; a bare `Fn(Value) -> Value`
/// becomes a terminal handler whose enter step applies the function to the
/// context's input and writes the result into the response.
pub trait IntoInterceptor {
    fn into_interceptor(self) -> Interceptor;
}

impl IntoInterceptor for Interceptor {
    fn into_interceptor(self) -> Interceptor {
        self
    }
}

impl<F> IntoInterceptor for F
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    fn into_interceptor(self) -> Interceptor {
        Interceptor::named("handler").on_enter(move |ctx: Context| {
            let response = self(ctx.input().clone());
            ctx.with_response(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_present_steps() {
        let interceptor = Interceptor::named("auth")
            .on_enter(|ctx: Context| ctx)
            .on_error(|ctx: Context| ctx);
        assert_eq!(interceptor.name(), "auth");
        assert_eq!(interceptor.steps_present(), (true, false, true));
    }

    #[test]
    fn test_normalize_canonical_is_identity() {
        let interceptor = Interceptor::named("id").on_leave(|ctx: Context| ctx);
        let normalized = interceptor.clone().into_interceptor();
        assert_eq!(normalized.name(), "id");
        assert_eq!(normalized.steps_present(), interceptor.steps_present());
    }

    #[test]
    fn test_normalize_bare_function_writes_response() {
        let handler = (|input: Value| Value::Int(input.as_int().unwrap_or(0) + 1))
            .into_interceptor();
        assert_eq!(handler.steps_present(), (true, false, false));

        let ctx = Context::for_input(Value::Int(41));
        let step = handler.enter_step().expect("enter step present");
        match step(ctx) {
            Ok(StepReturn::Ready(next)) => {
                assert_eq!(next.response(), Some(&Value::Int(42)));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_never_prints_steps() {
        let interceptor = Interceptor::named("trace").on_enter(|ctx: Context| ctx);
        let rendered = format!("{interceptor:?}");
        assert!(rendered.contains("trace"));
        assert!(rendered.contains("enter"));
    }
}
