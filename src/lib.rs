//! weft: interceptor chain execution engine.
//!
//! A chain is an ordered list of named interceptors, each with optional
//! `enter`, `leave`, and `error` steps. The engine drives a context forward
//! through every enter step, then unwinds through leave steps (or error
//! steps while a failure is in flight), producing one terminal outcome.
//!
//! # Architecture
//!
//! - **Context-as-value**: every step consumes one [`Context`] and returns
//!   the next; no shared mutable state between steps or executions
//! - **Trampolined loop**: synchronous continues and asynchronous
//!   resumptions re-enter one loop body; chained suspensions never grow
//!   the call stack
//! - **Self-modifying work list**: steps read and rewrite the pending list
//!   to insert, drop, or halt future work
//! - **Pluggable async**: the engine depends only on the
//!   [`AsyncAdapter`] capability contract, never on a concrete async
//!   primitive
//!
//! # Example
//!
//! ```
//! use weft::{execute, Chain, Context, Interceptor, Value};
//!
//! let chain = Chain::new()
//!     .then(Interceptor::named("tag").on_leave(|ctx: Context| ctx))
//!     .then(|input: Value| Value::Int(input.as_int().unwrap_or(0) + 1));
//!
//! assert_eq!(execute(&chain, 41i64), Ok(Some(Value::Int(42))));
//! ```

pub mod adapter;
pub mod completion;
pub mod context;
mod debug_log;
pub mod engine;
pub mod error;
#[cfg(feature = "futures-bridge")]
pub mod future_bridge;
pub mod interceptor;
mod machine;
pub mod value;


// Re-exports for convenience
pub use adapter::{AdapterRegistry, AsyncAdapter, FailureFn, SuccessFn};
pub use completion::{Completion, CompletionAdapter};
pub use context::Context;
pub use engine::{execute, execute_async, Chain, Engine};
pub use error::Failure;
#[cfg(feature = "futures-bridge")]
pub use future_bridge::{BridgedFuture, FutureAdapter};
pub use interceptor::{
    Interceptor, IntoInterceptor, IntoStepResult, StepFn, StepResult, StepReturn,
};
pub use machine::ChainResult;
pub use value::Value;
