//! Built-in completion-cell handle and its adapter.
//!
//! A [`Completion`] is a one-shot, thread-safe cell a producer settles with
//! either a context or a failure. It is the crate's reference async handle:
//! cheap, runtime-free, and usable from any thread.

use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::adapter::{AsyncAdapter, FailureFn, SuccessFn};
use crate::context::Context;
use crate::error::Failure;

enum CompletionState {
    Pending {
        on_success: Option<SuccessFn>,
        on_failure: Option<FailureFn>,
    },
    Resolved(Option<Context>),
    Failed(Option<Failure>),
    Delivered,
}

/// One-shot completion cell. Clones share the same cell.
///
/// The first `resolve`/`fail` wins; later settlements are ignored. The
/// registered continuation fires on whichever thread settles the cell, or
/// synchronously at registration when the cell is already settled.
#[derive(Clone)]
pub struct Completion {
    state: Arc<Mutex<CompletionState>>,
}

impl Completion {
    /// A pending completion.
    pub fn new() -> Self {
        Completion {
            state: Arc::new(Mutex::new(CompletionState::Pending {
                on_success: None,
                on_failure: None,
            })),
        }
    }

    /// A completion already settled with a context.
    pub fn resolved(ctx: Context) -> Self {
        Completion {
            state: Arc::new(Mutex::new(CompletionState::Resolved(Some(ctx)))),
        }
    }

    /// A completion already settled with a failure.
    pub fn failed(failure: Failure) -> Self {
        Completion {
            state: Arc::new(Mutex::new(CompletionState::Failed(Some(failure)))),
        }
    }

    /// Settle with a context. No-op if already settled.
    pub fn resolve(&self, ctx: Context) {
        let callback = {
            let mut state = self.state.lock().expect("completion lock poisoned");
            match &mut *state {
                CompletionState::Pending { on_success, .. } => match on_success.take() {
                    Some(callback) => {
                        *state = CompletionState::Delivered;
                        Some(callback)
                    }
                    None => {
                        *state = CompletionState::Resolved(Some(ctx));
                        return;
                    }
                },
                _ => return,
            }
        };
        if let Some(callback) = callback {
            callback(ctx);
        }
    }

    /// Settle with a failure. No-op if already settled.
    pub fn fail(&self, failure: Failure) {
        let callback = {
            let mut state = self.state.lock().expect("completion lock poisoned");
            match &mut *state {
                CompletionState::Pending { on_failure, .. } => match on_failure.take() {
                    Some(callback) => {
                        *state = CompletionState::Delivered;
                        Some(callback)
                    }
                    None => {
                        *state = CompletionState::Failed(Some(failure));
                        return;
                    }
                },
                _ => return,
            }
        };
        if let Some(callback) = callback {
            callback(failure);
        }
    }

    fn attach_success(&self, callback: SuccessFn) {
        let fire = {
            let mut state = self.state.lock().expect("completion lock poisoned");
            match &mut *state {
                CompletionState::Pending { on_success, .. } => {
                    *on_success = Some(callback);
                    None
                }
                CompletionState::Resolved(ctx) => {
                    let ctx = ctx.take();
                    *state = CompletionState::Delivered;
                    ctx.map(|ctx| (callback, ctx))
                }
                _ => None,
            }
        };
        if let Some((callback, ctx)) = fire {
            callback(ctx);
        }
    }

    fn attach_failure(&self, callback: FailureFn) {
        let fire = {
            let mut state = self.state.lock().expect("completion lock poisoned");
            match &mut *state {
                CompletionState::Pending { on_failure, .. } => {
                    *on_failure = Some(callback);
                    None
                }
                CompletionState::Failed(failure) => {
                    let failure = failure.take();
                    *state = CompletionState::Delivered;
                    failure.map(|failure| (callback, failure))
                }
                _ => None,
            }
        };
        if let Some((callback, failure)) = fire {
            callback(failure);
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("completion lock poisoned");
        let tag = match &*state {
            CompletionState::Pending { .. } => "Pending",
            CompletionState::Resolved(_) => "Resolved",
            CompletionState::Failed(_) => "Failed",
            CompletionState::Delivered => "Delivered",
        };
        write!(f, "Completion({tag})")
    }
}

/// Adapter recognizing [`Completion`] handles.
pub struct CompletionAdapter;

impl AsyncAdapter for CompletionAdapter {
    fn is_async(&self, handle: &(dyn Any + Send)) -> bool {
        handle.downcast_ref::<Completion>().is_some()
    }

    fn on_success(&self, handle: &(dyn Any + Send), callback: SuccessFn) {
        if let Some(completion) = handle.downcast_ref::<Completion>() {
            completion.attach_success(callback);
        }
    }

    fn on_failure(&self, handle: &(dyn Any + Send), callback: FailureFn) {
        if let Some(completion) = handle.downcast_ref::<Completion>() {
            completion.attach_failure(callback);
        }
    }
}
