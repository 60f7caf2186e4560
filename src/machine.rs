//! The execution trampoline.
//!
//! One resumable loop drives a context forward through enter steps, then
//! unwinds through leave/error steps. Suspension never blocks the driving
//! thread and never recurses through adapter callbacks: a handle settled
//! during registration hands its value back to the loop still on the stack,
//! and a handle settled later re-enters the loop from the settling thread.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::adapter::{AdapterRegistry, FailureFn, SuccessFn};
use crate::chain_debug_log;
use crate::context::Context;
use crate::error::Failure;
use crate::interceptor::{Interceptor, StepFn, StepReturn};
use crate::value::Value;

/// Terminal outcome of one execution: the response (possibly absent) or the
/// unrecovered failure.
pub type ChainResult = Result<Option<Value>, Failure>;

/// Terminal delivery callback. Invoked exactly once per execution unless
/// every resumption path is dropped.
pub(crate) type DoneFn = Box<dyn FnOnce(ChainResult) + Send>;

/// Which half of the execution the loop is in. Once the forward phase has
/// been exited it is never re-entered, even if an unwind step repopulates
/// the pending list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Forward,
    Unwind,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Enter,
    Leave,
    Error,
}

/// Everything needed to resume after a suspension settles.
struct ResumePoint {
    stage: Stage,
    /// Present for enter-phase suspensions: the interceptor awaiting its
    /// post-call completed-list bookkeeping.
    entered: Option<Arc<Interceptor>>,
    name: String,
    /// Pre-call context, the base for failure delivery.
    pre: Context,
}

enum Settled {
    Value(Context),
    Failed(Failure),
}

enum Invocation {
    Ready(Context),
    Suspended {
        handle: Box<dyn Any + Send>,
        pre: Context,
    },
}

enum SuspendOutcome {
    /// Settled during registration; the loop continues in place.
    Ready {
        resume: ResumePoint,
        done: DoneFn,
        settled: Settled,
    },
    /// Parked; the settling thread re-enters the loop.
    Parked,
}

enum SuspensionState {
    Registering,
    Parked {
        resume: ResumePoint,
        registry: Arc<AdapterRegistry>,
        done: DoneFn,
    },
    Fired(Settled),
    Consumed,
}

/// Handoff cell between the parking loop and the adapter's callbacks.
struct Suspension {
    state: Mutex<SuspensionState>,
}

impl Suspension {
    fn new() -> Self {
        Suspension {
            state: Mutex::new(SuspensionState::Registering),
        }
    }

    /// Deliver the handle's settlement. Called by adapter callbacks; a
    /// second settlement for the same handle is ignored.
    fn settle(&self, settled: Settled) {
        let parked = {
            let mut state = self.state.lock().expect("suspension lock poisoned");
            match std::mem::replace(&mut *state, SuspensionState::Consumed) {
                SuspensionState::Registering => {
                    *state = SuspensionState::Fired(settled);
                    return;
                }
                SuspensionState::Parked {
                    resume,
                    registry,
                    done,
                } => Some((resume, registry, done)),
                already @ SuspensionState::Fired(_) => {
                    *state = already;
                    None
                }
                SuspensionState::Consumed => None,
            }
        };
        if let Some((resume, registry, done)) = parked {
            let (stage, ctx) = absorb(resume, settled);
            run_stage(registry, stage, ctx, done);
        }
    }

    /// Called once by the loop after registering both callbacks. Returns the
    /// settlement if it already fired, otherwise parks the resume state.
    fn park(
        &self,
        resume: ResumePoint,
        registry: Arc<AdapterRegistry>,
        done: DoneFn,
    ) -> Option<(ResumePoint, DoneFn, Settled)> {
        let mut state = self.state.lock().expect("suspension lock poisoned");
        match std::mem::replace(&mut *state, SuspensionState::Consumed) {
            SuspensionState::Registering => {
                *state = SuspensionState::Parked {
                    resume,
                    registry,
                    done,
                };
                None
            }
            SuspensionState::Fired(settled) => Some((resume, done, settled)),
            other => {
                debug_assert!(false, "suspension parked twice");
                *state = other;
                None
            }
        }
    }
}

/// Start an execution and deliver its terminal outcome through `done`.
pub(crate) fn run(registry: Arc<AdapterRegistry>, ctx: Context, done: DoneFn) {
    run_stage(registry, Stage::Forward, ctx, done);
}

fn run_stage(registry: Arc<AdapterRegistry>, mut stage: Stage, mut ctx: Context, mut done: DoneFn) {
    loop {
        let Some((interceptor, phase)) = next_step(&mut stage, &mut ctx) else {
            return done(terminal(ctx));
        };
        chain_debug_log!("[weft] {:?} {}", phase, interceptor.name());

        let step = match phase {
            Phase::Enter => interceptor.enter_step(),
            Phase::Leave => interceptor.leave_step(),
            Phase::Error => interceptor.error_step(),
        };
        match invoke_step(step, interceptor.name(), ctx) {
            Invocation::Ready(next) => {
                ctx = match phase {
                    Phase::Enter => settle_enter(&interceptor, next),
                    Phase::Leave | Phase::Error => next,
                };
            }
            Invocation::Suspended { handle, pre } => {
                let entered = match phase {
                    Phase::Enter => Some(Arc::clone(&interceptor)),
                    Phase::Leave | Phase::Error => None,
                };
                let resume = ResumePoint {
                    stage,
                    entered,
                    name: interceptor.name().to_string(),
                    pre,
                };
                match suspend(&registry, handle, resume, done) {
                    SuspendOutcome::Parked => return,
                    SuspendOutcome::Ready {
                        resume,
                        done: resumed_done,
                        settled,
                    } => {
                        let (resumed_stage, resumed_ctx) = absorb(resume, settled);
                        stage = resumed_stage;
                        ctx = resumed_ctx;
                        done = resumed_done;
                    }
                }
            }
        }
    }
}

/// Decide the next step. Re-evaluated on every iteration, so the error/leave
/// choice tracks the context's current error state.
fn next_step(stage: &mut Stage, ctx: &mut Context) -> Option<(Arc<Interceptor>, Phase)> {
    if *stage == Stage::Forward {
        if ctx.error().is_none() && ctx.response().is_none() {
            if let Some(interceptor) = ctx.pop_pending() {
                return Some((interceptor, Phase::Enter));
            }
        }
        *stage = Stage::Unwind;
    }
    let interceptor = ctx.pop_completed()?;
    let phase = if ctx.error().is_some() {
        Phase::Error
    } else {
        Phase::Leave
    };
    Some((interceptor, phase))
}

/// Invoke one step, converting panics and explicit `Err` returns into an
/// error on the pre-call context. The response is left untouched.
fn invoke_step(step: Option<&Arc<StepFn>>, name: &str, ctx: Context) -> Invocation {
    let Some(step) = step else {
        return Invocation::Ready(ctx);
    };
    let pre = ctx.clone();
    let step = Arc::clone(step);
    match catch_unwind(AssertUnwindSafe(move || step(ctx))) {
        Ok(Ok(StepReturn::Ready(next))) => Invocation::Ready(next),
        Ok(Ok(StepReturn::Suspended(handle))) => Invocation::Suspended { handle, pre },
        Ok(Err(failure)) => Invocation::Ready(pre.with_error(failure.with_origin(name))),
        Err(panic) => Invocation::Ready(pre.with_error(Failure::from_panic(panic).with_origin(name))),
    }
}

/// Post-call bookkeeping for an enter step, applied to the final returned
/// (or resolved) context: the interceptor joins the completed list only if
/// pending is still present and neither response nor error is set.
fn settle_enter(interceptor: &Arc<Interceptor>, mut ctx: Context) -> Context {
    if ctx.pending().is_some() && ctx.response().is_none() && ctx.error().is_none() {
        ctx.push_completed(Arc::clone(interceptor));
    }
    ctx
}

/// Fold a settlement into the context the loop resumes with.
fn absorb(resume: ResumePoint, settled: Settled) -> (Stage, Context) {
    let ResumePoint {
        stage,
        entered,
        name,
        pre,
    } = resume;
    let ctx = match settled {
        Settled::Value(ctx) => ctx,
        Settled::Failed(failure) => pre.with_error(failure.with_origin(&name)),
    };
    let ctx = match entered {
        Some(interceptor) => settle_enter(&interceptor, ctx),
        None => ctx,
    };
    (stage, ctx)
}

fn suspend(
    registry: &Arc<AdapterRegistry>,
    handle: Box<dyn Any + Send>,
    resume: ResumePoint,
    done: DoneFn,
) -> SuspendOutcome {
    let Some(adapter) = registry.recognize(handle.as_ref()) else {
        let failure = Failure::message(
            "step returned an async handle no registered adapter recognizes",
        );
        return SuspendOutcome::Ready {
            resume,
            done,
            settled: Settled::Failed(failure),
        };
    };

    let suspension = Arc::new(Suspension::new());
    let on_success: SuccessFn = {
        let suspension = Arc::clone(&suspension);
        Box::new(move |ctx| suspension.settle(Settled::Value(ctx)))
    };
    let on_failure: FailureFn = {
        let suspension = Arc::clone(&suspension);
        Box::new(move |failure| suspension.settle(Settled::Failed(failure)))
    };
    adapter.on_success(handle.as_ref(), on_success);
    adapter.on_failure(handle.as_ref(), on_failure);

    match suspension.park(resume, Arc::clone(registry), done) {
        Some((resume, done, settled)) => SuspendOutcome::Ready {
            resume,
            done,
            settled,
        },
        None => SuspendOutcome::Parked,
    }
}

fn terminal(ctx: Context) -> ChainResult {
    let (response, error) = ctx.into_outcome();
    match error {
        Some(failure) => Err(failure),
        None => Ok(response),
    }
}
