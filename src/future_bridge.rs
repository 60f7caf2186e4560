//! Bridge from `futures` futures to engine suspension handles.
//!
//! [`BridgedFuture`] wraps any `Future<Output = Result<Context, Failure>>`
//! as an async handle. The adapter drives the future on a dedicated thread
//! once both continuations are registered, so the engine thread never
//! blocks. Executor-managed ecosystems that would rather poll the future
//! themselves can register their own adapter instead.

use std::any::Any;
use std::future::Future;
use std::sync::Mutex;
use std::thread;

use futures::executor::block_on;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::adapter::{AsyncAdapter, FailureFn, SuccessFn};
use crate::context::Context;
use crate::error::Failure;

enum BridgeState {
    Waiting {
        future: Option<BoxFuture<'static, Result<Context, Failure>>>,
        on_success: Option<SuccessFn>,
        on_failure: Option<FailureFn>,
    },
    Launched,
}

/// A future packaged as an engine suspension handle.
pub struct BridgedFuture {
    state: Mutex<BridgeState>,
}

impl BridgedFuture {
    /// Wrap a future resolving to the suspended step's outcome.
    pub fn new(future: impl Future<Output = Result<Context, Failure>> + Send + 'static) -> Self {
        BridgedFuture {
            state: Mutex::new(BridgeState::Waiting {
                future: Some(future.boxed()),
                on_success: None,
                on_failure: None,
            }),
        }
    }

    fn attach_success(&self, callback: SuccessFn) {
        {
            let mut state = self.state.lock().expect("future bridge lock poisoned");
            if let BridgeState::Waiting { on_success, .. } = &mut *state {
                *on_success = Some(callback);
            }
        }
        self.try_launch();
    }

    fn attach_failure(&self, callback: FailureFn) {
        {
            let mut state = self.state.lock().expect("future bridge lock poisoned");
            if let BridgeState::Waiting { on_failure, .. } = &mut *state {
                *on_failure = Some(callback);
            }
        }
        self.try_launch();
    }

    /// Start driving the future once the handle holds both continuations.
    fn try_launch(&self) {
        let launched = {
            let mut state = self.state.lock().expect("future bridge lock poisoned");
            match &mut *state {
                BridgeState::Waiting {
                    future,
                    on_success,
                    on_failure,
                } if future.is_some() && on_success.is_some() && on_failure.is_some() => {
                    let future = future.take();
                    let on_success = on_success.take();
                    let on_failure = on_failure.take();
                    *state = BridgeState::Launched;
                    future.zip(on_success).zip(on_failure)
                }
                _ => None,
            }
        };
        let Some(((future, on_success), on_failure)) = launched else {
            return;
        };
        thread::spawn(move || match block_on(future) {
            Ok(ctx) => on_success(ctx),
            Err(failure) => on_failure(failure),
        });
    }
}

impl std::fmt::Debug for BridgedFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("future bridge lock poisoned");
        let tag = match &*state {
            BridgeState::Waiting { .. } => "Waiting",
            BridgeState::Launched => "Launched",
        };
        write!(f, "BridgedFuture({tag})")
    }
}

/// Adapter recognizing [`BridgedFuture`] handles.
pub struct FutureAdapter;

impl AsyncAdapter for FutureAdapter {
    fn is_async(&self, handle: &(dyn Any + Send)) -> bool {
        handle.downcast_ref::<BridgedFuture>().is_some()
    }

    fn on_success(&self, handle: &(dyn Any + Send), callback: SuccessFn) {
        if let Some(bridge) = handle.downcast_ref::<BridgedFuture>() {
            bridge.attach_success(callback);
        }
    }

    fn on_failure(&self, handle: &(dyn Any + Send), callback: FailureFn) {
        if let Some(bridge) = handle.downcast_ref::<BridgedFuture>() {
            bridge.attach_failure(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_bridge_delivers_success() {
        let bridge = BridgedFuture::new(async { Ok(Context::for_input(5i64)) });
        let (tx, rx) = mpsc::channel();
        let failure_tx = tx.clone();
        bridge.attach_success(Box::new(move |ctx| {
            let _ = tx.send(Ok(ctx.input().clone()));
        }));
        bridge.attach_failure(Box::new(move |failure| {
            let _ = failure_tx.send(Err(failure));
        }));

        let delivered = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("bridge delivered");
        assert_eq!(delivered.expect("success path").as_int(), Some(5));
    }

    #[test]
    fn test_bridge_delivers_failure() {
        let bridge = BridgedFuture::new(async { Err(Failure::message("downstream")) });
        let (tx, rx) = mpsc::channel();
        let failure_tx = tx.clone();
        bridge.attach_success(Box::new(move |_ctx| {
            let _ = tx.send(None);
        }));
        bridge.attach_failure(Box::new(move |failure| {
            let _ = failure_tx.send(Some(failure));
        }));

        let delivered = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("bridge delivered");
        let failure = delivered.expect("failure path");
        assert_eq!(failure.payload().as_str(), Some("downstream"));
    }

    #[test]
    fn test_bridge_waits_for_both_continuations() {
        let bridge = BridgedFuture::new(async { Ok(Context::for_input(())) });
        let (tx, rx) = mpsc::channel();
        bridge.attach_success(Box::new(move |_ctx| {
            let _ = tx.send(());
        }));
        // Only one continuation registered: nothing launched yet.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        bridge.attach_failure(Box::new(|_failure| {}));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
