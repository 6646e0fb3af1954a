// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Leading-edge debouncing of async actions
//!
//! The first call of a burst runs immediately. Calls arriving while the window
//! is open replace the pending arguments and restart the window; when it finally
//! elapses the action runs once with the last arguments and every waiting call
//! receives that result. In delayed mode the first call waits for the window too.
//!
//! Timers are never aborted: each one carries the generation it was started for
//! and does nothing when a newer call has bumped the generation.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Debouncer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No window open; the next call runs immediately
    Idle,
    /// A leading call ran; the window is open with nothing pending
    Immediate,
    /// Calls are pending for the trailing execution
    WindowOpen,
}

type Action<A, T> = Box<dyn Fn(A) -> BoxFuture<'static, T> + Send + Sync>;

struct State<A, T> {
    phase: Phase,
    generation: u64,
    pending: Option<A>,
    waiters: Vec<oneshot::Sender<T>>,
}

struct Shared<A, T> {
    action: Action<A, T>,
    delay: Duration,
    delayed: bool,
    state: Mutex<State<A, T>>,
}

/// Debounced async action
pub struct Debouncer<A, T> {
    shared: Arc<Shared<A, T>>,
}

impl<A, T> Clone for Debouncer<A, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, T> Debouncer<A, T>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
{
    /// Debounce `action`, running the first call of a burst immediately
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::build(delay, false, action)
    }

    /// Debounce `action`, delaying the first call of a burst as well
    pub fn delayed<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::build(delay, true, action)
    }

    fn build<F, Fut>(delay: Duration, delayed: bool, action: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                action: Box::new(move |args| action(args).boxed()),
                delay,
                delayed,
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    generation: 0,
                    pending: None,
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Invoke the debounced action
    ///
    /// Resolves to the result of the execution that covered this call, or `None`
    /// if the runtime shut down before it ran.
    pub fn call(&self, args: A) -> BoxFuture<'static, Option<T>> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state.lock();
        state.generation += 1;
        let generation = state.generation;

        if state.phase == Phase::Idle && !shared.delayed {
            state.phase = Phase::Immediate;
            drop(state);
            Self::close_window_later(&shared, generation);
            let execution = (shared.action)(args);
            return async move { Some(execution.await) }.boxed();
        }

        let (sender, receiver) = oneshot::channel();
        state.phase = Phase::WindowOpen;
        state.pending = Some(args);
        state.waiters.push(sender);
        drop(state);
        Self::run_trailing_later(&shared, generation);
        async move { receiver.await.ok() }.boxed()
    }

    fn close_window_later(shared: &Arc<Shared<A, T>>, generation: u64) {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(shared.delay).await;
            let mut state = shared.state.lock();
            if state.generation == generation && state.phase == Phase::Immediate {
                state.phase = Phase::Idle;
            }
        });
    }

    fn run_trailing_later(shared: &Arc<Shared<A, T>>, generation: u64) {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(shared.delay).await;
            let (args, waiters) = {
                let mut state = shared.state.lock();
                if state.generation != generation {
                    return;
                }
                let Some(args) = state.pending.take() else {
                    return;
                };
                (args, std::mem::take(&mut state.waiters))
            };

            let result = (shared.action)(args).await;
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }

            let mut state = shared.state.lock();
            if state.generation == generation {
                state.phase = Phase::Idle;
            }
        });
    }
}
