//! One-shot shared result slot.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::MhashResult;
use crate::session::Session;

type Waiter<T> = Box<dyn FnOnce(MhashResult<T>) + Send>;

struct State<T> {
    result: Option<MhashResult<T>>,
    waiters: Vec<Waiter<T>>,
}

/// A result that becomes available in some later session round.
///
/// Continuations registered with [`then`](Deferred::then) never run inline:
/// they are queued on the session once the result is known, so a long
/// descent is a sequence of rounds and not a deep call stack.
pub struct Deferred<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                result: None,
                waiters: Vec::new(),
            })),
        }
    }

    /// A deferred that is already resolved.
    pub fn resolved(result: MhashResult<T>) -> Self {
        let deferred = Self::new();
        deferred.state.lock().result = Some(result);
        deferred
    }

    /// Store the result and queue every waiting continuation on `session`.
    ///
    /// Only the first resolution counts; returns `false` for later ones.
    pub fn resolve(&self, session: &Session, result: MhashResult<T>) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            if state.result.is_some() {
                warn!("ignoring second resolution of a deferred result");
                return false;
            }
            state.result = Some(result.clone());
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            let result = result.clone();
            session.add_next_call(move || waiter(result));
        }
        true
    }

    /// Run `f` with the result in a session round after it is resolved.
    pub fn then<F>(&self, session: &Session, f: F)
    where
        F: FnOnce(MhashResult<T>) + Send + 'static,
    {
        let ready = {
            let mut state = self.state.lock();
            if state.result.is_none() {
                state.waiters.push(Box::new(f));
                return;
            }
            state.result.clone()
        };

        if let Some(result) = ready {
            session.add_next_call(move || f(result));
        }
    }

    /// The result, if already resolved.
    pub fn try_get(&self) -> Option<MhashResult<T>> {
        self.state.lock().result.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.lock().result.is_some()
    }
}

impl<T: Clone + Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}
