//! Cooperative round-based scheduler.
//!
//! A [`Session`] holds two queues: next calls (plain continuations) and tasks
//! (async I/O such as a pipeline flush or a bucket fill). Nothing runs until
//! [`Session::execute`] drains them:
//!
//! ```text
//! round 1: run queued next calls   -> they queue cache gets (one flush task)
//!          await queued tasks      -> one batched backend round trip
//!                                     resolves deferreds, queues continuations
//! round 2: run queued next calls   -> continuations may queue deeper gets
//!          await queued tasks
//! ...      until both queues are empty
//! ```
//!
//! Work queued by independent callers before a round starts shares that
//! round, which is what lets lookups for different keys share a round trip.
//!
//! Only one caller drains at a time. A concurrent [`Session::execute`] waits
//! for the running drain to finish, so when it returns every round queued so
//! far has completed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{trace, warn};

type NextCall = Box<dyn FnOnce() + Send>;
type Task = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
struct Queues {
    calls: Vec<NextCall>,
    tasks: Vec<Task>,
}

/// Cloneable handle to a shared scheduler.
///
/// Meant to be shared by lookups of one request or batch; it has no
/// internal threads and only makes progress inside [`execute`](Session::execute).
#[derive(Clone, Default)]
pub struct Session {
    queues: Arc<Mutex<Queues>>,
    /// Held for the whole of a drain.
    draining: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a continuation for the next round.
    pub fn add_next_call<F>(&self, call: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queues.lock().calls.push(Box::new(call));
    }

    /// Queue async work to be awaited at the end of the next round.
    pub fn add_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.queues.lock().tasks.push(Box::pin(task));
    }

    /// Whether any call or task is still queued.
    pub fn has_pending(&self) -> bool {
        let queues = self.queues.lock();
        !queues.calls.is_empty() || !queues.tasks.is_empty()
    }

    /// Drain rounds until nothing is queued.
    ///
    /// Must be called from within a tokio runtime; tasks of one round are
    /// awaited concurrently on a [`JoinSet`]. Must not be awaited from a
    /// session call or task, which would wait on its own drain.
    pub async fn execute(&self) {
        let _draining = self.draining.lock().await;
        let mut round = 0usize;
        loop {
            let Queues { calls, tasks } = std::mem::take(&mut *self.queues.lock());
            if calls.is_empty() && tasks.is_empty() {
                break;
            }
            round += 1;
            trace!(
                round,
                num_calls = calls.len(),
                num_tasks = tasks.len(),
                "executing session round"
            );

            for call in calls {
                call();
            }

            if tasks.is_empty() {
                continue;
            }
            let mut running = JoinSet::new();
            for task in tasks {
                running.spawn(task);
            }
            while let Some(joined) = running.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, round, "session task failed");
                }
            }
        }
    }
}
