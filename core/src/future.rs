//! Single-assignment asynchronous result: the read side ([`ResponseFuture`])
//! and write side ([`Promise`]) of one shared cell.
//!
//! # Design
//! The cell is an explicit state machine: `Pending` holds the wakers and
//! continuations registered so far, `Settled` holds the terminal outcome.
//! The first `resolve`/`fail` wins; later attempts return `false`, log a
//! warning and leave the stored outcome untouched, so an observer that already consumed a value
//! can never see it change.
//!
//! Awaiting registers a `Waker` and returns `Poll::Pending`, yielding the
//! worker thread to the executor instead of parking it. Continuations
//! registered with [`ResponseFuture::on_settle`] let callback-style producers
//! chain work without needing an executor at all.
//!
//! Dropping a `Promise` that never settled fails the cell with
//! [`Error::Abandoned`], so nobody waits on it forever.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use tracing::warn;

use crate::error::Error;

type Outcome<T> = Arc<Result<T, Error>>;
type Continuation<T> = Box<dyn FnOnce(&Result<T, Error>) + Send>;

enum State<T> {
    Pending {
        wakers: Vec<Waker>,
        continuations: Vec<Continuation<T>>,
    },
    Settled(Outcome<T>),
}

struct Cell<T> {
    state: Mutex<State<T>>,
}

impl<T> Cell<T> {
    fn pending() -> Self {
        Self {
            state: Mutex::new(State::Pending {
                wakers: Vec::new(),
                continuations: Vec::new(),
            }),
        }
    }

    fn settled(outcome: Result<T, Error>) -> Self {
        Self {
            state: Mutex::new(State::Settled(Arc::new(outcome))),
        }
    }

    // Continuations and wakers never run while the lock is held, so a poisoned
    // lock still guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn settle(&self, outcome: Result<T, Error>) -> bool {
        let outcome = Arc::new(outcome);
        let (wakers, continuations) = {
            let mut state = self.lock();
            let State::Pending {
                wakers,
                continuations,
            } = &mut *state
            else {
                return false;
            };
            let taken = (mem::take(wakers), mem::take(continuations));
            *state = State::Settled(Arc::clone(&outcome));
            taken
        };
        for continuation in continuations {
            continuation(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    fn outcome(&self) -> Option<Outcome<T>> {
        match &*self.lock() {
            State::Settled(outcome) => Some(Arc::clone(outcome)),
            State::Pending { .. } => None,
        }
    }
}

/// Create a linked future/promise pair sharing one pending cell.
pub fn promise<T>() -> (ResponseFuture<T>, Promise<T>) {
    let cell = Arc::new(Cell::pending());
    (
        ResponseFuture {
            cell: Arc::clone(&cell),
        },
        Promise { cell },
    )
}

/// Read side of the cell. Cloning yields another observer of the same cell.
///
/// Awaiting yields `Result<T, Error>`; every observer receives a clone of the
/// same terminal outcome.
pub struct ResponseFuture<T> {
    cell: Arc<Cell<T>>,
}

impl<T> ResponseFuture<T> {
    /// A future that is already resolved.
    pub fn ready(value: T) -> Self {
        Self {
            cell: Arc::new(Cell::settled(Ok(value))),
        }
    }

    /// A future that has already failed.
    pub fn failed(error: Error) -> Self {
        Self {
            cell: Arc::new(Cell::settled(Err(error))),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.cell.outcome().is_some()
    }

    /// Run `continuation` once with the terminal outcome. Runs immediately on
    /// the calling thread if the cell is already settled, otherwise on the
    /// thread that settles it.
    pub fn on_settle<F>(&self, continuation: F)
    where
        F: FnOnce(&Result<T, Error>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.cell.lock();
            match &mut *state {
                State::Pending { continuations, .. } => {
                    continuations.push(Box::new(continuation));
                    return;
                }
                State::Settled(outcome) => Arc::clone(outcome),
            }
        };
        continuation(&outcome);
    }
}

impl<T: Clone> ResponseFuture<T> {
    /// The terminal outcome, without waiting. `None` while pending.
    pub fn peek(&self) -> Option<Result<T, Error>> {
        self.cell.outcome().map(|outcome| (*outcome).clone())
    }
}

impl<T> Clone for ResponseFuture<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone> Future for ResponseFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.cell.lock();
        match &mut *state {
            State::Settled(outcome) => Poll::Ready((**outcome).clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for ResponseFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Write side of the cell.
///
/// `resolve` and `fail` return `true` when they settled the cell and `false`
/// when it was already terminal; a rejected attempt changes nothing.
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Promise<T> {
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn fail(&self, error: Error) -> bool {
        self.settle(Err(error))
    }

    /// Store `outcome` unless the cell is already terminal. A rejected
    /// attempt is logged at `warn` and changes nothing.
    pub fn settle(&self, outcome: Result<T, Error>) -> bool {
        let settled = self.cell.settle(outcome);
        if !settled {
            warn!("promise already settled, outcome ignored");
        }
        settled
    }

    pub fn is_settled(&self) -> bool {
        self.cell.outcome().is_some()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.cell.settle(Err(Error::Abandoned));
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}
