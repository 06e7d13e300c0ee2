use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELLED: u8 = 2;

type CancelCallback = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of a task that was cancelled before it completed.
///
/// Distinct from any error the wrapped work could produce, so callers can
/// tell "someone stopped this" apart from "this failed".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cancelled: {reason}")]
pub struct Cancelled {
    /// Reason given to [`CancelHandle::cancel`].
    pub reason: String,
}

struct Shared {
    state: AtomicU8,
    token: CancellationToken,
    reason: Mutex<Option<String>>,
    on_cancelled: Mutex<Option<CancelCallback>>,
}

impl Shared {
    fn cancelled(&self) -> Cancelled {
        let reason = self
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default();
        Cancelled { reason }
    }
}

/// Handle used to cancel a [`Cancellable`] from outside.
///
/// Cheap to clone. All clones refer to the same task.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Cancel the task.
    ///
    /// Before completion this makes the task resolve to [`Cancelled`] and
    /// runs the cleanup callback right away, on the calling thread. After
    /// completion (or a previous cancel) it does nothing.
    ///
    /// Returns true if this call cancelled the task.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        if self
            .shared
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        *self
            .shared
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
        self.shared.token.cancel();

        let callback = self
            .shared
            .on_cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }

        true
    }

    /// Check if the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Check if the task completed on its own.
    pub fn is_completed(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == COMPLETED
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// A future that can be cancelled from outside.
///
/// The wrapped future races against a cancellation signal. Once cancelled,
/// awaiting yields `Err(Cancelled)` even if the wrapped future had already
/// produced a value that nobody observed yet.
///
/// # Example
///
/// ```
/// # tokio_test_block(async {
/// use formcheck_lib::task::Cancellable;
///
/// let task = Cancellable::new(std::future::pending::<u32>(), || {});
/// let handle = task.handle();
///
/// handle.cancel("aborted by typing");
/// assert_eq!(task.await.unwrap_err().reason, "aborted by typing");
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Cancellable<T> {
    handle: CancelHandle,
    inner: BoxFuture<'static, Result<T, Cancelled>>,
}

impl<T: Send + 'static> Cancellable<T> {
    /// Wrap `future`. `on_cancelled` runs once if the task is cancelled
    /// before completing.
    pub fn new<F>(future: F, on_cancelled: impl FnOnce() + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(PENDING),
            token: CancellationToken::new(),
            reason: Mutex::new(None),
            on_cancelled: Mutex::new(Some(Box::new(on_cancelled))),
        });

        let task = Arc::clone(&shared);
        let inner = async move {
            tokio::select! {
                biased;
                _ = task.token.cancelled() => Err(task.cancelled()),
                output = future => {
                    // Lost the race against a concurrent cancel
                    if task
                        .state
                        .compare_exchange(PENDING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        return Err(task.cancelled());
                    }
                    // Never fires now, release it
                    task.on_cancelled
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    Ok(output)
                }
            }
        }
        .boxed();

        Self {
            handle: CancelHandle { shared },
            inner,
        }
    }

    /// Get a handle that can cancel this task.
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Cancel this task. See [`CancelHandle::cancel`].
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.handle.cancel(reason)
    }
}

impl<T> Future for Cancellable<T> {
    type Output = Result<T, Cancelled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}
