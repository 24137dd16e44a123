//! Fixed-size pool of worker tasks.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::capabilities::BoxFuture;
use crate::error::{DiError, DiResult};
use crate::internal::panic_message;

struct Job<T> {
    id: u64,
    future: BoxFuture<'static, DiResult<T>>,
    reply: oneshot::Sender<DiResult<T>>,
}

struct PoolState<T> {
    sender: Option<mpsc::UnboundedSender<Job<T>>>,
    workers: Vec<JoinHandle<()>>,
    stopped: bool,
}

/// Runs submitted jobs on at most `workers` concurrent Tokio tasks.
///
/// The queue is unbounded; boundedness applies to execution only. Every
/// submission receives exactly one reply, including after [`stop`](Self::stop).
///
/// # Examples
///
/// ```
/// use ferrous_injector::JobPool;
///
/// # #[tokio::main]
/// # async fn main() {
/// let pool = JobPool::<u32>::new("example", 2);
/// pool.start();
///
/// let reply = pool.rpc(async { Ok(21 * 2) });
/// assert_eq!(reply.await.unwrap().unwrap(), 42);
///
/// pool.stop().await;
/// assert!(pool.rpc(async { Ok(0) }).await.unwrap().is_err());
/// # }
/// ```
pub struct JobPool<T> {
    name: String,
    size: usize,
    counter: AtomicU64,
    state: Mutex<PoolState<T>>,
    queue: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job<T>>>>,
}

impl<T: Send + 'static> JobPool<T> {
    /// Creates a stopped-until-started pool. A worker count of zero is raised to one.
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            size: workers.max(1),
            counter: AtomicU64::new(0),
            state: Mutex::new(PoolState {
                sender: Some(sender),
                workers: Vec::new(),
                stopped: false,
            }),
            queue: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of worker tasks.
    pub fn workers(&self) -> usize {
        self.size
    }

    /// Number of jobs submitted so far.
    pub fn submitted(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Spawns the workers on the current Tokio runtime.
    ///
    /// Idempotent. Outside a runtime this does nothing and the pool starts on
    /// the first [`rpc`](Self::rpc) issued from within one.
    pub fn start(&self) {
        let mut state = self.state.lock();
        self.spawn_workers(&mut state);
    }

    fn spawn_workers(&self, state: &mut PoolState<T>) {
        if state.stopped || !state.workers.is_empty() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        for worker in 0..self.size {
            let queue = self.queue.clone();
            let pool = self.name.clone();
            state.workers.push(handle.spawn(async move {
                tracing::trace!(pool = %pool, worker, "job pool worker started");
                loop {
                    let job = queue.lock().await.recv().await;
                    let Some(job) = job else { break };
                    let result = run_catching(job.id, job.future).await;
                    // The caller may have stopped waiting.
                    let _ = job.reply.send(result);
                }
                tracing::trace!(pool = %pool, worker, "job pool worker stopped");
            }));
        }
        tracing::debug!(pool = %self.name, workers = self.size, "job pool started");
    }

    /// Submits a job and returns the channel its result is delivered on.
    ///
    /// After [`stop`](Self::stop) the reply is [`DiError::PoolStopped`].
    pub fn rpc<F>(&self, job: F) -> oneshot::Receiver<DiResult<T>>
    where
        F: Future<Output = DiResult<T>> + Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let job = Job {
            id,
            future: Box::pin(job),
            reply,
        };

        let mut state = self.state.lock();
        self.spawn_workers(&mut state);
        match state.sender.as_ref() {
            Some(sender) => {
                if let Err(mpsc::error::SendError(job)) = sender.send(job) {
                    let _ = job.reply.send(Err(DiError::PoolStopped));
                }
            }
            None => {
                let _ = job.reply.send(Err(DiError::PoolStopped));
            }
        }
        receiver
    }

    /// Closes the queue, lets the workers drain it and waits for them.
    ///
    /// Idempotent.
    pub async fn stop(&self) {
        let workers = {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            // Queued jobs still need someone to run them.
            self.spawn_workers(&mut state);
            state.stopped = true;
            state.sender = None;
            std::mem::take(&mut state.workers)
        };

        for worker in workers {
            if let Err(err) = worker.await {
                tracing::warn!(pool = %self.name, error = %err, "job pool worker failed");
            }
        }
        tracing::debug!(pool = %self.name, jobs = self.submitted(), "job pool stopped");
    }
}

impl<T> std::fmt::Debug for JobPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPool")
            .field("name", &self.name)
            .field("workers", &self.size)
            .field("submitted", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

/// Runs `future` on its own task so a panic only fails this job.
pub(crate) async fn run_catching<T, F>(id: u64, future: F) -> DiResult<T>
where
    T: Send + 'static,
    F: Future<Output = DiResult<T>> + Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => {
            let message = panic_message(err.into_panic().as_ref());
            tracing::warn!(job = id, %message, "job panicked");
            Err(DiError::JobPanicked { job: id, message })
        }
        Err(_) => Err(DiError::JobPanicked {
            job: id,
            message: "job was cancelled".to_string(),
        }),
    }
}
