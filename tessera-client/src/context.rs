//! Primitive execution contexts.
//!
//! Every primitive owns a [`ThreadContext`]: a dedicated worker task which drives the
//! primitive's operations. Operations run concurrently, but their results are delivered to
//! callers strictly in the order in which the operations were issued.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use futures::stream::FuturesOrdered;
use futures::prelude::*;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};
use uuid::Uuid;

use crate::prom::METRIC_ACTIVE_CONTEXTS;
use tessera_core::AppError;

/// A callback which delivers the result of an operation to its caller.
type Completion = Box<dyn FnOnce() + Send>;
/// An operation queued on a context, resolving to the completion of its caller.
type Job = Pin<Box<dyn Future<Output = Completion> + Send>>;

/// A factory of primitive execution contexts.
pub trait ThreadContextFactory: Send + Sync + 'static {
    /// Create a new execution context with a running worker.
    fn create_context(&self) -> Result<ThreadContext>;
}

/// The default execution context factory, spawning context workers onto a Tokio runtime.
#[derive(Clone)]
pub struct DefaultThreadContextFactory {
    runtime: Handle,
    queue_depth: usize,
    active: Arc<AtomicUsize>,
}

impl DefaultThreadContextFactory {
    /// Create a new factory spawning context workers onto the given runtime.
    ///
    /// Each context keeps at most `queue_depth` operations in flight; operations issued beyond
    /// that stay queued until earlier ones complete.
    pub fn new(runtime: Handle, queue_depth: usize) -> Self {
        Self {
            runtime,
            queue_depth: queue_depth.max(1),
            active: Default::default(),
        }
    }

    /// The number of contexts created by this factory whose worker is still running.
    pub fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl ThreadContextFactory for DefaultThreadContextFactory {
    fn create_context(&self) -> Result<ThreadContext> {
        let guard = ActiveContextGuard::new(self.active.clone());
        Ok(ThreadContext::spawn(self.runtime.clone(), self.queue_depth, guard))
    }
}

/// A primitive execution context.
///
/// Cloning a context yields another handle to the same worker. The worker stops when the
/// context is closed or when its last handle is dropped; operations which have not yet been
/// delivered then fail with `AppError::Closed`.
#[derive(Clone)]
pub struct ThreadContext {
    inner: Arc<ThreadContextInner>,
}

struct ThreadContextInner {
    id: Uuid,
    runtime: Handle,
    jobs: mpsc::UnboundedSender<Job>,
    shutdown: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ThreadContextInner {
    fn drop(&mut self) {
        let _res = self.shutdown.send(());
    }
}

impl ThreadContext {
    fn spawn(runtime: Handle, queue_depth: usize, guard: ActiveContextGuard) -> Self {
        let id = Uuid::new_v4();
        let (jobs, jobs_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let worker = ContextWorker {
            id,
            queue_depth,
            jobs: UnboundedReceiverStream::new(jobs_rx),
            pending: FuturesOrdered::new(),
            shutdown: BroadcastStream::new(shutdown_rx),
            _guard: guard,
        };
        let handle = runtime.spawn(worker.run());
        Self {
            inner: Arc::new(ThreadContextInner {
                id,
                runtime,
                jobs,
                shutdown,
                worker: Mutex::new(Some(handle)),
            }),
        }
    }

    /// The unique ID of this context.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// A handle to the runtime driving this context.
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// Check if this context's worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.inner.jobs.is_closed()
    }

    /// Execute the given operation on this context.
    ///
    /// The operation is issued when this method is called, not when the returned future is first
    /// polled; results are delivered in issue order.
    pub fn execute<F, T>(&self, operation: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let res = operation.await;
            Box::new(move || {
                let _res = tx.send(res);
            }) as Completion
        });
        let issued = self.inner.jobs.send(job).is_ok();
        async move {
            if !issued {
                bail!(AppError::Closed);
            }
            match rx.await {
                Ok(res) => res,
                Err(_) => bail!(AppError::Closed),
            }
        }
    }

    /// Close this context, stopping its worker.
    ///
    /// Operations which have not yet been delivered fail with `AppError::Closed`.
    #[tracing::instrument(level = "debug", skip(self), fields(context = %self.inner.id))]
    pub async fn close(&self) {
        let _res = self.inner.shutdown.send(());
        let worker = match self.inner.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(_) => None,
        };
        if let Some(worker) = worker {
            if let Err(err) = worker.await.context("error joining execution context worker") {
                tracing::error!(error = ?err, context = %self.inner.id);
            }
        }
    }
}

/// The task driving the operations of a context.
struct ContextWorker {
    id: Uuid,
    queue_depth: usize,
    jobs: UnboundedReceiverStream<Job>,
    pending: FuturesOrdered<Job>,
    shutdown: BroadcastStream<()>,
    _guard: ActiveContextGuard,
}

impl ContextWorker {
    async fn run(mut self) {
        tracing::debug!(context = %self.id, "execution context started");
        loop {
            tokio::select! {
                job_opt = self.jobs.next(), if self.pending.len() < self.queue_depth => match job_opt {
                    Some(job) => self.pending.push_back(job),
                    None => break,
                },
                Some(complete) = self.pending.next(), if !self.pending.is_empty() => complete(),
                _ = self.shutdown.next() => break,
            }
        }
        tracing::debug!(context = %self.id, pending = self.pending.len(), "execution context stopped");
    }
}

/// Tracks a live context on its factory's counter.
struct ActiveContextGuard(Arc<AtomicUsize>);

impl ActiveContextGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        let count = active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!(METRIC_ACTIVE_CONTEXTS, count as f64);
        Self(active)
    }
}

impl Drop for ActiveContextGuard {
    fn drop(&mut self) {
        let count = self.0.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!(METRIC_ACTIVE_CONTEXTS, count as f64);
    }
}
