use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::executor::PipelineExecutor;
use crate::domain::{ForgeError, JobId, StageRequest};

struct QueuedJob {
    id: JobId,
    request: StageRequest,
}

type SharedReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<QueuedJob>>>;

/// Fixed-size set of executor slots fed by a FIFO queue.
/// - at most `n` jobs run at once; the rest stay `Queued`
/// - `shutdown_and_join()` stops taking jobs and waits for in-flight ones
pub struct WorkerPool {
    queue: mpsc::UnboundedSender<QueuedJob>,
    shutdown_tx: watch::Sender<bool>,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, executor: Arc<PipelineExecutor>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let rx: SharedReceiver = Arc::new(AsyncMutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let n = n.max(1);
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let rx = Arc::clone(&rx);
            let executor = Arc::clone(&executor);
            let mut shutdown = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, executor, &mut shutdown).await;
            }));
        }
        info!(workers = n, "worker pool started");

        Self {
            queue,
            shutdown_tx,
            joins: Mutex::new(joins),
        }
    }

    /// Queue a job for execution.
    pub fn submit(&self, id: JobId, request: StageRequest) -> Result<(), ForgeError> {
        if self.is_shutting_down() {
            return Err(ForgeError::ShuttingDown);
        }
        self.queue
            .send(QueuedJob { id, request })
            .map_err(|_| ForgeError::ShuttingDown)
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop taking new jobs. Running jobs are not interrupted.
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(&self) {
        self.request_shutdown();
        let joins = std::mem::take(&mut *self.joins.lock());
        for join in joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: SharedReceiver,
    executor: Arc<PipelineExecutor>,
    shutdown: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        // waiting for work races with shutdown; mpsc::recv is cancel-safe
        let next = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            job = async { rx.lock().await.recv().await } => job,
        };
        let Some(QueuedJob { id, request }) = next else {
            break;
        };

        debug!(worker_id, job_id = %id, "job picked up");
        // own task per job: a panicking adapter fails that job, not the worker
        let run = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.execute(id, request).await })
        };
        if let Err(e) = run.await {
            error!(worker_id, job_id = %id, error = %e, "job execution crashed");
            executor.abort(id, &format!("internal error: {e}"));
        }
    }
    debug!(worker_id, "worker stopped");
}
