//! In-process job queue and worker pool.
//!
//! Jobs are pushed onto an unbounded channel and each one runs in its own
//! task once it holds a permit for its kind. Kinds have separate permit pools
//! so a batch job waiting on its steps can never starve the chat jobs it is
//! waiting for.

use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::{BatchDispatchJob, ChatDispatchJob, DispatchContext, HealthCheckJob, ImportDispatchJob, JobError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    Chat,
    Batch,
    Import,
    Health,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Run the same job again after the delay.
    Released(Duration),
    /// Nothing to do (already handled, or throttled).
    Skipped,
}

#[derive(Debug, Clone)]
pub enum Job {
    Chat(ChatDispatchJob),
    Batch(BatchDispatchJob),
    Import(ImportDispatchJob),
    Health(HealthCheckJob),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Chat(_) => JobKind::Chat,
            Job::Batch(_) => JobKind::Batch,
            Job::Import(_) => JobKind::Import,
            Job::Health(_) => JobKind::Health,
        }
    }

    fn time_limit(&self, ctx: &DispatchContext) -> Duration {
        match self {
            Job::Chat(_) => ctx.config.chat_job_timeout,
            Job::Batch(_) | Job::Import(_) => ctx.config.batch_job_timeout,
            Job::Health(_) => ctx.config.kernel_http_timeout,
        }
    }

    pub async fn handle(&self, ctx: &DispatchContext) -> Result<JobOutcome, JobError> {
        match self {
            Job::Chat(job) => job.handle(ctx).await,
            Job::Batch(job) => job.handle(ctx).await,
            Job::Import(job) => job.handle(ctx).await,
            Job::Health(job) => job.handle(ctx).await,
        }
    }

    pub async fn failed(&self, ctx: &DispatchContext, error: &JobError) {
        match self {
            Job::Chat(job) => job.failed(ctx, error).await,
            Job::Batch(job) => job.failed(ctx, error).await,
            Job::Import(job) => job.failed(ctx, error).await,
            Job::Health(_) => log::error!("[HEALTH] Health check failed: {}", error),
        }
    }
}

/// Run one job to completion: a single attempt under its time limit, with
/// `failed()` on error and re-enqueueing on release.
pub async fn run_job(ctx: &DispatchContext, job: Job) {
    let limit = job.time_limit(ctx);
    let result = match timeout(limit, job.handle(ctx)).await {
        Ok(result) => result,
        Err(_) => Err(JobError::Timeout(limit)),
    };

    match result {
        Ok(JobOutcome::Released(delay)) => ctx.queue.release(job, delay),
        Ok(_) => {}
        Err(error) => job.failed(ctx, &error).await,
    }
}

/// Cloneable handle used to enqueue jobs.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn dispatch(&self, job: Job) {
        let kind = job.kind();
        if self.sender.send(job).is_err() {
            log::warn!("[QUEUE] Worker stopped, dropping {} job", kind);
        }
    }

    /// Put the job back on the queue after `delay`.
    pub fn release(&self, job: Job, delay: Duration) {
        log::debug!("[QUEUE] Releasing {} job for {:?}", job.kind(), delay);
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.dispatch(job);
        });
    }
}

pub struct JobWorker {
    ctx: Arc<DispatchContext>,
    receiver: mpsc::UnboundedReceiver<Job>,
    chat_permits: Arc<Semaphore>,
    batch_permits: Arc<Semaphore>,
    health_permits: Arc<Semaphore>,
}

impl JobWorker {
    pub fn new(ctx: Arc<DispatchContext>, receiver: mpsc::UnboundedReceiver<Job>) -> Self {
        let chat_permits = Arc::new(Semaphore::new(ctx.config.max_concurrent_chat_jobs));
        let batch_permits = Arc::new(Semaphore::new(ctx.config.max_concurrent_batch_jobs));
        Self {
            ctx,
            receiver,
            chat_permits,
            batch_permits,
            health_permits: Arc::new(Semaphore::new(1)),
        }
    }

    fn permits_for(&self, kind: JobKind) -> Arc<Semaphore> {
        match kind {
            JobKind::Chat => self.chat_permits.clone(),
            // Coordinating jobs share one pool
            JobKind::Batch | JobKind::Import => self.batch_permits.clone(),
            JobKind::Health => self.health_permits.clone(),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        log::info!(
            "[QUEUE] Worker started (chat permits: {}, batch permits: {})",
            self.ctx.config.max_concurrent_chat_jobs,
            self.ctx.config.max_concurrent_batch_jobs
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("[QUEUE] Worker received shutdown signal");
                    break;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => self.spawn(job),
                    None => break,
                },
            }
        }

        log::info!("[QUEUE] Worker stopped");
    }

    fn spawn(&self, job: Job) {
        let permits = self.permits_for(job.kind());
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    log::error!("[QUEUE] Failed to acquire permit for {} job", job.kind());
                    return;
                }
            };
            run_job(&ctx, job).await;
        });
    }
}
