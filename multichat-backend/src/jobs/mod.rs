//! Queued units of work: chat dispatch, batch sequencing, imports and health
//! checks.

pub mod batch;
pub mod chat;
pub mod context;
pub mod health;
pub mod import;
pub mod lane;
pub mod notifier;
pub mod queue;


use std::time::Duration;
use thiserror::Error;

use crate::bus::BusError;
use crate::db::DbError;
use crate::kernel::KernelError;

pub use batch::BatchDispatchJob;
pub use chat::ChatDispatchJob;
pub use context::DispatchContext;
pub use health::{HealthCheckJob, HealthThrottle};
pub use import::ImportDispatchJob;
pub use lane::AppType;
pub use notifier::CompletionNotifier;
pub use queue::{Job, JobOutcome, JobQueue, JobWorker};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid job input: {0}")]
    InvalidInput(String),
    #[error("job exceeded its {0:?} time limit")]
    Timeout(Duration),
}
