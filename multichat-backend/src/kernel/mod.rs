//! Client side of the executor kernel: scheduling, completion streaming and
//! the worker debug listing used by the health check.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use client::KernelClient;
pub use sse::StreamItem;
pub use types::{Addressing, CompletionRequest, DeltaEvent, MessageTarget, ScheduleRequest, ScheduleVerdict};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("kernel request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("kernel returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("kernel location is not configured")]
    NotConfigured,
}

pub type CompletionStream = BoxStream<'static, Result<StreamItem, KernelError>>;

/// Calls made against `{kernel_location}/{api_version}`; `base` is that prefix.
#[async_trait]
pub trait KernelApi: Send + Sync {
    async fn try_schedule(&self, base: &str, request: &ScheduleRequest) -> Result<ScheduleVerdict, KernelError>;

    /// Open the completion call; the stream yields one item per body line and
    /// ends at EOF.
    async fn open_completion(&self, base: &str, request: &CompletionRequest) -> Result<CompletionStream, KernelError>;

    /// Raw body of `/worker/debug`.
    async fn worker_debug(&self, base: &str) -> Result<String, KernelError>;
}
