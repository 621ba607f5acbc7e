//! Scripted kernel for dispatch tests. Verdicts and completion bodies are
//! popped from queues; every request is recorded for later assertions.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{CompletionRequest, CompletionStream, KernelApi, KernelError, ScheduleRequest, ScheduleVerdict, StreamItem};

/// A completion body as the mock will serve it.
pub enum ScriptedStream {
    Items(Vec<Result<StreamItem, KernelError>>),
    /// Never yields and never ends.
    Hang,
}

#[derive(Clone, Default)]
pub struct MockKernel {
    verdicts: Arc<Mutex<VecDeque<ScheduleVerdict>>>,
    streams: Arc<Mutex<VecDeque<ScriptedStream>>>,
    debug_body: Arc<Mutex<Option<String>>>,
    schedule_calls: Arc<Mutex<Vec<ScheduleRequest>>>,
    completion_calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once the verdict queue is empty every schedule call answers READY.
    pub fn with_verdicts(self, verdicts: Vec<ScheduleVerdict>) -> Self {
        self.verdicts.lock().unwrap().extend(verdicts);
        self
    }

    pub fn with_stream(self, items: Vec<StreamItem>) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Items(items.into_iter().map(Ok).collect()));
        self
    }

    pub fn with_scripted_stream(self, stream: ScriptedStream) -> Self {
        self.streams.lock().unwrap().push_back(stream);
        self
    }

    /// `None` makes `/worker/debug` answer HTTP 503.
    pub fn with_debug_body(self, body: Option<&str>) -> Self {
        *self.debug_body.lock().unwrap() = body.map(str::to_string);
        self
    }

    pub fn schedule_calls(&self) -> Vec<ScheduleRequest> {
        self.schedule_calls.lock().unwrap().clone()
    }

    pub fn completion_calls(&self) -> Vec<CompletionRequest> {
        self.completion_calls.lock().unwrap().clone()
    }
}

/// Shorthand for a text-only SSE frame.
pub fn text(value: &str) -> StreamItem {
    StreamItem::Deltas(vec![super::DeltaEvent::Text(value.to_string())])
}

#[async_trait]
impl KernelApi for MockKernel {
    async fn try_schedule(&self, _base: &str, request: &ScheduleRequest) -> Result<ScheduleVerdict, KernelError> {
        self.schedule_calls.lock().unwrap().push(request.clone());
        Ok(self.verdicts.lock().unwrap().pop_front().unwrap_or(ScheduleVerdict::Ready))
    }

    async fn open_completion(&self, _base: &str, request: &CompletionRequest) -> Result<CompletionStream, KernelError> {
        self.completion_calls.lock().unwrap().push(request.clone());
        let scripted = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedStream::Items(Vec::new()));
        Ok(match scripted {
            ScriptedStream::Items(items) => stream::iter(items).boxed(),
            ScriptedStream::Hang => stream::pending().boxed(),
        })
    }

    async fn worker_debug(&self, _base: &str) -> Result<String, KernelError> {
        self.debug_body.lock().unwrap().clone().ok_or(KernelError::Status {
            status: 503,
            body: "no workers".to_string(),
        })
    }
}
