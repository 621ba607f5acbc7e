//! One outgoing chat reply: schedule on the kernel, stream the completion,
//! publish as it arrives and write the final text back to the message.

use futures_util::StreamExt;
use std::time::Instant;

use crate::bus::ChannelEvent;
use crate::config::PublishGranularity;
use crate::kernel::{
    Addressing, CompletionRequest, DeltaEvent, MessageTarget, ScheduleRequest, ScheduleVerdict, StreamItem,
};
use crate::modelfile;
use crate::models::Directive;
use crate::processing::notices::{self, DEFAULT_ERROR, EMPTY_RESPONSE, NO_EXECUTOR};
use crate::processing::{rectify_input, Utf8Buffer, WarningFilter};

use super::{AppType, DispatchContext, JobError, JobOutcome};

/// How the reply came to an end, which decides what proxied channels get in
/// the final event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conclusion {
    /// Text was streamed; proxied consumers already have it.
    Streamed,
    /// A fixed notice replaced the completion.
    Notice,
}

#[derive(Debug, Clone)]
pub struct ChatDispatchJob {
    input: String,
    access_code: String,
    user_id: i64,
    message_id: i64,
    locale: String,
    channel: String,
    /// Executor-ready directives; `None` when the bot has no modelfile.
    modelfile: Option<Vec<Directive>>,
    preserved_output: String,
    exit_when_finish: bool,
}

impl ChatDispatchJob {
    pub fn new(
        input: impl Into<String>,
        access_code: impl Into<String>,
        user_id: i64,
        message_id: i64,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            access_code: access_code.into(),
            user_id,
            message_id,
            locale: locale.into(),
            channel: message_id.to_string(),
            modelfile: None,
            preserved_output: String::new(),
            exit_when_finish: true,
        }
    }

    /// Output channel; blank or missing means the message's own channel.
    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        if let Some(channel) = channel.filter(|c| !c.is_empty()) {
            self.channel = channel;
        }
        self
    }

    pub fn with_modelfile(mut self, directives: Option<&[Directive]>) -> Self {
        self.modelfile = modelfile::process_modelfile(directives);
        self
    }

    /// Output carried over from earlier batch steps. A non-empty value lets
    /// the job run against a message that no longer holds the placeholder.
    pub fn with_preserved_output(mut self, preserved_output: impl Into<String>) -> Self {
        self.preserved_output = preserved_output.into();
        self
    }

    pub fn exit_when_finish(mut self, exit_when_finish: bool) -> Self {
        self.exit_when_finish = exit_when_finish;
        self
    }

    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn target(&self) -> MessageTarget {
        MessageTarget {
            id: self.message_id,
            mode: Addressing::classify(&self.channel, self.message_id),
        }
    }

    pub fn lane_key(&self) -> String {
        AppType::from_channel(&self.channel).lane_key(self.user_id)
    }

    pub async fn handle(&self, ctx: &DispatchContext) -> Result<JobOutcome, JobError> {
        let target = self.target();
        if target.mode == Addressing::Direct && self.preserved_output.is_empty() {
            if let Some(message) = ctx.db.get_message(self.message_id)? {
                if !message.is_placeholder() {
                    log::debug!("[DISPATCH] Message {} already answered, skipping", self.message_id);
                    return Ok(JobOutcome::Skipped);
                }
            }
        }

        log::info!(
            "[DISPATCH] In: access_code={} user={} message={} input_len={} locale={}",
            self.access_code,
            self.user_id,
            self.message_id,
            self.input.trim().len(),
            self.locale
        );
        let started = Instant::now();
        let base = ctx.config.kernel_base(&ctx.db);

        let schedule = ScheduleRequest {
            access_code: self.access_code.clone(),
            target,
            user_id: self.user_id,
        };
        let verdict = ctx.kernel.try_schedule(&base, &schedule).await?;

        let mut filter = WarningFilter::new();
        let mut exit_code = None;
        let conclusion = match verdict {
            ScheduleVerdict::Busy => {
                log::info!(
                    "[DISPATCH] BUSY: channel={} access_code={} user={} message={}",
                    self.channel,
                    self.access_code,
                    self.user_id,
                    self.message_id
                );
                return Ok(JobOutcome::Released(ctx.config.busy_backoff));
            }
            ScheduleVerdict::NoExecutor | ScheduleVerdict::Unknown => {
                log::info!(
                    "[DISPATCH] {:?}: channel={} access_code={} user={} message={}",
                    verdict,
                    self.channel,
                    self.access_code,
                    self.user_id,
                    self.message_id
                );
                filter.add_chunk(NO_EXECUTOR);
                Conclusion::Notice
            }
            ScheduleVerdict::Ready => {
                self.stream(ctx, &base, target, &mut filter, &mut exit_code).await?;
                Conclusion::Streamed
            }
        };

        let full_output = filter.output(true);
        log::info!(
            "[DISPATCH] Out: channel={} access_code={} user={} message={} elapsed={:.2}s output_len={}",
            self.channel,
            self.access_code,
            self.user_id,
            self.message_id,
            started.elapsed().as_secs_f64(),
            full_output.trim().len()
        );

        let published = match (target.mode, conclusion) {
            (Addressing::Proxied, Conclusion::Streamed) => "",
            _ => full_output.as_str(),
        };
        self.end_stream(ctx, &full_output, published, exit_code).await?;
        Ok(JobOutcome::Completed)
    }

    async fn stream(
        &self,
        ctx: &DispatchContext,
        base: &str,
        target: MessageTarget,
        filter: &mut WarningFilter,
        exit_code: &mut Option<i64>,
    ) -> Result<(), JobError> {
        let rectified = rectify_input(
            &self.input,
            &ctx.config.brand_keyword,
            ctx.config.safety_guard_configured(&ctx.db),
        )
        .map_err(|e| JobError::InvalidInput(format!("conversation is not a JSON array: {}", e)))?;
        if rectified.mentions_brand {
            filter.set_advisory(Some(notices::brand_advisory(&self.locale)));
        }

        let request = CompletionRequest {
            input: rectified.payload,
            access_code: self.access_code.clone(),
            user_id: self.user_id,
            target,
            locale: self.locale.clone(),
            api_base_urls: ctx.config.api_base_urls.clone(),
            credentials: ctx.db.user_credentials(self.user_id)?,
            modelfile: modelfile::to_wire(self.modelfile.as_deref())
                .map_err(|e| JobError::InvalidInput(format!("modelfile: {}", e)))?,
        };

        let mut stream = ctx.kernel.open_completion(base, &request).await?;
        let mut utf8 = Utf8Buffer::new();

        while let Some(item) = stream.next().await {
            match item? {
                StreamItem::Deltas(deltas) => {
                    let mut chunk = String::new();
                    for delta in &deltas {
                        if let DeltaEvent::ExitCode(code) = delta {
                            *exit_code = Some(*code);
                        }
                        delta.render_into(&mut chunk);
                    }
                    utf8.add_chunk(chunk.as_bytes());
                }
                StreamItem::Raw(bytes) => utf8.add_chunk(&bytes),
            }

            let text = utf8.take_complete_text();
            if text.is_empty() {
                continue;
            }
            let rendered = filter.add_chunk(&text);

            match target.mode {
                Addressing::Direct => {
                    ctx.bus
                        .publish_event(&self.channel, &ChannelEvent::delta(rendered))
                        .await?
                }
                Addressing::Proxied => self.publish_raw(ctx, &text).await?,
            }
        }

        utf8.finish();
        filter.finish();
        if filter.output(true).trim().is_empty() {
            filter.add_chunk(EMPTY_RESPONSE);
        }
        Ok(())
    }

    async fn publish_raw(&self, ctx: &DispatchContext, text: &str) -> Result<(), JobError> {
        match ctx.config.proxy_publish_mode {
            PublishGranularity::Chunk => {
                ctx.bus.publish_event(&self.channel, &ChannelEvent::delta(text)).await?;
            }
            PublishGranularity::Char => {
                for ch in text.chars() {
                    ctx.bus
                        .publish_event(&self.channel, &ChannelEvent::delta(ch.to_string()))
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Persist, publish the final event and, for the last job on this
    /// channel, the terminal sentinel.
    async fn end_stream(
        &self,
        ctx: &DispatchContext,
        persisted: &str,
        published: &str,
        exit_code: Option<i64>,
    ) -> Result<(), JobError> {
        let written = !persisted.is_empty() && ctx.db.set_message_text(self.message_id, persisted)?;

        if !published.is_empty() || exit_code.is_some() {
            let event = ChannelEvent::Final {
                msg: published.to_string(),
                exit_code,
            };
            ctx.bus.publish_event(&self.channel, &event).await?;
        }

        if self.exit_when_finish {
            ctx.bus.publish_event(&self.channel, &ChannelEvent::Ended).await?;
            ctx.bus.lane_remove(&self.lane_key(), self.message_id).await?;
        }

        // Waiters may start the next step on this channel once woken
        if written {
            ctx.notifier.notify(self.message_id);
        }
        Ok(())
    }

    pub async fn failed(&self, ctx: &DispatchContext, error: &JobError) {
        log::error!(
            "[DISPATCH] Failed job: channel={} access_code={} user={} message={}: {}",
            self.channel,
            self.access_code,
            self.user_id,
            self.message_id,
            error
        );
        if let Err(e) = self.end_stream(ctx, DEFAULT_ERROR, DEFAULT_ERROR, None).await {
            log::error!("[DISPATCH] Could not report failure on channel {}: {}", self.channel, e);
        }
    }
}
