//! Scripted multi-turn conversations: one chat dispatch per prompt, run in
//! order against the same message.

use tokio::sync::Notify;

use crate::db::{Database, DbError};
use crate::models::{Directive, HistoryMessage, Turn};
use crate::processing::notices::PLACEHOLDER;

use super::{AppType, ChatDispatchJob, DispatchContext, Job, JobError, JobOutcome};

#[derive(Debug, Clone)]
pub struct BatchDispatchJob {
    prompts: Vec<String>,
    message_id: i64,
    user_id: i64,
    locale: String,
}

impl BatchDispatchJob {
    /// Resolves the owning user through the message's chat.
    pub fn new(
        db: &Database,
        prompts: Vec<String>,
        message_id: i64,
        locale: impl Into<String>,
    ) -> Result<Self, JobError> {
        let message = db.get_message(message_id)?.ok_or(DbError::NotFound {
            entity: "message",
            id: message_id,
        })?;
        let chat = db.get_chat(message.chat_id)?.ok_or(DbError::NotFound {
            entity: "chat",
            id: message.chat_id,
        })?;

        Ok(Self {
            prompts,
            message_id,
            user_id: chat.user_id,
            locale: locale.into(),
        })
    }

    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    fn lane_key(&self) -> String {
        AppType::Chatroom.lane_key(self.user_id)
    }

    pub async fn handle(&self, ctx: &DispatchContext) -> Result<JobOutcome, JobError> {
        if self.prompts.is_empty() {
            return Err(JobError::InvalidInput("batch has no prompts".to_string()));
        }

        let message = self.load_message(&ctx.db)?;
        let chat = ctx.db.get_chat(message.chat_id)?.ok_or(DbError::NotFound {
            entity: "chat",
            id: message.chat_id,
        })?;
        let bot = ctx.db.get_bot(chat.bot_id)?.ok_or(DbError::NotFound {
            entity: "bot",
            id: chat.bot_id,
        })?;
        let llm = ctx.db.get_llm(bot.model_id)?.ok_or(DbError::NotFound {
            entity: "llm",
            id: bot.model_id,
        })?;
        let context = ctx.db.prior_turns(message.chat_id, self.message_id, message.chained)?;

        log::info!(
            "[BATCH] Starting {} step(s) for message {} (user {}, model {})",
            self.prompts.len(),
            self.message_id,
            self.user_id,
            llm.access_code
        );

        let notify = ctx.notifier.subscribe(self.message_id);
        let result = self
            .run_steps(ctx, &context, &llm.access_code, bot.config.modelfile.as_deref(), &notify)
            .await;
        ctx.notifier.forget(self.message_id);
        result
    }

    async fn run_steps(
        &self,
        ctx: &DispatchContext,
        context: &[Turn],
        access_code: &str,
        modelfile: Option<&[Directive]>,
        notify: &Notify,
    ) -> Result<JobOutcome, JobError> {
        let last = self.prompts.len() - 1;
        let mut buffer: Vec<Turn> = Vec::new();

        for (index, prompt) in self.prompts.iter().enumerate() {
            if index != 0 {
                buffer.push(Turn::user(prompt.as_str()));
                ctx.bus
                    .lane_push(&self.lane_key(), self.message_id, ctx.config.lane_ttl)
                    .await?;
            }

            let new_input = buffer
                .iter()
                .filter(|turn| turn.isbot)
                .map(|turn| turn.msg.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let input: Vec<&Turn> = context.iter().chain(buffer.iter()).collect();
            let input = serde_json::to_string(&input)
                .map_err(|e| JobError::InvalidInput(format!("conversation: {}", e)))?;

            let step = ChatDispatchJob::new(input, access_code, self.user_id, self.message_id, self.locale.as_str())
                .with_channel(Some(self.message_id.to_string()))
                .with_modelfile(modelfile)
                .with_preserved_output(new_input)
                .exit_when_finish(index == last);
            log::debug!("[BATCH] Dispatching step {}/{} for message {}", index + 1, last + 1, self.message_id);
            ctx.queue.dispatch(Job::Chat(step));

            let reply = self.wait_for_reply(ctx, notify).await?;
            buffer.push(Turn::bot(reply));
            if index == last {
                break;
            }
            ctx.db.set_message_text(self.message_id, PLACEHOLDER)?;
        }

        log::info!("[BATCH] Finished message {}", self.message_id);
        Ok(JobOutcome::Completed)
    }

    /// Blocks until the message no longer holds the placeholder. Wakes on the
    /// in-process signal or after one poll interval, whichever comes first.
    async fn wait_for_reply(&self, ctx: &DispatchContext, notify: &Notify) -> Result<String, JobError> {
        loop {
            let message = self.load_message(&ctx.db)?;
            if !message.is_placeholder() {
                return Ok(message.msg);
            }
            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(ctx.config.batch_poll_interval) => {}
            }
        }
    }

    fn load_message(&self, db: &Database) -> Result<HistoryMessage, JobError> {
        Ok(db.get_message(self.message_id)?.ok_or(DbError::NotFound {
            entity: "message",
            id: self.message_id,
        })?)
    }

    pub async fn failed(&self, ctx: &DispatchContext, error: &JobError) {
        log::error!(
            "[BATCH] Failed batch for message {} (user {}): {}",
            self.message_id,
            self.user_id,
            error
        );
        if let Err(e) = ctx.bus.lane_clear(&self.lane_key()).await {
            log::error!("[BATCH] Could not clear lane {}: {}", self.lane_key(), e);
        }
    }
}
