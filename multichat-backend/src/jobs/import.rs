//! Replies for a set of imported messages, one chat dispatch per message.
//!
//! Messages are dispatched in the order given. A model is never handed two
//! imported messages at once: before reusing an access code the job waits
//! until every message it already dispatched has left the user's lane.

use crate::db::DbError;

use super::{AppType, ChatDispatchJob, DispatchContext, Job, JobError, JobOutcome};

#[derive(Debug, Clone)]
pub struct ImportDispatchJob {
    message_ids: Vec<i64>,
    user_id: i64,
    locale: String,
}

/// A dispatched message and the model answering it.
struct InFlight {
    message_id: i64,
    access_code: String,
}

impl ImportDispatchJob {
    pub fn new(message_ids: Vec<i64>, user_id: i64, locale: impl Into<String>) -> Self {
        Self {
            message_ids,
            user_id,
            locale: locale.into(),
        }
    }

    pub fn message_ids(&self) -> &[i64] {
        &self.message_ids
    }

    fn lane_key(&self) -> String {
        AppType::Chatroom.lane_key(self.user_id)
    }

    pub async fn handle(&self, ctx: &DispatchContext) -> Result<JobOutcome, JobError> {
        log::info!(
            "[IMPORT] Dispatching {} message(s) for user {}",
            self.message_ids.len(),
            self.user_id
        );
        let mut in_flight: Vec<InFlight> = Vec::new();

        for &message_id in &self.message_ids {
            let message = ctx.db.get_message(message_id)?.ok_or(DbError::NotFound {
                entity: "message",
                id: message_id,
            })?;
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

            if in_flight.iter().any(|f| f.access_code == llm.access_code) {
                log::debug!(
                    "[IMPORT] Model {} busy with an earlier message, waiting before message {}",
                    llm.access_code,
                    message_id
                );
                self.wait_for_drain(ctx, &mut in_flight).await?;
            }

            let context = ctx.db.prior_turns(message.chat_id, message_id, message.chained)?;
            let input = serde_json::to_string(&context)
                .map_err(|e| JobError::InvalidInput(format!("conversation: {}", e)))?;

            let job = ChatDispatchJob::new(input, llm.access_code.as_str(), self.user_id, message_id, self.locale.as_str())
                .with_modelfile(bot.config.modelfile.as_deref());
            ctx.queue.dispatch(Job::Chat(job));
            in_flight.push(InFlight {
                message_id,
                access_code: llm.access_code,
            });
        }

        log::info!("[IMPORT] All messages dispatched for user {}", self.user_id);
        Ok(JobOutcome::Completed)
    }

    /// Polls the lane until none of the dispatched messages are left on it.
    async fn wait_for_drain(&self, ctx: &DispatchContext, in_flight: &mut Vec<InFlight>) -> Result<(), JobError> {
        let lane = self.lane_key();
        loop {
            let pending = ctx.bus.lane_range(&lane).await?;
            in_flight.retain(|f| pending.contains(&f.message_id));
            if in_flight.is_empty() {
                return Ok(());
            }
            tokio::time::sleep(ctx.config.batch_poll_interval).await;
        }
    }

    pub async fn failed(&self, ctx: &DispatchContext, error: &JobError) {
        log::error!("[IMPORT] Failed import for user {}: {}", self.user_id, error);
        if let Err(e) = ctx.bus.lane_clear(&self.lane_key()).await {
            log::error!("[IMPORT] Could not clear lane {}: {}", self.lane_key(), e);
        }
    }
}
