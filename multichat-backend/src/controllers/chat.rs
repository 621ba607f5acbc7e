//! Entry points that put chat work on the job queue.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::db::DbError;
use crate::jobs::{AppType, BatchDispatchJob, ChatDispatchJob, ImportDispatchJob, Job, JobError};
use crate::models::Directive;
use crate::AppState;

#[derive(Deserialize)]
struct DispatchRequest {
    /// JSON array of prior turns.
    input: String,
    access_code: String,
    user_id: i64,
    message_id: i64,
    #[serde(default)]
    locale: String,
    channel: Option<String>,
    modelfile: Option<Vec<Directive>>,
}

#[derive(Deserialize)]
struct BatchRequest {
    message_id: i64,
    prompts: Vec<String>,
    #[serde(default)]
    locale: String,
}

#[derive(Deserialize)]
struct ImportRequest {
    user_id: i64,
    message_ids: Vec<i64>,
    #[serde(default)]
    locale: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/chat")
            .route("/dispatch", web::post().to(dispatch_chat))
            .route("/batch", web::post().to(dispatch_batch))
            .route("/import", web::post().to(dispatch_import)),
    );
}

/// POST /api/chat/dispatch: queue one reply
async fn dispatch_chat(state: web::Data<AppState>, body: web::Json<DispatchRequest>) -> HttpResponse {
    let body = body.into_inner();
    if body.access_code.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "access_code is required"
        }));
    }

    let job = ChatDispatchJob::new(body.input, body.access_code, body.user_id, body.message_id, body.locale)
        .with_channel(body.channel)
        .with_modelfile(body.modelfile.as_deref());

    if let Err(e) = state
        .bus
        .lane_push(&job.lane_key(), body.message_id, state.config.lane_ttl)
        .await
    {
        return super::internal_error("Failed to register message on lane", e);
    }

    let channel = job.channel().to_string();
    state.queue.dispatch(Job::Chat(job));
    HttpResponse::Accepted().json(serde_json::json!({
        "message_id": body.message_id,
        "channel": channel
    }))
}

/// POST /api/chat/batch: queue a scripted multi-turn run
async fn dispatch_batch(state: web::Data<AppState>, body: web::Json<BatchRequest>) -> HttpResponse {
    let body = body.into_inner();
    if body.prompts.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "prompts must not be empty"
        }));
    }

    let job = match BatchDispatchJob::new(&state.db, body.prompts, body.message_id, body.locale) {
        Ok(job) => job,
        Err(JobError::Db(DbError::NotFound { entity, id })) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": format!("{} {} not found", entity, id)
            }));
        }
        Err(e) => return super::internal_error("Failed to prepare batch", e),
    };

    let lane = AppType::Chatroom.lane_key(job.user_id());
    if let Err(e) = state.bus.lane_push(&lane, body.message_id, state.config.lane_ttl).await {
        return super::internal_error("Failed to register message on lane", e);
    }

    state.queue.dispatch(Job::Batch(job));
    HttpResponse::Accepted().json(serde_json::json!({ "message_id": body.message_id }))
}

/// POST /api/chat/import: queue replies for imported messages
async fn dispatch_import(state: web::Data<AppState>, body: web::Json<ImportRequest>) -> HttpResponse {
    let body = body.into_inner();
    if body.message_ids.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "message_ids must not be empty"
        }));
    }

    let lane = AppType::Chatroom.lane_key(body.user_id);
    for id in &body.message_ids {
        if let Err(e) = state.bus.lane_push(&lane, *id, state.config.lane_ttl).await {
            return super::internal_error("Failed to register message on lane", e);
        }
    }

    let job = ImportDispatchJob::new(body.message_ids, body.user_id, body.locale);
    let count = job.message_ids().len();
    state.queue.dispatch(Job::Import(job));
    HttpResponse::Accepted().json(serde_json::json!({ "queued": count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{InMemoryBus, MessageBus};
    use crate::config::Config;
    use crate::db::Database;
    use crate::jobs::queue::JobKind;
    use crate::jobs::JobQueue;
    use crate::processing::notices::PLACEHOLDER;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn app_state(db: Arc<Database>, bus: Arc<InMemoryBus>, queue: JobQueue) -> web::Data<AppState> {
        web::Data::new(AppState {
            db,
            config: Config::default(),
            bus,
            queue,
        })
    }

    #[actix_web::test]
    async fn test_dispatch_registers_lane_and_queues_job() {
        let db = Arc::new(Database::new(":memory:").unwrap());
        let bus = Arc::new(InMemoryBus::new());
        let (queue, mut receiver) = JobQueue::new();
        let app = test::init_service(
            App::new()
                .app_data(app_state(db, bus.clone(), queue))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat/dispatch")
            .set_json(serde_json::json!({
                "input": "[]",
                "access_code": "llama3",
                "user_id": 7,
                "message_id": 42,
                "locale": "en_us"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 202);
        assert_eq!(bus.lane_range("usertask_7").await.unwrap(), vec![42]);
        assert_eq!(receiver.try_recv().unwrap().kind(), JobKind::Chat);
    }

    #[actix_web::test]
    async fn test_batch_for_unknown_message_is_not_found() {
        let db = Arc::new(Database::new(":memory:").unwrap());
        let (queue, mut receiver) = JobQueue::new();
        let app = test::init_service(
            App::new()
                .app_data(app_state(db, Arc::new(InMemoryBus::new()), queue))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat/batch")
            .set_json(serde_json::json!({ "message_id": 5, "prompts": ["hi"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 404);
        assert!(receiver.try_recv().is_err());
    }

    #[actix_web::test]
    async fn test_batch_queues_job() {
        let db = Arc::new(Database::new(":memory:").unwrap());
        let user = db.insert_user("bob").unwrap();
        let llm = db.insert_llm("Llama", "llama3").unwrap();
        let bot = db.insert_bot(llm, "bot", None).unwrap();
        let chat = db.insert_chat(user, bot, "c").unwrap();
        let message = db.insert_message(chat, PLACEHOLDER, true, false).unwrap();
        let bus = Arc::new(InMemoryBus::new());
        let (queue, mut receiver) = JobQueue::new();
        let app = test::init_service(
            App::new()
                .app_data(app_state(db, bus.clone(), queue))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat/batch")
            .set_json(serde_json::json!({ "message_id": message.id, "prompts": ["a", "b"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 202);
        assert_eq!(receiver.try_recv().unwrap().kind(), JobKind::Batch);
        assert_eq!(
            bus.lane_range(&format!("usertask_{}", user)).await.unwrap(),
            vec![message.id]
        );
    }

    #[actix_web::test]
    async fn test_import_registers_every_message() {
        let db = Arc::new(Database::new(":memory:").unwrap());
        let bus = Arc::new(InMemoryBus::new());
        let (queue, mut receiver) = JobQueue::new();
        let app = test::init_service(
            App::new()
                .app_data(app_state(db, bus.clone(), queue))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat/import")
            .set_json(serde_json::json!({ "user_id": 4, "message_ids": [11, 12] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 202);
        assert_eq!(bus.lane_range("usertask_4").await.unwrap(), vec![11, 12]);
        assert_eq!(receiver.try_recv().unwrap().kind(), JobKind::Import);
    }
}
