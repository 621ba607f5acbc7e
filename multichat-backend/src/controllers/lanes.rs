//! Per-user lanes of in-flight chatroom messages.

use actix_web::{web, HttpResponse};

use crate::bus::ChannelEvent;
use crate::jobs::AppType;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/lanes/{user_id}")
            .route("", web::get().to(get_lane))
            .route("/stop", web::post().to(stop_lane)),
    );
}

/// GET /api/lanes/{user_id}: message ids still being answered
async fn get_lane(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let lane = AppType::Chatroom.lane_key(path.into_inner());
    match state.bus.lane_range(&lane).await {
        Ok(ids) => HttpResponse::Ok().json(serde_json::json!({ "lane": lane, "message_ids": ids })),
        Err(e) => super::internal_error("Failed to read lane", e),
    }
}

/// POST /api/lanes/{user_id}/stop: end every listed channel and drop the lane
async fn stop_lane(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let lane = AppType::Chatroom.lane_key(path.into_inner());
    let ids = match state.bus.lane_range(&lane).await {
        Ok(ids) => ids,
        Err(e) => return super::internal_error("Failed to read lane", e),
    };

    for id in &ids {
        if let Err(e) = state.bus.publish_event(&id.to_string(), &ChannelEvent::Ended).await {
            log::warn!("[BUS] Could not end channel {}: {}", id, e);
        }
    }
    if let Err(e) = state.bus.lane_clear(&lane).await {
        return super::internal_error("Failed to clear lane", e);
    }

    log::info!("[QUEUE] Stopped lane {} ({} message(s))", lane, ids.len());
    HttpResponse::Ok().json(serde_json::json!({ "stopped": ids }))
}
