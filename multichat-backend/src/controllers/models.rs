//! Model administration.

use actix_web::{web, HttpResponse};

use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/models/health/reset").route(web::post().to(reset_health)));
}

/// POST /api/models/health/reset: mark every model healthy as of now
async fn reset_health(state: web::Data<AppState>) -> HttpResponse {
    match state.db.reset_llm_health() {
        Ok(updated) => {
            log::info!("[HEALTH] Health reset for {} model(s)", updated);
            HttpResponse::Ok().json(serde_json::json!({ "updated": updated }))
        }
        Err(e) => super::internal_error("Failed to reset model health", e),
    }
}
