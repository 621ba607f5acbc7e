pub mod channels;
pub mod chat;
pub mod health;
pub mod lanes;
pub mod models;

use actix_web::HttpResponse;

/// Log the failure and answer 500 with a JSON `error` body.
pub fn internal_error(context: &str, error: impl std::fmt::Display) -> HttpResponse {
    log::error!("{}: {}", context, error);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("{}: {}", context, error)
    }))
}
