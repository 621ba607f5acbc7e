//! Server-sent events view of an output channel.

use actix_web::{web, HttpResponse};
use tokio::sync::mpsc;

use crate::bus::protocol::ENDED;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/channels/{channel}", web::get().to(stream_channel));
}

/// GET /api/channels/{channel}: relay every published payload as one SSE
/// `data:` frame, closing after the end-of-stream sentinel.
async fn stream_channel(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let channel = path.into_inner();
    let receiver = match state.bus.subscribe(&channel).await {
        Ok(rx) => rx,
        Err(e) => return super::internal_error("Failed to subscribe to channel", e),
    };
    log::debug!("[BUS] SSE subscriber attached to channel {}", channel);

    let stream = futures_util::stream::unfold(Some(receiver), |rx: Option<mpsc::Receiver<String>>| async move {
        let mut rx = rx?;
        let payload = rx.recv().await?;
        let frame = web::Bytes::from(format!("data: {}\n\n", payload));
        let next = if payload == ENDED { None } else { Some(rx) };
        Some((Ok::<_, actix_web::Error>(frame), next))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(stream)
}
