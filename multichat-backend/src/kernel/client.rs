//! reqwest implementation of [`KernelApi`].

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{redirect, Client, Response};
use std::time::Duration;

use super::sse::{decode_line, LineSplitter};
use super::{CompletionRequest, CompletionStream, KernelApi, KernelError, ScheduleRequest, ScheduleVerdict};

pub struct KernelClient {
    http: Client,
    /// Limit for the short calls; completions are bounded by the job timeout.
    timeout: Duration,
}

impl KernelClient {
    /// Redirects and transparent decompression are disabled; both interfere
    /// with reading the completion body as it streams.
    pub fn new(timeout: Duration) -> Result<Self, KernelError> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .redirect(redirect::Policy::none())
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()?;
        Ok(Self { http, timeout })
    }
}

async fn ensure_success(response: Response) -> Result<Response, KernelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(KernelError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

fn require_base(base: &str) -> Result<(), KernelError> {
    // base is "{location}/{version}"; a blank location leaves only "/{version}"
    if base.starts_with('/') || base.trim().is_empty() {
        return Err(KernelError::NotConfigured);
    }
    Ok(())
}

#[async_trait]
impl KernelApi for KernelClient {
    async fn try_schedule(&self, base: &str, request: &ScheduleRequest) -> Result<ScheduleVerdict, KernelError> {
        require_base(base)?;
        let form = [
            ("name", request.access_code.clone()),
            ("history_id", request.target.wire_history_id().to_string()),
            ("user_id", request.user_id.to_string()),
        ];
        let response = self
            .http
            .post(format!("{}/worker/schedule", base))
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        let verdict = ScheduleVerdict::parse(&body);
        log::debug!("[KERNEL] Schedule {} -> {:?} ({:?})", request.access_code, verdict, body.trim());
        Ok(verdict)
    }

    async fn open_completion(&self, base: &str, request: &CompletionRequest) -> Result<CompletionStream, KernelError> {
        require_base(base)?;
        let response = self
            .http
            .post(format!("{}/chat/completions", base))
            .header("Accept-Language", &request.locale)
            .header("X-Kuwa-User-Id", request.user_id.to_string())
            .header("X-Kuwa-Api-Token", &request.credentials.api_token)
            .header("X-Kuwa-Api-Base-Urls", &request.api_base_urls)
            .form(&request.form_fields())
            .send()
            .await?;
        let mut body = Box::pin(ensure_success(response).await?.bytes_stream());

        let stream = async_stream::try_stream! {
            let mut lines = LineSplitter::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(KernelError::from)?;
                lines.push(&chunk);
                while let Some(line) = lines.next_line() {
                    yield decode_line(&line);
                }
            }
            // A last line without a terminator is still content
            if let Some(rest) = lines.finish() {
                yield decode_line(&rest);
            }
        };
        Ok(stream.boxed())
    }

    async fn worker_debug(&self, base: &str) -> Result<String, KernelError> {
        require_base(base)?;
        let response = self
            .http
            .get(format!("{}/worker/debug", base))
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(ensure_success(response).await?.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Addressing, DeltaEvent, MessageTarget, StreamItem};
    use crate::models::UserCredentials;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response on a loopback port and hand back the
    /// raw request that was received.
    async fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}/v1.0", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
            status, body
        )
    }

    fn client() -> KernelClient {
        KernelClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_sends_signed_history_id() {
        let (base, server) = serve_once(http_response("200 OK", "ready\n")).await;
        let request = ScheduleRequest {
            access_code: "llama3".into(),
            target: MessageTarget { id: 12, mode: Addressing::Proxied },
            user_id: 3,
        };

        let verdict = client().try_schedule(&base, &request).await.unwrap();
        assert_eq!(verdict, ScheduleVerdict::Ready);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1.0/worker/schedule"));
        assert!(raw.contains("name=llama3"));
        assert!(raw.contains("history_id=-12"));
        assert!(raw.contains("user_id=3"));
    }

    #[tokio::test]
    async fn test_schedule_http_error() {
        let (base, _server) = serve_once(http_response("500 Internal Server Error", "boom")).await;
        let request = ScheduleRequest {
            access_code: "x".into(),
            target: MessageTarget { id: 1, mode: Addressing::Direct },
            user_id: 1,
        };
        let err = client().try_schedule(&base, &request).await.unwrap_err();
        assert!(matches!(err, KernelError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_blank_location_is_not_configured() {
        let request = ScheduleRequest {
            access_code: "x".into(),
            target: MessageTarget { id: 1, mode: Addressing::Direct },
            user_id: 1,
        };
        let err = client().try_schedule("/v1.0", &request).await.unwrap_err();
        assert!(matches!(err, KernelError::NotConfigured));
    }

    #[tokio::test]
    async fn test_completion_stream_decodes_lines() {
        let body = concat!(
            "data: {\"delta\":[{\"type\":\"text\",\"text\":{\"value\":\"Hel\"}}]}\n",
            "data: {\"delta\":[{\"type\":\"text\",\"text\":{\"value\":\"lo\"}},{\"type\":\"exit_code\",\"exit_code\":0}]}\n",
            "legacy raw line\n",
            "tail"
        );
        let (base, server) = serve_once(http_response("200 OK", body)).await;
        let request = CompletionRequest {
            input: r#"[{"msg":"hi","isbot":false}]"#.into(),
            access_code: "llama3".into(),
            user_id: 3,
            target: MessageTarget { id: 12, mode: Addressing::Direct },
            locale: "zh_tw".into(),
            api_base_urls: "http://web".into(),
            credentials: UserCredentials {
                api_token: "secret".into(),
                ..Default::default()
            },
            modelfile: Some("[]".into()),
        };

        let stream = client().open_completion(&base, &request).await.unwrap();
        let items: Vec<StreamItem> = stream.map(|item| item.unwrap()).collect().await;
        assert_eq!(
            items,
            vec![
                StreamItem::Deltas(vec![DeltaEvent::Text("Hel".into())]),
                StreamItem::Deltas(vec![DeltaEvent::Text("lo".into()), DeltaEvent::ExitCode(0)]),
                StreamItem::Raw(b"legacy raw line\n".to_vec()),
                StreamItem::Raw(b"tail".to_vec()),
            ]
        );

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("post /v1.0/chat/completions"));
        assert!(raw.contains("accept-language: zh_tw"));
        assert!(raw.contains("x-kuwa-api-token: secret"));
        assert!(raw.contains("x-kuwa-user-id: 3"));
        assert!(raw.contains("history_id=12"));
        assert!(raw.contains("user_token=secret"));
    }
}
