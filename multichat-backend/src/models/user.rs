use serde::{Deserialize, Serialize};

/// Per-user secrets forwarded to executors with every completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCredentials {
    pub openai_token: Option<String>,
    pub google_token: Option<String>,
    pub nim_token: Option<String>,
    pub third_party_token: Option<String>,
    /// Token the executor can use to call back into the platform API.
    pub api_token: String,
}
