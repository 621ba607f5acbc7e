use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A base model as known to the executor kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Llm {
    pub id: i64,
    pub name: String,
    /// Key the executor registers under; the scheduling key.
    pub access_code: String,
    /// Last time the kernel reported an executor for this model.
    pub healthy: Option<DateTime<Utc>>,
}
