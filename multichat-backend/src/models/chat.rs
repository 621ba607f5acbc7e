use serde::{Deserialize, Serialize};

/// A conversation owned by one user and answered by one bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub user_id: i64,
    pub bot_id: i64,
    pub name: String,
}
