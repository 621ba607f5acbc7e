pub mod bot;
pub mod chat;
pub mod llm;
pub mod message;
pub mod user;

pub use bot::{Bot, BotConfig, Directive};
pub use chat::Chat;
pub use llm::Llm;
pub use message::{HistoryMessage, Turn};
pub use user::UserCredentials;
