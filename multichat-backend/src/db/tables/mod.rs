//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod bots;            // bots, llms
mod chats;           // chats
mod histories;       // histories (chat turns)
mod system_settings; // system_settings (operator overrides)
mod users;           // users (credentials, api token)
