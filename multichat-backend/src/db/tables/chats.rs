//! Chat database operations

use rusqlite::{params, OptionalExtension};

use crate::db::{Database, DbResult};
use crate::models::Chat;

impl Database {
    pub fn insert_chat(&self, user_id: i64, bot_id: i64, name: &str) -> DbResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chats (user_id, bot_id, name) VALUES (?1, ?2, ?3)",
            params![user_id, bot_id, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_chat(&self, id: i64) -> DbResult<Option<Chat>> {
        let conn = self.conn()?;
        let chat = conn
            .query_row(
                "SELECT id, user_id, bot_id, name FROM chats WHERE id = ?1",
                [id],
                |row| {
                    Ok(Chat {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        bot_id: row.get(2)?,
                        name: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(chat)
    }
}
