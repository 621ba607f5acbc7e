//! Chat turn (histories) database operations

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::sqlite::parse_timestamp;
use crate::db::{Database, DbResult};
use crate::models::{HistoryMessage, Turn};

const MESSAGE_COLUMNS: &str = "id, chat_id, msg, isbot, chained, created_at, updated_at";

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Database {
    /// Append a turn to a chat. Submission normally happens outside this
    /// service; used by seeding and tests.
    pub fn insert_message(
        &self,
        chat_id: i64,
        msg: &str,
        is_bot: bool,
        chained: bool,
    ) -> DbResult<HistoryMessage> {
        let conn = self.conn()?;
        let now = now_string();
        conn.execute(
            "INSERT INTO histories (chat_id, msg, isbot, chained, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![chat_id, msg, is_bot as i32, chained as i32, now],
        )?;
        let id = conn.last_insert_rowid();

        let message = conn.query_row(
            &format!("SELECT {} FROM histories WHERE id = ?1", MESSAGE_COLUMNS),
            [id],
            map_message_row,
        )?;
        Ok(message)
    }

    pub fn get_message(&self, id: i64) -> DbResult<Option<HistoryMessage>> {
        let conn = self.conn()?;
        let message = conn
            .query_row(
                &format!("SELECT {} FROM histories WHERE id = ?1", MESSAGE_COLUMNS),
                [id],
                map_message_row,
            )
            .optional()?;
        Ok(message)
    }

    /// Overwrite a turn's text. Returns false if the row does not exist.
    pub fn set_message_text(&self, id: i64, msg: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE histories SET msg = ?1, updated_at = ?2 WHERE id = ?3",
            params![msg, now_string(), id],
        )?;
        Ok(rows > 0)
    }

    /// Earlier turns of `chat_id` used as model context for `before_id`.
    ///
    /// Chained turns get the whole earlier conversation; unchained turns only
    /// the single most recent earlier turn.
    pub fn prior_turns(&self, chat_id: i64, before_id: i64, chained: bool) -> DbResult<Vec<Turn>> {
        let conn = self.conn()?;
        let sql = if chained {
            "SELECT msg, isbot FROM histories WHERE chat_id = ?1 AND id < ?2
             ORDER BY created_at ASC, id DESC"
        } else {
            "SELECT msg, isbot FROM histories WHERE chat_id = ?1 AND id < ?2
             ORDER BY created_at DESC, id ASC LIMIT 1"
        };

        let mut stmt = conn.prepare(sql)?;
        let turns = stmt
            .query_map(params![chat_id, before_id], |row| {
                Ok(Turn {
                    msg: row.get(0)?,
                    isbot: row.get::<_, i32>(1)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }
}

fn map_message_row(row: &Row) -> rusqlite::Result<HistoryMessage> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(HistoryMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        msg: row.get(2)?,
        is_bot: row.get::<_, i32>(3)? != 0,
        chained: row.get::<_, i32>(4)? != 0,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::models::Turn;
    use crate::processing::notices::PLACEHOLDER;

    fn seeded() -> (Database, i64) {
        let db = Database::new(":memory:").unwrap();
        let user = db.insert_user("alice").unwrap();
        let llm = db.insert_llm("Llama", "llama3").unwrap();
        let bot = db.insert_bot(llm, "Helper", None).unwrap();
        let chat = db.insert_chat(user, bot, "chat").unwrap();
        (db, chat)
    }

    #[test]
    fn test_set_message_text() {
        let (db, chat) = seeded();
        let msg = db.insert_message(chat, PLACEHOLDER, true, false).unwrap();
        assert!(msg.is_placeholder());

        assert!(db.set_message_text(msg.id, "done").unwrap());
        let reloaded = db.get_message(msg.id).unwrap().unwrap();
        assert_eq!(reloaded.msg, "done");
        assert!(!reloaded.is_placeholder());

        assert!(!db.set_message_text(9999, "nobody").unwrap());
        assert!(db.get_message(9999).unwrap().is_none());
    }

    #[test]
    fn test_prior_turns_chained_and_unchained() {
        let (db, chat) = seeded();
        db.insert_message(chat, "q1", false, true).unwrap();
        db.insert_message(chat, "a1", true, true).unwrap();
        db.insert_message(chat, "q2", false, true).unwrap();
        let target = db.insert_message(chat, PLACEHOLDER, true, true).unwrap();

        let chained = db.prior_turns(chat, target.id, true).unwrap();
        assert_eq!(chained.len(), 3);
        assert!(chained.contains(&Turn::user("q1")));
        assert!(chained.contains(&Turn::bot("a1")));

        let single = db.prior_turns(chat, target.id, false).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_prior_turns_excludes_other_chats_and_later_turns() {
        let (db, chat) = seeded();
        let first = db.insert_message(chat, "first", false, true).unwrap();
        db.insert_message(chat, "later", false, true).unwrap();
        assert!(db.prior_turns(chat, first.id, true).unwrap().is_empty());
        assert!(db.prior_turns(chat + 1, i64::MAX, true).unwrap().is_empty());
    }
}
