//! User credential database operations

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::db::{Database, DbError, DbResult};
use crate::models::UserCredentials;

impl Database {
    pub fn insert_user(&self, name: &str) -> DbResult<i64> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO users (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_user_tokens(
        &self,
        user_id: i64,
        openai: Option<&str>,
        google: Option<&str>,
        nim: Option<&str>,
        third_party: Option<&str>,
    ) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET openai_token = ?1, google_token = ?2, nim_token = ?3, third_party_token = ?4
             WHERE id = ?5",
            params![openai, google, nim, third_party, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Load forwarded credentials, creating the per-user API token if missing.
    pub fn user_credentials(&self, user_id: i64) -> DbResult<UserCredentials> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT openai_token, google_token, nim_token, third_party_token, api_token
                 FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((openai_token, google_token, nim_token, third_party_token, api_token)) = row else {
            return Err(DbError::NotFound { entity: "user", id: user_id });
        };

        let api_token = match api_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => token,
            None => {
                let token = Uuid::new_v4().simple().to_string();
                conn.execute(
                    "UPDATE users SET api_token = ?1 WHERE id = ?2",
                    params![token, user_id],
                )?;
                log::info!("[DB] Issued API token for user {}", user_id);
                token
            }
        };

        Ok(UserCredentials {
            openai_token,
            google_token,
            nim_token,
            third_party_token,
            api_token,
        })
    }
}
