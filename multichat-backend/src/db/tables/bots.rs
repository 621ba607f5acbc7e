//! Bot and base model (llms) database operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::sqlite::parse_timestamp;
use crate::db::{Database, DbResult};
use crate::models::{Bot, BotConfig, Llm};

impl Database {
    pub fn insert_llm(&self, name: &str, access_code: &str) -> DbResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO llms (name, access_code) VALUES (?1, ?2)",
            params![name, access_code],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_llm(&self, id: i64) -> DbResult<Option<Llm>> {
        let conn = self.conn()?;
        let llm = conn
            .query_row(
                "SELECT id, name, access_code, healthy FROM llms WHERE id = ?1",
                [id],
                map_llm_row,
            )
            .optional()?;
        Ok(llm)
    }

    pub fn llm_by_access_code(&self, access_code: &str) -> DbResult<Option<Llm>> {
        let conn = self.conn()?;
        let llm = conn
            .query_row(
                "SELECT id, name, access_code, healthy FROM llms WHERE access_code = ?1",
                [access_code],
                map_llm_row,
            )
            .optional()?;
        Ok(llm)
    }

    pub fn list_llms(&self) -> DbResult<Vec<Llm>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, access_code, healthy FROM llms ORDER BY id")?;
        let llms = stmt
            .query_map([], map_llm_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(llms)
    }

    /// Stamp `healthy = now` on the given models. Returns the number updated.
    pub fn mark_llms_healthy(&self, ids: &[i64]) -> DbResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE llms SET healthy = ?1 WHERE id = ?2")?;
            for id in ids {
                updated += stmt.execute(params![now, id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Stamp `healthy = now` on every model.
    pub fn reset_llm_health(&self) -> DbResult<usize> {
        let conn = self.conn()?;
        let updated = conn.execute("UPDATE llms SET healthy = ?1", [Utc::now().to_rfc3339()])?;
        Ok(updated)
    }

    pub fn insert_bot(&self, model_id: i64, name: &str, config: Option<&BotConfig>) -> DbResult<i64> {
        let config_json = config.map(serde_json::to_string).transpose()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO bots (model_id, name, config) VALUES (?1, ?2, ?3)",
            params![model_id, name, config_json],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_bot(&self, id: i64) -> DbResult<Option<Bot>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT id, model_id, name, config FROM bots WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((id, model_id, name, config_json)) = row else {
            return Ok(None);
        };
        let config = match config_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => serde_json::from_str(json)?,
            _ => BotConfig::default(),
        };

        Ok(Some(Bot {
            id,
            model_id,
            name,
            config,
        }))
    }
}

fn map_llm_row(row: &Row) -> rusqlite::Result<Llm> {
    let healthy: Option<String> = row.get(3)?;
    Ok(Llm {
        id: row.get(0)?,
        name: row.get(1)?,
        access_code: row.get(2)?,
        healthy: healthy.map(|raw| parse_timestamp(3, &raw)).transpose()?,
    })
}
