//! Minimal popup directory surface.
//!
//! Popup lifecycles belong to the popup CRUD subsystem; the tracking core
//! only needs an id -> name lookup to label feed items and rankings. The
//! owning subsystem (and tests) keep this table in sync via `upsert_popup`.

use anyhow::Result;

use crate::DuckDbBackend;

impl DuckDbBackend {
    pub async fn upsert_popup(&self, id: &str, shop_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO popups (id, shop_id, name) VALUES (?1, ?2, ?3)",
            duckdb::params![id, shop_id, name],
        )?;
        Ok(())
    }

    pub async fn popup_name(&self, shop_id: &str, id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let name = conn
            .prepare("SELECT name FROM popups WHERE shop_id = ?1 AND id = ?2")?
            .query_row(duckdb::params![shop_id, id], |row| row.get(0));
        match name {
            Ok(name) => Ok(Some(name)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
