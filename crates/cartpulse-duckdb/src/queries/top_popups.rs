use anyhow::Result;

use cartpulse_core::views::TopPopup;

use crate::backend::parse_dec;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Recovery totals grouped by popup, best first.
    ///
    /// Only recoveries attributed to a popup count; ties on total value are
    /// broken by popup id so the ranking is deterministic. Popups the
    /// directory no longer knows are labeled "Unnamed Popup".
    pub async fn top_popups(&self, shop_id: &str, limit: i64) -> Result<Vec<TopPopup>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT r.popup_id,
                      COALESCE(p.name, 'Unnamed Popup'),
                      COUNT(*),
                      CAST(SUM(r.recovery_value) AS VARCHAR)
               FROM recovery_events r
               LEFT JOIN popups p ON p.id = r.popup_id
               WHERE r.shop_id = ?1 AND r.popup_id IS NOT NULL
               GROUP BY r.popup_id, p.name
               ORDER BY SUM(r.recovery_value) DESC, r.popup_id ASC
               LIMIT ?2"#,
        )?;

        let rows = stmt.query_map(duckdb::params![shop_id, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (popup_id, popup_name, recovery_count, total_recovered) = row?;
            out.push(TopPopup {
                popup_id,
                popup_name,
                recovery_count,
                total_recovered: parse_dec(&total_recovered)?,
            });
        }
        Ok(out)
    }
}
