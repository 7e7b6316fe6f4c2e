use anyhow::Result;

use cartpulse_core::views::ConversionSlice;

use crate::backend::parse_dec;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Recovery totals grouped by method across all time for a shop, with
    /// each method's integer-rounded share of the total recovery count.
    pub async fn conversion_breakdown(&self, shop_id: &str) -> Result<Vec<ConversionSlice>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT recovery_method,
                      COUNT(*),
                      CAST(SUM(recovery_value) AS VARCHAR)
               FROM recovery_events
               WHERE shop_id = ?1
               GROUP BY recovery_method
               ORDER BY SUM(recovery_value) DESC, recovery_method ASC"#,
        )?;

        let rows = stmt.query_map(duckdb::params![shop_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut grouped = Vec::new();
        for row in rows {
            let (method, count, total_value) = row?;
            grouped.push((method, count, parse_dec(&total_value)?));
        }

        let total: i64 = grouped.iter().map(|(_, count, _)| count).sum();
        Ok(grouped
            .into_iter()
            .map(|(method, count, total_value)| ConversionSlice {
                method,
                count,
                percentage: if total > 0 {
                    (count as f64 / total as f64 * 100.0).round() as i64
                } else {
                    0
                },
                total_value,
            })
            .collect())
    }
}
