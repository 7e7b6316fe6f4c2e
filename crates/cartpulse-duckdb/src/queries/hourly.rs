use anyhow::Result;
use chrono::NaiveDate;

use cartpulse_core::views::HourlyBucket;

use crate::backend::parse_dec;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// At-risk / recovered cart value summed per UTC creation hour for one
    /// calendar day.
    ///
    /// Always returns a dense 24-element array indexed 0-23; hours with no
    /// events stay zero.
    pub async fn hourly_breakdown(
        &self,
        shop_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<HourlyBucket>> {
        let day_start = format!("{} 00:00:00", date.format("%Y-%m-%d"));
        let day_end = format!(
            "{} 00:00:00",
            (date + chrono::Duration::days(1)).format("%Y-%m-%d")
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT CAST(EXTRACT(HOUR FROM created_at) AS INTEGER),
                      CAST(COALESCE(SUM(CASE WHEN NOT recovered THEN cart_value ELSE 0 END), 0) AS VARCHAR),
                      CAST(COALESCE(SUM(CASE WHEN recovered THEN cart_value ELSE 0 END), 0) AS VARCHAR)
               FROM cart_abandonment_events
               WHERE shop_id = ?1 AND created_at >= ?2 AND created_at < ?3
               GROUP BY 1
               ORDER BY 1"#,
        )?;

        let rows = stmt.query_map(duckdb::params![shop_id, day_start, day_end], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut buckets: Vec<HourlyBucket> = (0..24).map(HourlyBucket::zero).collect();
        for row in rows {
            let (hour, at_risk, recovered) = row?;
            if (0..24).contains(&hour) {
                buckets[hour as usize] = HourlyBucket {
                    hour: hour as u32,
                    at_risk: parse_dec(&at_risk)?,
                    recovered: parse_dec(&recovered)?,
                };
            }
        }
        Ok(buckets)
    }
}
