use anyhow::Result;
use chrono::{DateTime, Utc};

use cartpulse_core::event::CartItem;
use cartpulse_core::views::{ActivityItem, ActivityKind};
use cartpulse_core::window::time_ago;

use crate::backend::{parse_dec, parse_ts};
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Live activity feed: the most recent `limit` abandonments for a shop,
    /// newest first, each tagged `abandonment` or `recovery` with a
    /// read-time relative age computed against `now`.
    pub async fn activity_feed(
        &self,
        shop_id: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActivityItem>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT e.id, CAST(e.cart_value AS VARCHAR), e.cart_items, e.recovered,
                      e.user_location, e.device_type, e.traffic_source, e.recovered_via,
                      p.name, CAST(e.created_at AS VARCHAR)
               FROM cart_abandonment_events e
               LEFT JOIN popups p ON p.id = e.popup_id
               WHERE e.shop_id = ?1
               ORDER BY e.created_at DESC
               LIMIT ?2"#,
        )?;

        let rows = stmt.query_map(duckdb::params![shop_id, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut feed = Vec::new();
        for row in rows {
            let (
                id,
                cart_value,
                cart_items,
                recovered,
                location,
                device_type,
                traffic_source,
                recovered_via,
                popup_name,
                created_at,
            ) = row?;
            let items: Vec<CartItem> = serde_json::from_str(&cart_items)?;
            let timestamp = parse_ts(&created_at)?;
            feed.push(ActivityItem {
                id,
                kind: if recovered {
                    ActivityKind::Recovery
                } else {
                    ActivityKind::Abandonment
                },
                value: parse_dec(&cart_value)?,
                items,
                location,
                device_type,
                traffic_source,
                timestamp,
                recovered_via,
                popup_name,
                time_ago: time_ago(timestamp, now),
            });
        }
        Ok(feed)
    }
}
