//! Write path: abandonment inserts and the one-shot recovery transition.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use cartpulse_core::event::{
    AbandonmentEvent, CartItem, RecoveryEvent, TrackAbandonment, TrackRecovery,
};

use crate::backend::{fmt_ts, parse_dec, parse_ts};
use crate::{DuckDbBackend, StoreError};

impl DuckDbBackend {
    /// Persist a new abandonment with `recovered = false`.
    ///
    /// Validates the payload before any write. `now` is captured by the
    /// caller so created/updated timestamps match the response body exactly.
    pub async fn record_abandonment(
        &self,
        payload: &TrackAbandonment,
        now: DateTime<Utc>,
    ) -> Result<AbandonmentEvent, StoreError> {
        payload.validate().map_err(StoreError::Validation)?;

        let id = Uuid::new_v4().to_string();
        let cart_items_json = serde_json::to_string(&payload.cart_items)
            .map_err(|e| StoreError::Store(anyhow::Error::new(e)))?;

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO cart_abandonment_events (
                id, shop_id, session_id, cart_value, cart_items,
                recovered, recovered_at, recovered_via, popup_id,
                device_type, traffic_source, user_location,
                user_ip, user_agent, page_url,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                FALSE, NULL, NULL, NULL,
                ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13
            )"#,
            duckdb::params![
                id,
                payload.shop_id,
                payload.session_id,
                payload.cart_value.to_string(),
                cart_items_json,
                payload.device_type,
                payload.traffic_source,
                payload.user_location,
                payload.user_ip,
                payload.user_agent,
                payload.page_url,
                fmt_ts(now),
                fmt_ts(now),
            ],
        )?;

        debug!(shop_id = %payload.shop_id, event_id = %id, "recorded cart abandonment");

        Ok(AbandonmentEvent {
            id,
            shop_id: payload.shop_id.clone(),
            session_id: payload.session_id.clone(),
            cart_value: payload.cart_value,
            cart_items: payload.cart_items.clone(),
            recovered: false,
            recovered_at: None,
            recovered_via: None,
            popup_id: None,
            device_type: payload.device_type.clone(),
            traffic_source: payload.traffic_source.clone(),
            user_location: payload.user_location.clone(),
            user_ip: payload.user_ip.clone(),
            user_agent: payload.user_agent.clone(),
            page_url: payload.page_url.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Mark the parent abandonment recovered and persist a [`RecoveryEvent`],
    /// atomically.
    ///
    /// Both writes happen in one DuckDB transaction: either the parent flips
    /// to recovered *and* the recovery row exists, or neither. The UPDATE is
    /// guarded by `recovered = FALSE`, so the transition is a single atomic
    /// read-modify-write keyed by the record id — a second recovery attempt
    /// fails with [`StoreError::AlreadyRecovered`] and writes nothing.
    pub async fn record_recovery(
        &self,
        payload: &TrackRecovery,
        now: DateTime<Utc>,
    ) -> Result<RecoveryEvent, StoreError> {
        payload.validate().map_err(StoreError::Validation)?;

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let recovered: bool = match tx
            .prepare("SELECT recovered FROM cart_abandonment_events WHERE id = ?1 AND shop_id = ?2")
            .map_err(StoreError::from)?
            .query_row(
                duckdb::params![payload.cart_abandonment_id, payload.shop_id],
                |row| row.get(0),
            ) {
            Ok(v) => v,
            Err(duckdb::Error::QueryReturnedNoRows) => {
                return Err(StoreError::NotFound(format!(
                    "cart abandonment {} for shop {}",
                    payload.cart_abandonment_id, payload.shop_id
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if recovered {
            return Err(StoreError::AlreadyRecovered(
                payload.cart_abandonment_id.clone(),
            ));
        }

        let updated = tx
            .execute(
                r#"UPDATE cart_abandonment_events
               SET recovered = TRUE,
                   recovered_at = ?1,
                   recovered_via = ?2,
                   popup_id = COALESCE(?3, popup_id),
                   updated_at = ?1
               WHERE id = ?4 AND shop_id = ?5 AND recovered = FALSE"#,
                duckdb::params![
                    fmt_ts(now),
                    payload.recovery_method,
                    payload.popup_id,
                    payload.cart_abandonment_id,
                    payload.shop_id,
                ],
            )
            .map_err(StoreError::from)?;
        if updated != 1 {
            // The guarded update found no unrecovered row; nothing committed.
            return Err(StoreError::AlreadyRecovered(
                payload.cart_abandonment_id.clone(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            r#"INSERT INTO recovery_events (
                id, cart_abandonment_id, shop_id, popup_id,
                recovery_value, recovery_method, offer_used, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            duckdb::params![
                id,
                payload.cart_abandonment_id,
                payload.shop_id,
                payload.popup_id,
                payload.recovery_value.to_string(),
                payload.recovery_method,
                payload.offer_used,
                fmt_ts(now),
            ],
        )
        .map_err(StoreError::from)?;

        tx.commit().map_err(StoreError::from)?;

        debug!(
            shop_id = %payload.shop_id,
            recovery_id = %id,
            abandonment_id = %payload.cart_abandonment_id,
            "recorded cart recovery"
        );

        Ok(RecoveryEvent {
            id,
            cart_abandonment_id: payload.cart_abandonment_id.clone(),
            shop_id: payload.shop_id.clone(),
            popup_id: payload.popup_id.clone(),
            recovery_value: payload.recovery_value,
            recovery_method: payload.recovery_method.clone(),
            offer_used: payload.offer_used.clone(),
            created_at: now,
        })
    }

    /// Read back a single abandonment, shop-scoped. `None` if absent.
    pub async fn fetch_abandonment(
        &self,
        shop_id: &str,
        id: &str,
    ) -> Result<Option<AbandonmentEvent>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                r#"SELECT id, shop_id, session_id, CAST(cart_value AS VARCHAR), cart_items,
                      recovered, CAST(recovered_at AS VARCHAR), recovered_via, popup_id,
                      device_type, traffic_source, user_location,
                      user_ip, user_agent, page_url,
                      CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
               FROM cart_abandonment_events
               WHERE shop_id = ?1 AND id = ?2"#,
            )
            .map_err(StoreError::from)?;

        let row = stmt.query_row(duckdb::params![shop_id, id], |row| {
            Ok(RawAbandonmentRow {
                id: row.get(0)?,
                shop_id: row.get(1)?,
                session_id: row.get(2)?,
                cart_value: row.get(3)?,
                cart_items: row.get(4)?,
                recovered: row.get(5)?,
                recovered_at: row.get(6)?,
                recovered_via: row.get(7)?,
                popup_id: row.get(8)?,
                device_type: row.get(9)?,
                traffic_source: row.get(10)?,
                user_location: row.get(11)?,
                user_ip: row.get(12)?,
                user_agent: row.get(13)?,
                page_url: row.get(14)?,
                created_at: row.get(15)?,
                updated_at: row.get(16)?,
            })
        });

        match row {
            Ok(raw) => Ok(Some(raw.into_event()?)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All recovery events referencing one abandonment, oldest first.
    /// Used by handlers and tests to pin the exactly-one-recovery property.
    pub async fn recoveries_for(
        &self,
        shop_id: &str,
        cart_abandonment_id: &str,
    ) -> Result<Vec<RecoveryEvent>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                r#"SELECT id, cart_abandonment_id, shop_id, popup_id,
                      CAST(recovery_value AS VARCHAR), recovery_method, offer_used,
                      CAST(created_at AS VARCHAR)
               FROM recovery_events
               WHERE shop_id = ?1 AND cart_abandonment_id = ?2
               ORDER BY created_at ASC"#,
            )
            .map_err(StoreError::from)?;

        let rows = stmt
            .query_map(duckdb::params![shop_id, cart_abandonment_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(StoreError::from)?;

        let mut out = Vec::new();
        for row in rows {
            let (id, cart_abandonment_id, shop_id, popup_id, value, method, offer, created) =
                row.map_err(StoreError::from)?;
            out.push(RecoveryEvent {
                id,
                cart_abandonment_id,
                shop_id,
                popup_id,
                recovery_value: parse_dec(&value)?,
                recovery_method: method,
                offer_used: offer,
                created_at: parse_ts(&created)?,
            });
        }
        Ok(out)
    }
}

/// String-typed row as it comes off the DuckDB wire, before timestamp and
/// decimal parsing.
struct RawAbandonmentRow {
    id: String,
    shop_id: String,
    session_id: String,
    cart_value: String,
    cart_items: String,
    recovered: bool,
    recovered_at: Option<String>,
    recovered_via: Option<String>,
    popup_id: Option<String>,
    device_type: Option<String>,
    traffic_source: Option<String>,
    user_location: Option<String>,
    user_ip: Option<String>,
    user_agent: Option<String>,
    page_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawAbandonmentRow {
    fn into_event(self) -> Result<AbandonmentEvent, StoreError> {
        let cart_items: Vec<CartItem> = serde_json::from_str(&self.cart_items)
            .map_err(|e| StoreError::Store(anyhow::Error::new(e)))?;
        Ok(AbandonmentEvent {
            id: self.id,
            shop_id: self.shop_id,
            session_id: self.session_id,
            cart_value: parse_dec(&self.cart_value)?,
            cart_items,
            recovered: self.recovered,
            recovered_at: self.recovered_at.as_deref().map(parse_ts).transpose()?,
            recovered_via: self.recovered_via,
            popup_id: self.popup_id,
            device_type: self.device_type,
            traffic_source: self.traffic_source,
            user_location: self.user_location,
            user_ip: self.user_ip,
            user_agent: self.user_agent,
            page_url: self.page_url,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}
