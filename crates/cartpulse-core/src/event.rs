use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line item inside an abandoned cart.
///
/// The storefront script sends these as a JSON array; the server validates
/// the shape at the ingestion boundary and stores the array serialized to a
/// single VARCHAR column (DuckDB has no jsonb type).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_title: Option<String>,
}

/// The payload the storefront script sends to POST /api/revenue/track-abandonment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAbandonment {
    pub shop_id: String,
    pub session_id: String,
    pub cart_value: Decimal,
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub traffic_source: Option<String>,
    #[serde(default)]
    pub user_location: Option<String>,
    #[serde(default)]
    pub user_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
}

impl TrackAbandonment {
    /// Shape validation, run before any write.
    pub fn validate(&self) -> Result<(), String> {
        if self.shop_id.trim().is_empty() {
            return Err("shopId must not be empty".to_string());
        }
        if self.session_id.trim().is_empty() {
            return Err("sessionId must not be empty".to_string());
        }
        if self.cart_value < Decimal::ZERO {
            return Err("cartValue must be >= 0".to_string());
        }
        if self.cart_items.is_empty() {
            return Err("cartItems must not be empty".to_string());
        }
        for (i, item) in self.cart_items.iter().enumerate() {
            if item.quantity < 1 {
                return Err(format!("cartItems[{i}].quantity must be >= 1"));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(format!("cartItems[{i}].unitPrice must be >= 0"));
            }
        }
        Ok(())
    }
}

/// The payload sent to POST /api/revenue/track-recovery when an abandoned
/// cart converts to a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecovery {
    pub cart_abandonment_id: String,
    pub shop_id: String,
    #[serde(default)]
    pub popup_id: Option<String>,
    pub recovery_value: Decimal,
    pub recovery_method: String,
    #[serde(default)]
    pub offer_used: Option<String>,
}

impl TrackRecovery {
    pub fn validate(&self) -> Result<(), String> {
        if self.shop_id.trim().is_empty() {
            return Err("shopId must not be empty".to_string());
        }
        if self.cart_abandonment_id.trim().is_empty() {
            return Err("cartAbandonmentId must not be empty".to_string());
        }
        if self.recovery_value < Decimal::ZERO {
            return Err("recoveryValue must be >= 0".to_string());
        }
        if self.recovery_method.trim().is_empty() {
            return Err("recoveryMethod must not be empty".to_string());
        }
        Ok(())
    }
}

/// A stored abandonment — mirrors the `cart_abandonment_events` table.
///
/// `recovered == true` iff `recovered_at` is set. The recovery transition
/// happens at most once; there is no un-recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonmentEvent {
    pub id: String,
    pub shop_id: String,
    pub session_id: String,
    pub cart_value: Decimal,
    pub cart_items: Vec<CartItem>,
    pub recovered: bool,
    pub recovered_at: Option<DateTime<Utc>>,
    pub recovered_via: Option<String>,
    pub popup_id: Option<String>,
    pub device_type: Option<String>,
    pub traffic_source: Option<String>,
    pub user_location: Option<String>,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub page_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored recovery — mirrors the `recovery_events` table. Immutable, always
/// references exactly one [`AbandonmentEvent`]. `shop_id` is denormalized from
/// the parent for shop-scoped grouping queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryEvent {
    pub id: String,
    pub cart_abandonment_id: String,
    pub shop_id: String,
    pub popup_id: Option<String>,
    pub recovery_value: Decimal,
    pub recovery_method: String,
    pub offer_used: Option<String>,
    pub created_at: DateTime<Utc>,
}
