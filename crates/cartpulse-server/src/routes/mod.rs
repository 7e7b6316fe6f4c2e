pub mod activity;
pub mod conversion;
pub mod health;
pub mod hourly;
pub mod stats;
pub mod top_popups;
pub mod track;
pub mod ws;

use crate::error::AppError;

/// Every query route scopes by shop; reject early when the parameter is
/// missing or blank.
pub(crate) fn require_shop_id(shop_id: Option<&str>) -> Result<String, AppError> {
    match shop_id.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(AppError::BadRequest(
            "shopId query parameter is required".to_string(),
        )),
    }
}

/// Clamp a user-supplied limit into `[1, max]`, falling back to `default`.
pub(crate) fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}
