/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`,
/// read from `Config.duckdb_memory_limit` (env `CARTPULSE_DUCKDB_MEMORY`).
/// An explicit limit is always set — the DuckDB default (80% of system RAM)
/// is not acceptable for a server process. `SET threads = 2` caps the
/// background thread pool for single-writer embedded use.
///
/// Monetary columns are DECIMAL(10,2); all aggregation over them happens in
/// DuckDB's exact decimal arithmetic and is read back through
/// `CAST(... AS VARCHAR)` into `rust_decimal::Decimal`.
///
/// No FOREIGN KEY constraints: the recovery write path checks the parent
/// abandonment explicitly inside its transaction, and DuckDB's immediate FK
/// enforcement makes the constraints more trouble than they are worth.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- POPUP DIRECTORY (externally owned)
-- ===========================================
-- The popup CRUD subsystem owns popup lifecycles; this table is the minimal
-- lookup surface (id -> name) the activity feed and top-popup ranking join
-- against.
CREATE TABLE IF NOT EXISTS popups (
    id              VARCHAR PRIMARY KEY,
    shop_id         VARCHAR NOT NULL,
    name            VARCHAR NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_popups_shop ON popups(shop_id);

-- ===========================================
-- CART ABANDONMENT EVENTS (append-only + one recovery transition)
-- ===========================================
CREATE TABLE IF NOT EXISTS cart_abandonment_events (
    id              VARCHAR PRIMARY KEY,           -- uuid v4
    shop_id         VARCHAR NOT NULL,
    session_id      VARCHAR NOT NULL,
    cart_value      DECIMAL(10,2) NOT NULL,
    cart_items      VARCHAR NOT NULL,              -- JSON array of line items
    recovered       BOOLEAN NOT NULL DEFAULT FALSE,
    recovered_at    TIMESTAMP,                     -- set iff recovered
    recovered_via   VARCHAR,                       -- recovery method tag
    popup_id        VARCHAR,
    device_type     VARCHAR,
    traffic_source  VARCHAR,
    user_location   VARCHAR,
    user_ip         VARCHAR,
    user_agent      VARCHAR,
    page_url        VARCHAR,
    created_at      TIMESTAMP NOT NULL,
    updated_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_abandonment_shop_created
    ON cart_abandonment_events(shop_id, created_at);
CREATE INDEX IF NOT EXISTS idx_abandonment_shop_recovered_created
    ON cart_abandonment_events(shop_id, recovered, created_at);

-- ===========================================
-- RECOVERY EVENTS (immutable)
-- ===========================================
-- shop_id is denormalized from the parent abandonment for shop-scoped
-- grouping queries.
CREATE TABLE IF NOT EXISTS recovery_events (
    id                   VARCHAR PRIMARY KEY,
    cart_abandonment_id  VARCHAR NOT NULL,
    shop_id              VARCHAR NOT NULL,
    popup_id             VARCHAR,
    recovery_value       DECIMAL(10,2) NOT NULL,
    recovery_method      VARCHAR NOT NULL,
    offer_used           VARCHAR,
    created_at           TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recovery_shop_created
    ON recovery_events(shop_id, created_at);

-- ===========================================
-- REVENUE STATS CACHE (derived, disposable)
-- ===========================================
-- One row per shop; the three windows are always written together from one
-- point-in-time recompute and share last_updated. May be dropped and
-- rebuilt at any time without data loss.
CREATE TABLE IF NOT EXISTS revenue_stats_cache (
    shop_id                VARCHAR PRIMARY KEY,
    today_at_risk          DECIMAL(10,2) NOT NULL DEFAULT 0,
    today_recovered        DECIMAL(10,2) NOT NULL DEFAULT 0,
    today_recovery_rate    DOUBLE NOT NULL DEFAULT 0,
    today_abandoned_count  BIGINT NOT NULL DEFAULT 0,
    today_recovered_count  BIGINT NOT NULL DEFAULT 0,
    week_at_risk           DECIMAL(10,2) NOT NULL DEFAULT 0,
    week_recovered         DECIMAL(10,2) NOT NULL DEFAULT 0,
    week_recovery_rate     DOUBLE NOT NULL DEFAULT 0,
    week_abandoned_count   BIGINT NOT NULL DEFAULT 0,
    week_recovered_count   BIGINT NOT NULL DEFAULT 0,
    month_at_risk          DECIMAL(10,2) NOT NULL DEFAULT 0,
    month_recovered        DECIMAL(10,2) NOT NULL DEFAULT 0,
    month_recovery_rate    DOUBLE NOT NULL DEFAULT 0,
    month_abandoned_count  BIGINT NOT NULL DEFAULT 0,
    month_recovered_count  BIGINT NOT NULL DEFAULT 0,
    last_updated           TIMESTAMP NOT NULL
);
"#
    )
}
