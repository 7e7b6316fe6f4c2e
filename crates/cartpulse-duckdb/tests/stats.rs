use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use cartpulse_core::event::{CartItem, TrackAbandonment, TrackRecovery};
use cartpulse_core::views::ActivityKind;
use cartpulse_duckdb::DuckDbBackend;

const STALENESS: Duration = Duration::from_secs(300);

fn backend() -> DuckDbBackend {
    DuckDbBackend::open_in_memory().expect("in-memory DuckDB")
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 20, h, m, s)
        .single()
        .expect("valid ts")
}

fn abandonment(shop_id: &str, session: &str, cart_value: Decimal) -> TrackAbandonment {
    TrackAbandonment {
        shop_id: shop_id.to_string(),
        session_id: session.to_string(),
        cart_value,
        cart_items: vec![CartItem {
            product_id: None,
            title: "Widget".to_string(),
            quantity: 1,
            unit_price: cart_value,
            variant_title: None,
        }],
        device_type: None,
        traffic_source: None,
        user_location: None,
        user_ip: None,
        user_agent: None,
        page_url: None,
    }
}

fn recovery(
    shop_id: &str,
    cart_abandonment_id: &str,
    value: Decimal,
    method: &str,
    popup_id: Option<&str>,
) -> TrackRecovery {
    TrackRecovery {
        cart_abandonment_id: cart_abandonment_id.to_string(),
        shop_id: shop_id.to_string(),
        popup_id: popup_id.map(str::to_string),
        recovery_value: value,
        recovery_method: method.to_string(),
        offer_used: None,
    }
}

#[tokio::test]
async fn compute_window_partitions_by_recovered() {
    let db = backend();
    let t = at(10, 0, 0);

    let kept = db
        .record_abandonment(&abandonment("shop_1", "s1", dec!(50)), t)
        .await
        .expect("record");
    db.record_abandonment(&abandonment("shop_1", "s2", dec!(19.99)), t)
        .await
        .expect("record");
    db.record_recovery(&recovery("shop_1", &kept.id, dec!(45), "exit_popup", None), t)
        .await
        .expect("recover");

    let stats = db
        .compute_window("shop_1", at(0, 0, 0), at(23, 59, 59))
        .await
        .expect("window");
    assert_eq!(stats.abandoned_count, 2);
    assert_eq!(stats.recovered_count, 1);
    assert_eq!(stats.at_risk, dec!(19.99));
    // The recovered sum tracks the recorded recovery value, not the cart value.
    assert_eq!(stats.recovered, dec!(45));
    assert_eq!(stats.recovery_rate, 50.0);
}

#[tokio::test]
async fn compute_window_is_deterministic() {
    let db = backend();
    let t = at(12, 0, 0);
    db.record_abandonment(&abandonment("shop_1", "s1", dec!(33.33)), t)
        .await
        .expect("record");

    let first = db
        .compute_window("shop_1", at(0, 0, 0), at(23, 59, 59))
        .await
        .expect("window");
    let second = db
        .compute_window("shop_1", at(0, 0, 0), at(23, 59, 59))
        .await
        .expect("window");
    assert_eq!(first, second);
}

#[tokio::test]
async fn compute_window_respects_range_bounds() {
    let db = backend();
    db.record_abandonment(&abandonment("shop_1", "s1", dec!(10)), at(8, 0, 0))
        .await
        .expect("record");
    db.record_abandonment(&abandonment("shop_1", "s2", dec!(20)), at(18, 0, 0))
        .await
        .expect("record");

    let stats = db
        .compute_window("shop_1", at(0, 0, 0), at(12, 0, 0))
        .await
        .expect("window");
    assert_eq!(stats.abandoned_count, 1);
    assert_eq!(stats.at_risk, dec!(10));
}

#[tokio::test]
async fn empty_shop_yields_all_zero_snapshot() {
    let db = backend();
    let snapshot = db
        .get_stats("shop_empty", at(12, 0, 0), STALENESS)
        .await
        .expect("stats");
    assert_eq!(snapshot.today.abandoned_count, 0);
    assert_eq!(snapshot.today.at_risk, Decimal::ZERO);
    assert_eq!(snapshot.today.recovery_rate, 0.0);
    assert_eq!(snapshot.week.abandoned_count, 0);
    assert_eq!(snapshot.month.abandoned_count, 0);
}

#[tokio::test]
async fn fresh_snapshot_is_served_from_cache() {
    let db = backend();
    let t0 = at(12, 0, 0);
    db.record_abandonment(&abandonment("shop_1", "s1", dec!(50)), t0)
        .await
        .expect("record");

    let first = db.get_stats("shop_1", t0, STALENESS).await.expect("stats");
    assert_eq!(first.last_updated, t0);

    // Within the threshold: same snapshot, same last_updated.
    let t1 = t0 + chrono::Duration::seconds(60);
    let second = db.get_stats("shop_1", t1, STALENESS).await.expect("stats");
    assert_eq!(second.last_updated, first.last_updated);
    assert_eq!(second.today, first.today);
}

#[tokio::test]
async fn stale_snapshot_recomputes_with_unchanged_totals() {
    let db = backend();
    let t0 = at(12, 0, 0);
    db.record_abandonment(&abandonment("shop_1", "s1", dec!(50)), t0)
        .await
        .expect("record");

    let first = db.get_stats("shop_1", t0, STALENESS).await.expect("stats");

    // Past the threshold with no intervening writes: identical numeric
    // totals, refreshed last_updated.
    let t1 = t0 + chrono::Duration::seconds(301);
    let second = db.get_stats("shop_1", t1, STALENESS).await.expect("stats");
    assert_eq!(second.last_updated, t1);
    assert_eq!(second.today, first.today);
    assert_eq!(second.week, first.week);
    assert_eq!(second.month, first.month);
    assert!(second.last_updated > first.last_updated);
}

#[tokio::test]
async fn fifty_dollar_abandonment_scenario() {
    let db = backend();
    let t = at(12, 0, 0);
    db.record_abandonment(&abandonment("s1", "sess", dec!(50)), t)
        .await
        .expect("record");

    let snapshot = db.get_stats("s1", t, STALENESS).await.expect("stats");
    assert_eq!(snapshot.today.at_risk, dec!(50));
    assert_eq!(snapshot.today.recovered, Decimal::ZERO);
    assert_eq!(snapshot.today.abandoned_count, 1);
    assert_eq!(snapshot.today.recovery_rate, 0.0);
}

#[tokio::test]
async fn recovered_for_forty_five_scenario() {
    let db = backend();
    let t = at(12, 0, 0);
    let event = db
        .record_abandonment(&abandonment("s1", "sess", dec!(50)), t)
        .await
        .expect("record");
    db.record_recovery(&recovery("s1", &event.id, dec!(45), "exit_popup", None), t)
        .await
        .expect("recover");

    let snapshot = db.get_stats("s1", t, STALENESS).await.expect("stats");
    assert_eq!(snapshot.today.recovered, dec!(45));
    assert_eq!(snapshot.today.recovery_rate, 100.0);
    assert_eq!(snapshot.today.at_risk, Decimal::ZERO);
}

#[tokio::test]
async fn hourly_breakdown_is_dense_and_bucketed_by_hour() {
    let db = backend();
    let unrecovered_at = at(9, 15, 0);
    let recovered_at = at(14, 40, 0);

    db.record_abandonment(&abandonment("shop_1", "s1", dec!(50)), unrecovered_at)
        .await
        .expect("record");
    let event = db
        .record_abandonment(&abandonment("shop_1", "s2", dec!(30)), recovered_at)
        .await
        .expect("record");
    db.record_recovery(
        &recovery("shop_1", &event.id, dec!(25), "exit_popup", None),
        recovered_at,
    )
    .await
    .expect("recover");

    let buckets = db
        .hourly_breakdown("shop_1", at(0, 0, 0).date_naive())
        .await
        .expect("hourly");

    assert_eq!(buckets.len(), 24);
    for (i, bucket) in buckets.iter().enumerate() {
        assert_eq!(bucket.hour, i as u32);
    }
    assert_eq!(buckets[9].at_risk, dec!(50));
    assert_eq!(buckets[9].recovered, Decimal::ZERO);
    // The hourly chart plots cart value by abandonment hour.
    assert_eq!(buckets[14].recovered, dec!(30));
    assert_eq!(buckets[14].at_risk, Decimal::ZERO);

    let total: Decimal = buckets.iter().map(|b| b.at_risk + b.recovered).sum();
    assert_eq!(total, dec!(80));
}

#[tokio::test]
async fn top_popups_ranks_by_value_and_truncates() {
    let db = backend();
    let t = at(12, 0, 0);
    db.upsert_popup("popup_a", "shop_1", "Exit Intent")
        .await
        .expect("popup");
    db.upsert_popup("popup_b", "shop_1", "Timed Offer")
        .await
        .expect("popup");

    for (session, popup, value) in [
        ("s1", "popup_a", dec!(60)),
        ("s2", "popup_a", dec!(40)),
        ("s3", "popup_b", dec!(80)),
    ] {
        let event = db
            .record_abandonment(&abandonment("shop_1", session, value), t)
            .await
            .expect("record");
        db.record_recovery(
            &recovery("shop_1", &event.id, value, "exit_popup", Some(popup)),
            t,
        )
        .await
        .expect("recover");
    }

    let top = db.top_popups("shop_1", 1).await.expect("top");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].popup_id, "popup_a");
    assert_eq!(top[0].popup_name, "Exit Intent");
    assert_eq!(top[0].recovery_count, 2);
    assert_eq!(top[0].total_recovered, dec!(100));

    let all = db.top_popups("shop_1", 5).await.expect("top");
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].popup_id, "popup_b");
    assert_eq!(all[1].total_recovered, dec!(80));
}

#[tokio::test]
async fn unattributed_recoveries_stay_out_of_the_popup_ranking() {
    let db = backend();
    let t = at(12, 0, 0);
    let event = db
        .record_abandonment(&abandonment("shop_1", "s1", dec!(50)), t)
        .await
        .expect("record");
    db.record_recovery(&recovery("shop_1", &event.id, dec!(45), "email", None), t)
        .await
        .expect("recover");

    let top = db.top_popups("shop_1", 5).await.expect("top");
    assert!(top.is_empty());
}

#[tokio::test]
async fn conversion_breakdown_reports_method_shares() {
    let db = backend();
    let t = at(12, 0, 0);
    for (session, method, value) in [
        ("s1", "exit_popup", dec!(40)),
        ("s2", "exit_popup", dec!(35)),
        ("s3", "email_campaign", dec!(20)),
    ] {
        let event = db
            .record_abandonment(&abandonment("shop_1", session, value), t)
            .await
            .expect("record");
        db.record_recovery(&recovery("shop_1", &event.id, value, method, None), t)
            .await
            .expect("recover");
    }

    let breakdown = db.conversion_breakdown("shop_1").await.expect("breakdown");
    assert_eq!(breakdown.len(), 2);
    // Ordered by total value descending.
    assert_eq!(breakdown[0].method, "exit_popup");
    assert_eq!(breakdown[0].count, 2);
    assert_eq!(breakdown[0].percentage, 67);
    assert_eq!(breakdown[0].total_value, dec!(75));
    assert_eq!(breakdown[1].method, "email_campaign");
    assert_eq!(breakdown[1].count, 1);
    assert_eq!(breakdown[1].percentage, 33);
}

#[tokio::test]
async fn activity_feed_tags_and_orders_events() {
    let db = backend();
    let older = at(10, 0, 0);
    let newer = at(11, 0, 0);

    db.record_abandonment(&abandonment("shop_1", "s1", dec!(50)), older)
        .await
        .expect("record");
    let event = db
        .record_abandonment(&abandonment("shop_1", "s2", dec!(30)), newer)
        .await
        .expect("record");
    db.record_recovery(
        &recovery("shop_1", &event.id, dec!(25), "exit_popup", None),
        newer,
    )
    .await
    .expect("recover");

    let now = at(11, 0, 30);
    let feed = db.activity_feed("shop_1", 10, now).await.expect("feed");
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].kind, ActivityKind::Recovery);
    assert_eq!(feed[0].value, dec!(30));
    assert_eq!(feed[0].recovered_via.as_deref(), Some("exit_popup"));
    assert_eq!(feed[0].time_ago, "30 sec ago");
    assert_eq!(feed[1].kind, ActivityKind::Abandonment);
    assert_eq!(feed[1].time_ago, "1 hr ago");

    let limited = db.activity_feed("shop_1", 1, now).await.expect("feed");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].kind, ActivityKind::Recovery);
}
