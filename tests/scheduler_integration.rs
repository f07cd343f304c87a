//! Integration tests for slot-window scheduling and rate resolution

mod common;

use proptest::prelude::*;
use std::sync::Arc;

use common::feed;
use mulgyeol::scheduler::{
    backfill_slot_offsets, due_feeds_condition, slot_offset_ms, RefreshRateResolver,
    StaticBenefitsProvider, SlotWindow, TierRates,
};
use mulgyeol::storage::{FeedStore, MemoryFeedStore};

const TICK_MS: u64 = 60_000;

// ============================================================================
// Slot determinism
// ============================================================================

#[test]
fn slot_offset_round_trips_through_persistence() {
    let url = "https://example.com/rss";
    let offset = slot_offset_ms(url, 600);

    // Recomputing from the same (url, interval) always reproduces the
    // persisted value
    for _ in 0..10 {
        assert_eq!(slot_offset_ms(url, 600), offset);
    }
    assert!(offset < 600_000);
}

#[test]
fn slot_offset_changes_with_interval() {
    let url = "https://example.com/rss";
    let at_600 = slot_offset_ms(url, 600);
    let at_120 = slot_offset_ms(url, 120);

    assert!(at_600 < 600_000);
    assert!(at_120 < 120_000);
}

// ============================================================================
// Window membership, storage-query equivalence
// ============================================================================

#[tokio::test]
async fn query_selection_equals_window_membership() {
    let interval_ms = 600_000;
    let feeds: Vec<_> = (0..50)
        .map(|i| {
            feed(
                &format!("f{i:02}"),
                &format!("https://example.com/{i}"),
                600,
                Some(i * 12_000),
            )
        })
        .collect();
    let store = MemoryFeedStore::with_feeds(feeds).await;

    for tick in 0..10u64 {
        let window = SlotWindow::compute(tick * TICK_MS, interval_ms, TICK_MS);
        let condition = due_feeds_condition(600, &window);
        let selected = store.find_matching(&condition).await.unwrap();

        for feed in &selected {
            assert!(window.contains(feed.slot_offset_ms.unwrap()));
        }
        // 50 offsets spaced 12s apart inside a 60s window
        assert_eq!(selected.len(), 5, "tick {tick}");
    }
}

#[tokio::test]
async fn legacy_feeds_without_offset_are_always_eligible() {
    let store = MemoryFeedStore::with_feeds(vec![
        feed("legacy", "https://example.com/legacy", 600, None),
        feed("migrated", "https://example.com/migrated", 600, Some(300_000)),
    ])
    .await;

    // A window nowhere near 300000ms still selects the legacy feed
    let window = SlotWindow::compute(0, 600_000, TICK_MS);
    let selected = store
        .find_matching(&due_feeds_condition(600, &window))
        .await
        .unwrap();

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, "legacy");
}

#[tokio::test]
async fn backfill_removes_the_legacy_exemption() {
    let store = Arc::new(
        MemoryFeedStore::with_feeds(vec![feed("a", "https://example.com/a", 600, None)]).await,
    );

    let port: Arc<dyn FeedStore> = store.clone();
    let report = backfill_slot_offsets(port, 100).await.unwrap();
    assert_eq!(report.feeds_updated, 1);

    let migrated = store.get("a").await.unwrap();
    let offset = migrated.slot_offset_ms.unwrap();

    // After migration the feed is due in exactly one tick per cycle
    let mut selections = 0;
    for tick in 0..10u64 {
        let window = SlotWindow::compute(tick * TICK_MS, 600_000, TICK_MS);
        if window.contains(offset) {
            selections += 1;
        }
    }
    assert_eq!(selections, 1);
}

// ============================================================================
// Exactly-once partition property
// ============================================================================

proptest! {
    /// Over one full interval's worth of ticks, every slot offset is
    /// selected exactly once, with or without wraparound and regardless of
    /// the tick phase.
    #[test]
    fn each_slot_selected_exactly_once_per_cycle(
        ticks_per_cycle in 1u64..60,
        slot_fraction in 0.0f64..1.0,
        phase_ms in 0u64..60_000,
    ) {
        let interval_ms = ticks_per_cycle * TICK_MS;
        let slot = ((interval_ms as f64 * slot_fraction) as u64).min(interval_ms - 1);

        let mut selections = 0u32;
        for k in 0..ticks_per_cycle {
            let now_ms = phase_ms + k * TICK_MS;
            let window = SlotWindow::compute(now_ms, interval_ms, TICK_MS);
            if window.contains(slot) {
                selections += 1;
            }
        }

        prop_assert_eq!(selections, 1);
    }

    /// The wraparound flag is set exactly when the window crosses the
    /// interval boundary.
    #[test]
    fn wraparound_flag_matches_definition(
        now_ms in 0u64..10_000_000,
        ticks_per_cycle in 1u64..60,
    ) {
        let interval_ms = ticks_per_cycle * TICK_MS;
        let window = SlotWindow::compute(now_ms, interval_ms, TICK_MS);
        prop_assert_eq!(
            window.wraps_around_interval,
            window.window_end_ms > interval_ms
        );
    }
}

// ============================================================================
// Rate resolution (spec-level scenarios)
// ============================================================================

#[tokio::test]
async fn elevated_tier_without_override_gets_vip_rate() {
    let resolver = RefreshRateResolver::new(TierRates::default(), Vec::new());
    let benefits = StaticBenefitsProvider::new().with_vip("vip-owner");

    let mut record = feed("f1", "https://example.com/rss", 600, None);
    record.user_refresh_rate_seconds = None;
    record.owner_id = "vip-owner".to_string();

    assert_eq!(resolver.resolve(&record, &benefits).await, 120);
}

#[tokio::test]
async fn override_wins_regardless_of_tier() {
    let resolver = RefreshRateResolver::new(
        TierRates::default(),
        vec![mulgyeol::models::RefreshSchedule {
            name: "forced-slow".to_string(),
            keywords: vec!["example.com".to_string()],
            feed_ids: Vec::new(),
            refresh_rate_minutes: 60,
        }],
    );
    let benefits = StaticBenefitsProvider::new().with_vip("vip-owner");

    let mut record = feed("f1", "https://example.com/rss", 600, None);
    record.user_refresh_rate_seconds = None;
    record.owner_id = "vip-owner".to_string();

    // One hour, slower than both the vip and default tier rates
    assert_eq!(resolver.resolve(&record, &benefits).await, 3600);
}
