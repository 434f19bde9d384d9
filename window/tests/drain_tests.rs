// Timer-driven eviction. Runs on tokio's paused clock: `sleep` auto-advances
// virtual time, so the drain timer fires deterministically. The window's own
// notion of "now" comes from a ManualClock moved in lockstep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::time::ManualClock;
use tokio::time::sleep;
use window::{GetOptions, RollingWindow, SetOptions, WindowConfig};

const T0_MS: i64 = 1_700_000_000_000;

fn at(offset_ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(T0_MS + offset_ms).unwrap()
}

fn drained_window(
    slot_amount: i64,
    drain_interval: Duration,
) -> (Arc<ManualClock>, RollingWindow<&'static str, i32>) {
    let clock = Arc::new(ManualClock::from_millis(T0_MS));
    let cfg = WindowConfig::default()
        .with_slots(slot_amount, Duration::from_secs(1))
        .with_drain_interval(drain_interval)
        .with_time_provider(clock.clone());
    (clock, RollingWindow::new(cfg).unwrap())
}

/// Moves both clocks forward by `d`. Sleeps a millisecond past `d` so timer
/// ticks due at the same instant run before the caller resumes.
async fn advance(clock: &ManualClock, d: Duration) {
    clock.advance(d);
    sleep(d + Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn timer_drains_expired_slots() {
    let (clock, w) = drained_window(6, Duration::from_secs(1));

    w.set("k", 20, SetOptions::default()).unwrap();

    advance(&clock, Duration::from_secs(2)).await;
    assert_eq!(w.get("k", GetOptions::current_window()), Some(20));
    assert_eq!(w.slot_count(), 1);

    advance(&clock, Duration::from_secs(5)).await;
    assert_eq!(w.get("k", GetOptions::current_window()), None);
    assert_eq!(w.slot_count(), 0, "drain should have evicted the slot");
    assert_eq!(w.size(), 0);
}

#[tokio::test(start_paused = true)]
async fn slots_inside_window_survive_drains() {
    let (clock, w) = drained_window(5, Duration::from_millis(300));

    w.set("k", 20, SetOptions::default()).unwrap();
    advance(&clock, Duration::from_secs(2)).await;

    assert_eq!(w.get("k", GetOptions::current_window()), Some(20));
    assert_eq!(w.slot_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_drain_before_first_interval() {
    let (clock, w) = drained_window(2, Duration::from_secs(10));

    w.set("k", 1, SetOptions::default()).unwrap();

    // The window has moved past the slot, but the timer has not fired yet.
    advance(&clock, Duration::from_secs(5)).await;
    assert_eq!(w.slot_count(), 1);
    assert_eq!(w.get("k", GetOptions::current_window()), None);

    advance(&clock, Duration::from_secs(6)).await;
    assert_eq!(w.slot_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn drain_keeps_pace_with_continuous_writes() {
    let (clock, w) = drained_window(3, Duration::from_secs(1));

    for i in 0..30 {
        w.set("k", i, SetOptions::default()).unwrap();
        advance(&clock, Duration::from_secs(1)).await;
    }

    // Only slots newer than the left edge remain.
    assert!(w.slot_count() <= 3, "slot_count = {}", w.slot_count());
    assert!(w.slot_count() >= 1);
    let bounds = w.window_bounds();
    assert!(w.slot_indices().iter().all(|&idx| idx > bounds.left));
}

#[tokio::test(start_paused = true)]
async fn close_stops_eviction_but_not_reads() {
    let (clock, w) = drained_window(2, Duration::from_secs(1));

    w.set("k", 1, SetOptions::default()).unwrap();
    w.close().await;
    assert!(w.is_closed());

    advance(&clock, Duration::from_secs(10)).await;
    assert_eq!(w.slot_count(), 1, "no drain after close");

    // explicit passes still work
    assert_eq!(w.drain_now(), 1);

    w.set("j", 2, SetOptions::default()).unwrap();
    assert_eq!(w.get("j", GetOptions::current_window()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn close_is_idempotent() {
    let (_clock, w) = drained_window(2, Duration::from_secs(1));
    assert!(!w.is_closed());

    w.close().await;
    w.close().await;
    assert!(w.is_closed());
}

#[tokio::test(start_paused = true)]
async fn set_at_explicit_time_expires_with_its_slot() {
    let (clock, w) = drained_window(6, Duration::from_secs(1));

    w.set_with_time("old", 1, at(-5_000), SetOptions::default())
        .unwrap();
    w.set("new", 2, SetOptions::default()).unwrap();

    // left edge reaches t0-5s after one second
    advance(&clock, Duration::from_secs(1)).await;
    assert_eq!(w.get("old", GetOptions::after(at(-10_000))), None);
    assert_eq!(w.get("new", GetOptions::current_window()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_window_stops_its_tasks() {
    let (clock, w) = drained_window(2, Duration::from_secs(1));
    w.set("k", 1, SetOptions::default()).unwrap();
    drop(w);

    // Nothing left to observe directly; the runtime must simply stay healthy
    // and not panic while the tasks wind down.
    advance(&clock, Duration::from_secs(5)).await;
}
