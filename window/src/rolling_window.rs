//! Time-bucketed key/value store with background expiry.
//!
//! Writes are bucketed into fixed-width slots by timestamp. Reads are
//! restricted to a caller-chosen slot range. A pair of background tasks
//! (see [`crate::drain`]) evicts slots once they fall behind the window.
//!
//! Slots live in a [`LinkedMap`] keyed by slot index. Slots are created as
//! time advances, so insertion order usually tracks chronological order and
//! the oldest slot is the map's head. An explicit-time write into an older,
//! not yet created slot breaks that order; range reads and the drain work
//! from slot indices and do not rely on it.
//!
//! Writing is two critical sections, not one: find-or-create the slot, then
//! store into it. A write that lands in a slot the drain is evicting at
//! that moment can be lost together with the slot.

use std::borrow::Borrow;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use common::time::TimeProvider;
use linkedmap::LinkedMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::WindowConfig;
use crate::drain::{self, DrainHandle};
use crate::error::WindowError;
use crate::options::{GetOptions, Selection, SetOptions};
use crate::position::{Geometry, RelativePosition, WindowBounds, WindowPosition};
use crate::slot::Slot;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Upper bound on the slot map's preallocation.
const MAX_PREALLOCATED_SLOTS: usize = 1_024;

/// State shared between the foreground handle and the drain tasks.
pub(crate) struct Shared<K, V> {
    pub(crate) slots: LinkedMap<i64, Arc<Slot<K, V>>>,
    pub(crate) geometry: Geometry,
    pub(crate) clock: Arc<dyn TimeProvider>,
    pub(crate) verbose: bool,
    pub(crate) instance: u64,
}

impl<K, V> Shared<K, V> {
    pub(crate) fn bounds(&self) -> WindowBounds {
        self.geometry.bounds(self.clock.now())
    }
}

/// Rolling-window cache.
///
/// Owns its drain tasks: they stop on [`close`](Self::close) or when the
/// window is dropped. Must be created inside a tokio runtime.
pub struct RollingWindow<K, V> {
    shared: Arc<Shared<K, V>>,
    drain: Mutex<Option<DrainHandle>>,
}

impl<K, V> RollingWindow<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Validates `config` and starts the drain tasks on the current runtime.
    pub fn new(config: WindowConfig) -> Result<Self, WindowError> {
        let slot_size_ms = config.validate()?;
        // the window plus the slot being drained
        let capacity = usize::try_from(config.slot_amount)
            .map_or(MAX_PREALLOCATED_SLOTS, |n| n.min(MAX_PREALLOCATED_SLOTS))
            + 2;

        let shared = Arc::new(Shared {
            slots: LinkedMap::with_capacity(capacity),
            geometry: Geometry {
                slot_amount: config.slot_amount,
                slot_size_ms,
            },
            clock: config.time_provider,
            verbose: config.verbose,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        });

        let drain = drain::spawn(shared.clone(), config.drain_interval)?;

        if shared.verbose {
            info!(
                instance = shared.instance,
                slot_amount = config.slot_amount,
                slot_size_ms,
                drain_interval_ms = config.drain_interval.as_millis() as u64,
                "rolling window created"
            );
        }

        Ok(Self {
            shared,
            drain: Mutex::new(Some(drain)),
        })
    }

    pub fn with_defaults() -> Result<Self, WindowError> {
        Self::new(WindowConfig::default())
    }

    /// Writes `key` under `opts.time`, or under "now" when unset.
    ///
    /// Returns `Ok(false)` only for an NX write that found the key already
    /// present in its slot.
    pub fn set(&self, key: K, value: V, opts: SetOptions) -> Result<bool, WindowError> {
        let t = opts.time.unwrap_or_else(|| self.shared.clock.now());
        self.set_with_time(key, value, t, opts)
    }

    /// Writes `key` into the slot that `t` falls in. `t` overrides `opts.time`.
    ///
    /// Timestamps outside the current window are rejected without mutation.
    pub fn set_with_time(
        &self,
        key: K,
        value: V,
        t: DateTime<Utc>,
        opts: SetOptions,
    ) -> Result<bool, WindowError> {
        let bounds = self.window_bounds();
        let slot_index = self.shared.geometry.slot_index(t);

        match bounds.classify(slot_index) {
            RelativePosition::Behind => {
                return Err(WindowError::BehindOfWindow {
                    slot_index,
                    left: bounds.left,
                });
            }
            RelativePosition::Lead => {
                return Err(WindowError::LeadOfWindow {
                    slot_index,
                    right: bounds.right,
                });
            }
            RelativePosition::In => {}
        }

        let slot = self.slot_for(slot_index);

        if opts.nx {
            let (_, inserted) = slot.load_or_store(key, value);
            return Ok(inserted);
        }

        slot.store(key, value);
        Ok(true)
    }

    /// Looks `key` up in the range selected by `opts`.
    ///
    /// - `current_window`: slots `left..=right` oldest first, so the oldest
    ///   slot holding the key wins.
    /// - `after`/`before`: slots from `before` (default: now) down to `after`
    ///   (default: the smallest live slot index), so the newest slot holding
    ///   the key wins.
    /// - no selector: `None` without a lookup.
    pub fn get<Q>(&self, key: &Q, opts: GetOptions) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        match opts.selection()? {
            Selection::CurrentWindow => {
                let bounds = self.window_bounds();
                (bounds.left..=bounds.right).find_map(|idx| self.load_from(idx, key))
            }
            Selection::Range { after, before } => self.get_in_range(key, after, before),
        }
    }

    /// Number of entries across all live slots, including expired slots the
    /// drain has not reached yet.
    pub fn size(&self) -> usize {
        let mut total = 0;
        self.shared.slots.range(|_, slot| {
            total += slot.size();
            ControlFlow::Continue(())
        });
        total
    }

    pub fn slot_count(&self) -> usize {
        self.shared.slots.len()
    }

    /// Live slot indices, newest first.
    pub fn slot_indices(&self) -> Vec<i64> {
        self.shared.slots.keys()
    }

    /// Current window bounds, plus where `at` falls relative to them.
    pub fn window_position(&self, at: Option<DateTime<Utc>>) -> WindowPosition {
        self.shared.geometry.position(self.shared.clock.now(), at)
    }

    pub fn window_bounds(&self) -> WindowBounds {
        self.shared.bounds()
    }

    pub fn slot_index_of(&self, t: DateTime<Utc>) -> i64 {
        self.shared.geometry.slot_index(t)
    }

    /// Runs one drain pass against the current window on the calling thread.
    /// Returns how many slots were evicted.
    pub fn drain_now(&self) -> usize {
        self.shared.drain_behind(self.shared.bounds())
    }

    /// Stops the drain tasks and waits for them to exit. Idempotent.
    ///
    /// Reads and writes keep working afterwards; only eviction stops.
    pub async fn close(&self) {
        let handle = self.drain.lock().take();
        let Some(handle) = handle else {
            return;
        };

        handle.shutdown().await;

        if self.shared.verbose {
            info!(instance = self.shared.instance, "rolling window closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.drain.lock().is_none()
    }

    fn slot_for(&self, slot_index: i64) -> Arc<Slot<K, V>> {
        if let Some(slot) = self.shared.slots.load(&slot_index) {
            return slot;
        }

        let (slot, created) = self
            .shared
            .slots
            .load_or_store(slot_index, Arc::new(Slot::new(slot_index)));

        if created && self.shared.verbose {
            debug!(
                instance = self.shared.instance,
                slot_index, "slot created"
            );
        }
        slot
    }

    fn load_from<Q>(&self, slot_index: i64, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.shared.slots.load(&slot_index)?.load(key)
    }

    fn get_in_range<Q>(
        &self,
        key: &Q,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        // Indices outside the live extent cannot hold a slot.
        let (lo, hi) = self.live_extent()?;
        let geometry = self.shared.geometry;

        let right = before.map_or_else(|| self.window_bounds().right, |t| geometry.slot_index(t));
        let left = after.map_or(lo, |t| geometry.slot_index(t));
        let (left, right) = (left.max(lo), right.min(hi));

        (left..=right)
            .rev()
            .find_map(|idx| self.load_from(idx, key))
    }

    /// Smallest and largest live slot index.
    fn live_extent(&self) -> Option<(i64, i64)> {
        let mut extent: Option<(i64, i64)> = None;
        self.shared.slots.range(|&idx, _| {
            extent = Some(match extent {
                None => (idx, idx),
                Some((lo, hi)) => (lo.min(idx), hi.max(idx)),
            });
            ControlFlow::Continue(())
        });
        extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::time::ManualClock;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn ms(v: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(v).unwrap()
    }

    fn window(clock: &Arc<ManualClock>, verbose: bool) -> RollingWindow<String, u32> {
        let cfg = WindowConfig::default()
            .with_slots(6, Duration::from_secs(1))
            .with_drain_interval(Duration::from_secs(3_600))
            .with_time_provider(clock.clone())
            .with_verbose(verbose);
        RollingWindow::new(cfg).unwrap()
    }

    #[tokio::test]
    async fn set_uses_time_provider_by_default() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, false);

        assert_eq!(w.set("k".into(), 1, SetOptions::default()), Ok(true));
        assert_eq!(w.slot_indices(), vec![10]);
    }

    #[tokio::test]
    async fn set_time_option_picks_the_slot() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, false);

        w.set("k".into(), 1, SetOptions::at(ms(7_200))).unwrap();
        assert_eq!(w.slot_indices(), vec![7]);
    }

    #[tokio::test]
    async fn rejected_writes_do_not_create_slots() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, false);

        let behind = w.set_with_time("k".into(), 1, ms(3_999), SetOptions::default());
        assert_eq!(
            behind,
            Err(WindowError::BehindOfWindow {
                slot_index: 3,
                left: 4
            })
        );

        let lead = w.set_with_time("k".into(), 1, ms(11_000), SetOptions::default());
        assert!(lead.unwrap_err().is_lead());

        assert_eq!(w.slot_count(), 0);
        assert_eq!(w.size(), 0);
    }

    #[tokio::test]
    async fn window_position_reports_classification() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, false);

        let p = w.window_position(Some(ms(4_000)));
        assert_eq!(p.slot_index, Some(4));
        assert_eq!(p.relative_position, Some(RelativePosition::In));
        assert_eq!(p.bounds, WindowBounds { left: 4, right: 10 });

        assert_eq!(w.window_position(None).slot_index, None);
    }

    #[tokio::test]
    async fn live_extent_ignores_insertion_order() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, false);

        w.set_with_time("a".into(), 1, ms(9_000), SetOptions::default())
            .unwrap();
        w.set_with_time("b".into(), 2, ms(5_000), SetOptions::default())
            .unwrap();

        assert_eq!(w.live_extent(), Some((5, 9)));
        assert_eq!(w.get("b", GetOptions::after(ms(0))), Some(2));
        // without `after` the scan still reaches the smallest index
        assert_eq!(w.get("b", GetOptions::before(ms(10_500))), Some(2));
    }

    #[tokio::test]
    #[traced_test]
    async fn verbose_window_logs_slot_lifecycle() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, true);

        w.set("k".into(), 1, SetOptions::default()).unwrap();
        assert!(logs_contain("slot created"));

        clock.advance(Duration::from_secs(30));
        assert_eq!(w.drain_now(), 1);
        assert!(logs_contain("slot drained"));
    }

    #[tokio::test]
    #[traced_test]
    async fn quiet_window_logs_nothing_per_slot() {
        let clock = Arc::new(ManualClock::from_millis(10_500));
        let w = window(&clock, false);

        w.set("k".into(), 1, SetOptions::default()).unwrap();
        clock.advance(Duration::from_secs(30));
        w.drain_now();

        assert!(!logs_contain("slot created"));
        assert!(!logs_contain("slot drained"));
    }

    #[test]
    fn new_outside_runtime_fails() {
        let res = RollingWindow::<String, u32>::with_defaults();
        assert!(matches!(res, Err(WindowError::NoRuntime)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            // Clock moves forward between writes; after each drain the
            // head of the slot map is the smallest live index and nothing
            // at or behind the left edge survives.
            #[test]
            fn oldest_slot_is_smallest_after_drain(
                steps in prop::collection::vec((0u64..2_500, any::<bool>()), 1..40),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();

                rt.block_on(async {
                    let clock = Arc::new(ManualClock::from_millis(1_000_000));
                    let w = window(&clock, false);

                    for (i, (step_ms, drain)) in steps.iter().enumerate() {
                        clock.advance(Duration::from_millis(*step_ms));
                        w.set(format!("k{i}"), i as u32, SetOptions::default()).unwrap();
                        if *drain {
                            w.drain_now();
                        }
                    }
                    w.drain_now();

                    let indices = w.slot_indices();
                    let bounds = w.window_bounds();
                    prop_assert!(indices.iter().all(|&idx| idx > bounds.left));
                    prop_assert!(indices.windows(2).all(|p| p[0] > p[1]));
                    if let Some(min) = indices.iter().min() {
                        let oldest = w.shared.slots.oldest().map(|s| s.index());
                        prop_assert_eq!(oldest, Some(*min));
                    }
                    Ok(())
                })?;
            }
        }
    }
}
