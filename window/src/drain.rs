//! Background eviction of slots behind the window.
//!
//! Two tasks per window:
//!
//! ```text
//!   timer ──(WindowBounds, capacity 1, try_send)──► worker ──► drain_behind()
//! ```
//!
//! The timer ticks every `drain_interval`, computes the current bounds and
//! hands them to the worker without waiting. If a request is still queued
//! the new one is dropped: only the latest left edge matters, and a pending
//! request already covers everything up to an edge that is at most one
//! interval older. The timer keeps its cadence regardless of how long a
//! drain pass takes.
//!
//! Slots are normally created in chronological order, so a pass pops from
//! the head of the slot map. A write at an older timestamp can append an
//! older slot behind newer ones; the pass then sweeps the rest of the map
//! for indices at or before the left edge.
//!
//! Shutdown: the timer stops when the watch channel fires or its sender is
//! dropped; it then drops the handoff sender, which ends the worker after
//! any queued request.

use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use common::logger::{child_span, task_span};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, info, warn};

use crate::error::WindowError;
use crate::position::WindowBounds;
use crate::rolling_window::Shared;
use crate::slot::Slot;

pub(crate) struct DrainHandle {
    shutdown: watch::Sender<bool>,
    timer: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl DrainHandle {
    /// Signals both tasks and waits until they have exited.
    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(true);

        if let Err(e) = self.timer.await {
            warn!(error = ?e, "drain timer task failed");
        }
        if let Err(e) = self.worker.await {
            warn!(error = ?e, "drain worker task failed");
        }
    }
}

pub(crate) fn spawn<K, V>(
    shared: Arc<Shared<K, V>>,
    every: Duration,
) -> Result<DrainHandle, WindowError>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let runtime = Handle::try_current().map_err(|_| WindowError::NoRuntime)?;
    let start = Instant::now().checked_add(every).ok_or_else(|| {
        WindowError::InvalidConfig(format!("drain_interval {every:?} is too large"))
    })?;

    let (tx, rx) = mpsc::channel::<WindowBounds>(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let instance = shared.instance;

    let timer = runtime.spawn(
        run_timer(shared.clone(), start, every, tx, shutdown_rx)
            .instrument(task_span("drain_timer", instance)),
    );
    let worker =
        runtime.spawn(run_worker(shared, rx).instrument(task_span("drain_worker", instance)));

    Ok(DrainHandle {
        shutdown: shutdown_tx,
        timer,
        worker,
    })
}

async fn run_timer<K, V>(
    shared: Arc<Shared<K, V>>,
    start: Instant,
    every: Duration,
    tx: mpsc::Sender<WindowBounds>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(start, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if shared.verbose {
        info!(every_ms = every.as_millis() as u64, "drain timer started");
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let bounds = shared.bounds();
        match tx.try_send(bounds) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if shared.verbose {
                    debug!(
                        window_left = bounds.left,
                        "drain already pending; request coalesced"
                    );
                }
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }

    if shared.verbose {
        info!("drain timer stopped");
    }
}

async fn run_worker<K, V>(shared: Arc<Shared<K, V>>, mut rx: mpsc::Receiver<WindowBounds>)
where
    K: Eq + Hash + Clone,
{
    while let Some(bounds) = rx.recv().await {
        child_span("drain_pass").in_scope(|| shared.drain_behind(bounds));
    }

    if shared.verbose {
        info!("drain worker stopped");
    }
}

impl<K: Eq + Hash + Clone, V> Shared<K, V> {
    /// Evicts every slot whose index is at or before `bounds.left`.
    ///
    /// Pops from the head first; if a stale slot remains behind a newer
    /// head, the remaining slots are swept by index.
    pub(crate) fn drain_behind(&self, bounds: WindowBounds) -> usize {
        let mut evicted = 0;

        while let Some((slot_index, slot)) = self
            .slots
            .pop_oldest_if(|&idx, _| idx <= bounds.left)
        {
            evicted += 1;
            self.log_drained(slot_index, &slot, bounds);
        }

        let mut stale = Vec::new();
        self.slots.range(|&idx, _| {
            if idx <= bounds.left {
                stale.push(idx);
            }
            ControlFlow::Continue(())
        });
        for slot_index in stale {
            if let Some(slot) = self.slots.delete(&slot_index) {
                evicted += 1;
                self.log_drained(slot_index, &slot, bounds);
            }
        }

        if self.verbose && evicted > 0 {
            info!(
                evicted,
                remaining = self.slots.len(),
                window_left = bounds.left,
                "drain pass finished"
            );
        }
        evicted
    }

    fn log_drained(&self, slot_index: i64, slot: &Slot<K, V>, bounds: WindowBounds) {
        if self.verbose {
            debug!(
                slot_index,
                entries = slot.size(),
                window_left = bounds.left,
                "slot drained"
            );
        }
    }
}
