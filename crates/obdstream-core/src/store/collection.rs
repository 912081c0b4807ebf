// ── Per-command statistics collection ──
//
// Concurrent storage keyed by `Command` with push-based change
// notification via a `watch` snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{Command, Measurement, SampleStats};

/// Snapshot type handed to subscribers.
pub type StatsSnapshot = Arc<HashMap<Command, SampleStats>>;

/// Reactive map of [`SampleStats`] per command.
///
/// Every mutation rebuilds the snapshot once. Batches are applied as a
/// unit so subscribers see one change per batch.
pub(crate) struct StatsCollection {
    by_command: DashMap<Command, SampleStats>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<StatsSnapshot>,
}

impl StatsCollection {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(HashMap::new()));

        Self {
            by_command: DashMap::new(),
            snapshot,
        }
    }

    /// Fold a set of measurements in. First sample for a command seeds its
    /// entry; later samples update it in place.
    pub(crate) fn record_all(&self, samples: impl IntoIterator<Item = (Command, Measurement)>) {
        let mut touched = false;
        for (command, sample) in samples {
            self.by_command
                .entry(command)
                .and_modify(|stats| stats.record(sample))
                .or_insert_with(|| SampleStats::first(sample));
            touched = true;
        }
        if touched {
            self.rebuild_snapshot();
        }
    }

    /// Reset every entry to its latest value with a count of one.
    pub(crate) fn reset_all(&self) {
        if self.by_command.is_empty() {
            return;
        }
        for mut entry in self.by_command.iter_mut() {
            entry.value_mut().reset();
        }
        self.rebuild_snapshot();
    }

    pub(crate) fn get(&self, command: &Command) -> Option<SampleStats> {
        self.by_command.get(command).map(|r| r.value().clone())
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot.subscribe()
    }

    /// Remove all entries.
    pub(crate) fn clear(&self) {
        if self.by_command.is_empty() {
            return;
        }
        self.by_command.clear();
        self.rebuild_snapshot();
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values into a snapshot map and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let values: HashMap<Command, SampleStats> = self
            .by_command
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
