// ── Central reactive data store ──
//
// Everything the controller publishes besides connection state:
// per-command statistics, aggregate outputs, and what the last handshake
// told us about the vehicle.

mod collection;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

pub use collection::StatsSnapshot;
use collection::StatsCollection;

use crate::model::{
    AdapterIdentity, Batch, Command, CommandCategory, DecodeResult, FuelSystemStatus,
    MonitorStatus, SampleStats, TroubleCodeState,
};
use crate::stream::{Observable, ValueStream};

/// Reactive store for telemetry and session metadata.
///
/// Mutations are broadcast to subscribers via `watch` channels. Every
/// field except `stats` publishes distinct-until-changed.
pub struct DataStore {
    pub(crate) stats: StatsCollection,
    pub(crate) trouble_codes: Observable<TroubleCodeState>,
    pub(crate) fuel_status: Observable<Option<FuelSystemStatus>>,
    pub(crate) summary_status: Observable<Option<MonitorStatus>>,
    pub(crate) supported: Observable<Arc<HashSet<Command>>>,
    pub(crate) identity: Observable<Option<AdapterIdentity>>,
    pub(crate) active: Observable<Arc<HashSet<Command>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            stats: StatsCollection::new(),
            trouble_codes: Observable::default(),
            fuel_status: Observable::default(),
            summary_status: Observable::default(),
            supported: Observable::default(),
            identity: Observable::default(),
            active: Observable::default(),
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Apply one decoded batch.
    ///
    /// Measurements feed the statistics; status bundles, summary status
    /// and trouble codes overwrite their output wholesale. A requested
    /// trouble-code command with no decodable answer counts as "received,
    /// zero codes".
    pub(crate) fn ingest(&self, requested: &HashSet<Command>, batch: Batch) {
        let mut measurements = Vec::with_capacity(batch.len());
        let mut codes_answered = false;

        for (command, result) in batch {
            match result {
                DecodeResult::Measurement(sample) => measurements.push((command, sample)),
                DecodeResult::StatusBundle(status) => {
                    self.fuel_status.set(Some(status));
                }
                DecodeResult::SummaryStatus(status) => {
                    self.summary_status.set(Some(status));
                }
                DecodeResult::TroubleCodes(codes) => {
                    codes_answered = true;
                    self.trouble_codes.set(TroubleCodeState::received(codes));
                }
                DecodeResult::NoData => trace!(%command, "no data this cycle"),
            }
        }

        let codes_requested = requested
            .iter()
            .any(|c| c.category() == CommandCategory::TroubleCodeRequest);
        if codes_requested && !codes_answered {
            self.trouble_codes.set(TroubleCodeState::received(Vec::new()));
        }

        self.stats.record_all(measurements);
    }

    /// Drop everything tied to a connection cycle.
    pub(crate) fn clear_session_data(&self) {
        self.stats.clear();
        self.trouble_codes.set(TroubleCodeState::Unknown);
        self.fuel_status.set(None);
        self.summary_status.set(None);
        self.identity.set(None);
        self.supported.set(Arc::default());
        self.active.set(Arc::default());
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn stats_for(&self, command: &Command) -> Option<SampleStats> {
        self.stats.get(command)
    }

    pub fn trouble_codes_snapshot(&self) -> TroubleCodeState {
        self.trouble_codes.get()
    }

    pub fn fuel_status_snapshot(&self) -> Option<FuelSystemStatus> {
        self.fuel_status.get()
    }

    pub fn summary_status_snapshot(&self) -> Option<MonitorStatus> {
        self.summary_status.get()
    }

    pub fn supported_snapshot(&self) -> Arc<HashSet<Command>> {
        self.supported.get()
    }

    pub fn identity_snapshot(&self) -> Option<AdapterIdentity> {
        self.identity.get()
    }

    pub fn active_snapshot(&self) -> Arc<HashSet<Command>> {
        self.active.get()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_stats(&self) -> ValueStream<StatsSnapshot> {
        ValueStream::new(self.stats.subscribe())
    }

    pub fn subscribe_trouble_codes(&self) -> ValueStream<TroubleCodeState> {
        self.trouble_codes.subscribe()
    }

    pub fn subscribe_fuel_status(&self) -> ValueStream<Option<FuelSystemStatus>> {
        self.fuel_status.subscribe()
    }

    pub fn subscribe_summary_status(&self) -> ValueStream<Option<MonitorStatus>> {
        self.summary_status.subscribe()
    }

    pub fn subscribe_supported(&self) -> ValueStream<Arc<HashSet<Command>>> {
        self.supported.subscribe()
    }

    pub fn subscribe_identity(&self) -> ValueStream<Option<AdapterIdentity>> {
        self.identity.subscribe()
    }

    pub fn subscribe_active(&self) -> ValueStream<Arc<HashSet<Command>>> {
        self.active.subscribe()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
