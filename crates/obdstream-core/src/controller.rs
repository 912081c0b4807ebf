// ── Controller abstraction ──
//
// Connection lifecycle for one adapter. Owns the transport handle, turns
// interest, unit and connection events into session restarts, and fans
// decoded batches into the DataStore.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard as AsyncMutexGuard, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use obdstream_api::{Transport, TransportFactory, TransportPhase};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{
    AdapterIdentity, Command, ConnectionDetails, FuelSystemStatus, MonitorStatus, SampleStats,
    TroubleCodeState, UnitSystem,
};
use crate::registry::InterestRegistry;
use crate::session::{StreamingSession, effective_commands};
use crate::store::DataStore;
use crate::stream::{Observable, ValueStream};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed {
        reason: String,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// `Disconnected` or `Failed`: nothing is running.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed { .. })
    }

    /// `connect()` is accepted only from a terminal state.
    pub fn can_connect(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Collapse the transport's finer phases into the four controller states.
impl From<&TransportPhase> for ConnectionState {
    fn from(phase: &TransportPhase) -> Self {
        match phase {
            TransportPhase::Disconnected => Self::Disconnected,
            TransportPhase::ConnectingToAdapter
            | TransportPhase::ConnectedToAdapter
            | TransportPhase::ConnectingToVehicle => Self::Connecting,
            TransportPhase::ConnectedToVehicle => Self::Connected,
            TransportPhase::Error(message) => Self::Failed {
                reason: CoreError::StreamInterrupted {
                    message: message.clone(),
                }
                .to_string(),
            },
        }
    }
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Transport failures never
/// surface as errors from [`connect()`](Self::connect); they end up as
/// [`ConnectionState::Failed`]. Background tasks hold clones while a
/// connection is up, so streaming continues until
/// [`disconnect()`](Self::disconnect) even if every caller handle is gone.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ArcSwap<ControllerConfig>,
    registry: InterestRegistry,
    factory: Arc<dyn TransportFactory>,
    /// Swapped wholesale by `update_connection_details`.
    transport: ArcSwap<Arc<dyn Transport>>,
    store: Arc<DataStore>,
    units: Observable<UnitSystem>,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    /// Current connection cycle. Lock order: `cycle` before
    /// `connection_state`.
    cycle: std::sync::Mutex<Cycle>,
    /// Serializes connect attempts with teardowns.
    lifecycle: Mutex<()>,
    session: Mutex<StreamingSession>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// One connect..teardown span. Faults carrying an older epoch are stale.
struct Cycle {
    epoch: u64,
    /// Child of the controller token; cancelled when the cycle ends.
    cancel: CancellationToken,
}

impl Controller {
    /// Create a controller. Builds the initial transport from `factory`
    /// but does NOT connect.
    pub fn new(
        config: ControllerConfig,
        registry: InterestRegistry,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, CoreError> {
        if config.stream_interval.is_zero() {
            return Err(CoreError::Config {
                message: "stream interval must be greater than zero".into(),
            });
        }
        let transport = factory.create(&config.connection)?;
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let cycle = Cycle {
            epoch: 0,
            cancel: cancel.child_token(),
        };
        let units = Observable::new(config.units);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config: ArcSwap::from_pointee(config),
                registry,
                factory,
                transport: ArcSwap::from_pointee(transport),
                store: Arc::new(DataStore::new()),
                units,
                connection_state,
                cancel,
                cycle: std::sync::Mutex::new(cycle),
                lifecycle: Mutex::new(()),
                session: Mutex::new(StreamingSession::default()),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Current configuration (snapshot).
    pub fn config(&self) -> Arc<ControllerConfig> {
        self.inner.config.load_full()
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// The interest registry this controller follows.
    pub fn registry(&self) -> &InterestRegistry {
        &self.inner.registry
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect and handshake, then start streaming the current demand.
    ///
    /// Ignored unless the controller is `Disconnected` or `Failed`.
    /// Cancelled by an overlapping [`disconnect()`](Self::disconnect).
    pub async fn connect(&self) {
        if !self.state_snapshot().can_connect() {
            debug!(state = %self.state_snapshot(), "connect ignored");
            return;
        }
        let _lifecycle = self.inner.lifecycle.lock().await;

        let Some((epoch, cancel)) = self.inner.begin_cycle() else {
            debug!(state = %self.state_snapshot(), "connect ignored");
            return;
        };

        let config = self.config();
        let transport = self.inner.transport();
        info!(adapter = %config.connection, protocol = %config.protocol, "connecting");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = transport.connect(
                config.protocol,
                config.connect_timeout,
                config.query_catalog,
            ) => Some(result),
        };
        let Some(result) = result else {
            debug!(epoch, "connect cancelled");
            return;
        };

        match result {
            Ok(handshake) => {
                {
                    let cycle = self.inner.lock_cycle();
                    if cycle.epoch != epoch {
                        debug!(epoch, "handshake finished after disconnect, discarding");
                        return;
                    }
                    info!(
                        adapter = %handshake.identity.adapter,
                        protocol = %handshake.identity.protocol,
                        supported = handshake.supported.len(),
                        "connected"
                    );
                    self.inner
                        .store
                        .supported
                        .set(Arc::new(handshake.supported));
                    self.inner.store.identity.set(Some(handshake.identity));
                    self.inner
                        .connection_state
                        .send_replace(ConnectionState::Connected);
                }

                self.spawn_supervisors(epoch, &cancel, &transport).await;
                self.reconcile(false).await;
            }
            Err(e) => {
                let err = CoreError::from(e);
                let cycle = self.inner.lock_cycle();
                if cycle.epoch != epoch {
                    return;
                }
                warn!(error = %err, "connect failed");
                cycle.cancel.cancel();
                transport.stop();
                self.inner.store.clear_session_data();
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Failed {
                        reason: err.to_string(),
                    });
            }
        }
    }

    /// Tear everything down and go to `Disconnected`. Idempotent.
    pub async fn disconnect(&self) {
        let epoch = self.inner.end_cycle();
        self.teardown(epoch, ConnectionState::Disconnected).await;
        debug!("disconnected");
    }

    /// Replace the connection details and build a fresh transport for
    /// them. The old connection is fully torn down first; the controller
    /// stays `Disconnected` afterwards.
    ///
    /// Teardown and swap happen under one `lifecycle` guard, so no
    /// connect attempt can reach the old transport in between.
    pub async fn update_connection_details(
        &self,
        details: ConnectionDetails,
    ) -> Result<(), CoreError> {
        let transport = self.inner.factory.create(&details)?;

        // Abort an in-flight handshake so it releases `lifecycle`.
        self.inner.end_cycle();
        let lifecycle = self.inner.lifecycle.lock().await;
        let epoch = self.inner.end_cycle();
        self.teardown_locked(&lifecycle, epoch, ConnectionState::Disconnected)
            .await;

        self.inner.transport.store(Arc::new(transport));
        let mut config = ControllerConfig::clone(&self.inner.config.load());
        info!(from = %config.connection, to = %details, "connection details updated");
        config.connection = details;
        self.inner.config.store(Arc::new(config));
        Ok(())
    }

    /// Switch unit systems. While connected this resets every statistic
    /// and re-requests the stream even if the command set is unchanged.
    pub async fn set_unit_system(&self, units: UnitSystem) {
        if !self.inner.units.set(units) {
            debug!(%units, "unit system unchanged");
            return;
        }
        info!(%units, "unit system changed");
        self.reconcile(true).await;
    }

    pub fn unit_system(&self) -> UnitSystem {
        self.inner.units.get()
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn stats(&self) -> ValueStream<Arc<HashMap<Command, SampleStats>>> {
        self.inner.store.subscribe_stats()
    }

    pub fn stats_for(&self, command: &Command) -> Option<SampleStats> {
        self.inner.store.stats_for(command)
    }

    pub fn trouble_codes(&self) -> ValueStream<TroubleCodeState> {
        self.inner.store.subscribe_trouble_codes()
    }

    pub fn fuel_status(&self) -> ValueStream<Option<FuelSystemStatus>> {
        self.inner.store.subscribe_fuel_status()
    }

    pub fn summary_status(&self) -> ValueStream<Option<MonitorStatus>> {
        self.inner.store.subscribe_summary_status()
    }

    /// Commands the vehicle reported at the last handshake.
    pub fn supported_commands(&self) -> ValueStream<Arc<HashSet<Command>>> {
        self.inner.store.subscribe_supported()
    }

    pub fn adapter_identity(&self) -> ValueStream<Option<AdapterIdentity>> {
        self.inner.store.subscribe_identity()
    }

    /// Commands currently being polled.
    pub fn active_commands(&self) -> ValueStream<Arc<HashSet<Command>>> {
        self.inner.store.subscribe_active()
    }

    fn state_snapshot(&self) -> ConnectionState {
        self.inner.connection_state.borrow().clone()
    }

    // ── Session management ───────────────────────────────────────

    /// Bring the streaming session in line with demand.
    ///
    /// Restarts only when the effective set differs from the active one,
    /// unless `force` is set. A forced restart also resets every statistic
    /// once the old session has stopped.
    async fn reconcile(&self, force: bool) {
        let (epoch, cancel) = self.inner.current_cycle();
        let mut session = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            guard = self.inner.session.lock() => guard,
        };
        if force {
            session.stop().await;
            self.inner.store.stats.reset_all();
        }
        let connected = self.inner.connection_state.borrow().is_connected();
        if cancel.is_cancelled() || !connected {
            return;
        }

        let interest = self.inner.registry.union();
        let supported = self.inner.store.supported_snapshot();
        let effective = effective_commands(&interest, &supported);

        if !force && effective == *session.active() {
            debug!(commands = effective.len(), "effective set unchanged, keeping session");
            return;
        }

        session.stop().await;

        if effective.is_empty() {
            self.inner.store.active.set(Arc::default());
            info!("no demand, streaming idle");
            return;
        }

        let config = self.config();
        let units = self.inner.units.get();
        let stream = self.inner.transport().start_stream(
            effective.clone(),
            units,
            config.stream_interval,
        );

        let ctrl = self.clone();
        session.start(
            effective.clone(),
            stream,
            Arc::clone(&self.inner.store),
            &cancel,
            move |e| {
                tokio::spawn(async move { ctrl.fail(epoch, CoreError::from(e)).await });
            },
        );
        info!(commands = effective.len(), %units, force, "streaming session started");
        self.inner.store.active.set(Arc::new(effective));
    }

    /// Background watchers tied to the current cycle.
    async fn spawn_supervisors(
        &self,
        epoch: u64,
        cancel: &CancellationToken,
        transport: &Arc<dyn Transport>,
    ) {
        let mut handles = self.inner.task_handles.lock().await;

        {
            let ctrl = self.clone();
            let union = self.inner.registry.union_receiver();
            handles.push(tokio::spawn(interest_task(ctrl, union, cancel.clone())));
        }

        {
            let ctrl = self.clone();
            let phase = transport.phase();
            handles.push(tokio::spawn(phase_task(ctrl, epoch, phase, cancel.clone())));
        }
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Fail the cycle `epoch` with `err`. Stale epochs are ignored.
    async fn fail(&self, epoch: u64, err: CoreError) {
        {
            let mut cycle = self.inner.lock_cycle();
            if cycle.epoch != epoch {
                debug!(epoch, current = cycle.epoch, error = %err, "stale fault ignored");
                return;
            }
            cycle.epoch += 1;
            cycle.cancel.cancel();
        }
        warn!(error = %err, "connection failed");
        self.teardown(
            epoch + 1,
            ConnectionState::Failed {
                reason: err.to_string(),
            },
        )
        .await;
    }

    /// Stop tasks, session and transport, clear session data, publish
    /// `final_state`. Skipped if a newer cycle started in the meantime.
    async fn teardown(&self, epoch: u64, final_state: ConnectionState) {
        let lifecycle = self.inner.lifecycle.lock().await;
        self.teardown_locked(&lifecycle, epoch, final_state).await;
    }

    async fn teardown_locked(
        &self,
        _lifecycle: &AsyncMutexGuard<'_, ()>,
        epoch: u64,
        final_state: ConnectionState,
    ) {
        if self.inner.lock_cycle().epoch != epoch {
            debug!(epoch, "teardown superseded by a newer connection");
            return;
        }

        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.session.lock().await.stop().await;
        self.inner.transport().stop();
        self.inner.store.clear_session_data();
        self.inner.connection_state.send_replace(final_state);
    }

    // ── Link regressions ─────────────────────────────────────────

    /// The transport fell back to connecting: go to `Connecting` and stop
    /// polling. Statistics and the supported set are kept.
    async fn suspend(&self, epoch: u64, phase: &TransportPhase) {
        let mut session = self.inner.session.lock().await;
        {
            let cycle = self.inner.lock_cycle();
            if cycle.epoch != epoch {
                return;
            }
            let suspended = self.inner.connection_state.send_if_modified(|state| {
                if state.is_connected() {
                    *state = ConnectionState::Connecting;
                    true
                } else {
                    false
                }
            });
            if !suspended {
                return;
            }
        }
        warn!(?phase, "vehicle link lost, streaming paused");
        session.stop().await;
        self.inner.store.active.set(Arc::default());
    }

    /// The transport is back on the vehicle: go to `Connected` and
    /// restart streaming for the current demand.
    async fn resume(&self, epoch: u64) {
        let resumed = {
            let cycle = self.inner.lock_cycle();
            cycle.epoch == epoch
                && self.inner.connection_state.send_if_modified(|state| {
                    if *state == ConnectionState::Connecting {
                        *state = ConnectionState::Connected;
                        true
                    } else {
                        false
                    }
                })
        };
        if resumed {
            info!("vehicle link restored");
            self.reconcile(false).await;
        }
    }
}

impl ControllerInner {
    fn lock_cycle(&self) -> MutexGuard<'_, Cycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        let guard = self.transport.load();
        Arc::clone(&**guard)
    }

    /// Move to `Connecting` and open a new cycle, or `None` if a
    /// connection is already in progress or established.
    fn begin_cycle(&self) -> Option<(u64, CancellationToken)> {
        let mut cycle = self.lock_cycle();
        let accepted = self.connection_state.send_if_modified(|state| {
            if state.can_connect() {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !accepted {
            return None;
        }
        cycle.epoch += 1;
        cycle.cancel = self.cancel.child_token();
        Some((cycle.epoch, cycle.cancel.clone()))
    }

    /// Close the current cycle. Returns the new epoch.
    fn end_cycle(&self) -> u64 {
        let mut cycle = self.lock_cycle();
        cycle.epoch += 1;
        cycle.cancel.cancel();
        cycle.epoch
    }

    fn current_cycle(&self) -> (u64, CancellationToken) {
        let cycle = self.lock_cycle();
        (cycle.epoch, cycle.cancel.clone())
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Re-evaluate the session whenever the interest union changes.
async fn interest_task(
    controller: Controller,
    mut union: watch::Receiver<Arc<HashSet<Command>>>,
    cancel: CancellationToken,
) {
    union.borrow_and_update();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = union.changed() => {
                if changed.is_err() {
                    break;
                }
                union.borrow_and_update();
                controller.reconcile(false).await;
            }
        }
    }
}

/// Map transport phases after the handshake. Falling back to a connecting
/// phase pauses streaming until the vehicle answers again; errors and
/// unexpected disconnects fail the cycle.
async fn phase_task(
    controller: Controller,
    epoch: u64,
    mut phase: watch::Receiver<TransportPhase>,
    cancel: CancellationToken,
) {
    loop {
        let current = phase.borrow_and_update().clone();
        match ConnectionState::from(&current) {
            ConnectionState::Connected => controller.resume(epoch).await,
            ConnectionState::Connecting => controller.suspend(epoch, &current).await,
            ConnectionState::Disconnected | ConnectionState::Failed { .. } => {
                let err = match current {
                    TransportPhase::Error(message) => CoreError::StreamInterrupted { message },
                    _ => CoreError::ConnectionLost,
                };
                // Detached: teardown joins this task.
                let ctrl = controller.clone();
                tokio::spawn(async move { ctrl.fail(epoch, err).await });
                break;
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
