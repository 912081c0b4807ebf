#![allow(clippy::unwrap_used, clippy::expect_used)]
// Integration tests for `Controller` driven by the simulated transport.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use obdstream_api::{
    SimulatedTransport, SimulatorProfile, Transport, TransportFactory, TransportPhase,
};
use obdstream_core::{
    Command, ConnectionDetails, ConnectionState, Controller, ControllerConfig, CoreError,
    InterestRegistry, TransportKind, TroubleCode, TroubleCodeState, Unit, UnitSystem,
    ValueStream,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(30);

/// Hands out clones of one simulator so the test can inspect it.
struct SharedSim(SimulatedTransport);

impl TransportFactory for SharedSim {
    fn create(&self, _: &ConnectionDetails) -> Result<Arc<dyn Transport>, obdstream_api::Error> {
        Ok(Arc::new(self.0.clone()))
    }
}

/// Builds a fresh simulator per call and remembers every one of them.
#[derive(Default)]
struct RecordingFactory {
    created: Mutex<Vec<(ConnectionDetails, SimulatedTransport)>>,
}

impl RecordingFactory {
    fn created(&self) -> Vec<(ConnectionDetails, SimulatedTransport)> {
        self.created.lock().unwrap().clone()
    }
}

impl TransportFactory for RecordingFactory {
    fn create(
        &self,
        details: &ConnectionDetails,
    ) -> Result<Arc<dyn Transport>, obdstream_api::Error> {
        if details.kind != TransportKind::Simulated {
            return Err(obdstream_api::Error::UnsupportedTransport(details.kind));
        }
        let sim = SimulatedTransport::default();
        self.created
            .lock()
            .unwrap()
            .push((details.clone(), sim.clone()));
        Ok(Arc::new(sim))
    }
}

fn setup(profile: SimulatorProfile) -> (Controller, InterestRegistry, SimulatedTransport) {
    let sim = SimulatedTransport::new(profile);
    let registry = InterestRegistry::new();
    let controller = Controller::new(
        ControllerConfig::default(),
        registry.clone(),
        Arc::new(SharedSim(sim.clone())),
    )
    .unwrap();
    (controller, registry, sim)
}

fn supporting(commands: &[Command]) -> SimulatorProfile {
    SimulatorProfile {
        supported: commands.iter().copied().collect(),
        ..SimulatorProfile::default()
    }
}

fn set(commands: &[Command]) -> HashSet<Command> {
    commands.iter().copied().collect()
}

async fn wait_for_state(
    controller: &Controller,
    pred: impl Fn(&ConnectionState) -> bool,
) -> ConnectionState {
    let mut rx = controller.connection_state();
    let state = tokio::time::timeout(WAIT, rx.wait_for(&pred))
        .await
        .expect("timed out waiting for connection state")
        .expect("controller dropped");
    state.clone()
}

async fn wait_until<T>(stream: &mut ValueStream<T>, pred: impl Fn(&T) -> bool) -> T
where
    T: Clone + Send + Sync + 'static,
{
    tokio::time::timeout(WAIT, async {
        let latest = stream.latest();
        if pred(&latest) {
            return latest;
        }
        loop {
            let value = stream.changed().await.expect("publisher dropped");
            if pred(&value) {
                return value;
            }
        }
    })
    .await
    .expect("timed out waiting for value")
}

/// Let background tasks run for a while of virtual time.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_connect_streams_only_supported_gauges() {
    let (controller, registry, sim) = setup(supporting(&[Command::ENGINE_RPM]));
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM, Command::VEHICLE_SPEED]);

    controller.connect().await;

    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Connected
    );
    let mut active = controller.active_commands();
    let active = wait_until(&mut active, |a| !a.is_empty()).await;
    assert_eq!(*active, set(&[Command::ENGINE_RPM]));
    assert_eq!(sim.requested_sets(), vec![set(&[Command::ENGINE_RPM])]);

    let mut stats = controller.stats();
    let stats = wait_until(&mut stats, |s| s.contains_key(&Command::ENGINE_RPM)).await;
    assert!(!stats.contains_key(&Command::VEHICLE_SPEED));
}

#[tokio::test(start_paused = true)]
async fn test_connect_captures_supported_set_and_identity() {
    let (controller, _registry, _sim) =
        setup(supporting(&[Command::ENGINE_RPM, Command::FUEL_LEVEL]));

    controller.connect().await;

    assert_eq!(
        *controller.supported_commands().latest(),
        set(&[Command::ENGINE_RPM, Command::FUEL_LEVEL])
    );
    let identity = controller.adapter_identity().latest().unwrap();
    assert!(identity.adapter.starts_with("obdstream simulator"));
}

#[tokio::test(start_paused = true)]
async fn test_double_connect_yields_one_session() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);

    let mut states = controller.connection_state();
    tokio::join!(controller.connect(), controller.connect());
    settle().await;

    assert_eq!(sim.connect_calls(), 1);
    assert_eq!(sim.stream_starts(), 1);
    assert_eq!(sim.open_streams(), 1);
    assert_eq!(sim.peak_open_streams(), 1);
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

    // A third call while connected is ignored as well.
    controller.connect().await;
    assert_eq!(sim.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_is_captured_as_state() {
    let (controller, _registry, sim) = setup(SimulatorProfile {
        fail_connect: Some("adapter refused".into()),
        ..SimulatorProfile::default()
    });

    controller.connect().await;

    let state = controller.connection_state().borrow().clone();
    assert_eq!(
        state,
        ConnectionState::Failed {
            reason: "Cannot reach adapter at obdstream simulator v1.0: adapter refused".into()
        }
    );
    assert!(controller.supported_commands().latest().is_empty());
    assert!(controller.adapter_identity().latest().is_none());

    // Failed is retryable.
    sim.update_profile(|p| p.fail_connect = None);
    controller.connect().await;
    assert!(controller.connection_state().borrow().is_connected());
    assert_eq!(sim.connect_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_compare_equal() {
    let (controller, _registry, _sim) = setup(SimulatorProfile {
        fail_connect: Some("no adapter".into()),
        ..SimulatorProfile::default()
    });

    controller.connect().await;
    let first = controller.connection_state().borrow().clone();

    let mut rx = controller.connection_state();
    rx.borrow_and_update();
    controller.connect().await;

    assert_eq!(*rx.borrow(), first);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_inflight_connect() {
    let (controller, registry, sim) = setup(SimulatorProfile {
        connect_delay: Duration::from_secs(5),
        ..SimulatorProfile::default()
    });
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);

    let connecting = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.connect().await })
    };
    wait_for_state(&controller, |s| *s == ConnectionState::Connecting).await;

    controller.disconnect().await;
    connecting.await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Disconnected
    );
    assert_eq!(sim.stream_starts(), 0);
    assert!(controller.supported_commands().latest().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_everything() {
    let (controller, registry, sim) = setup(SimulatorProfile {
        trouble_codes: vec![TroubleCode::new("P0301")],
        ..SimulatorProfile::default()
    });
    let token = registry.make_token();
    registry.replace(
        token,
        [
            Command::ENGINE_RPM,
            Command::STORED_TROUBLE_CODES,
            Command::FUEL_SYSTEM_STATUS,
            Command::MONITOR_STATUS,
        ],
    );

    controller.connect().await;
    let mut stats = controller.stats();
    wait_until(&mut stats, |s| {
        s.get(&Command::ENGINE_RPM)
            .is_some_and(|st| st.sample_count >= 3)
    })
    .await;
    let mut codes = controller.trouble_codes();
    wait_until(&mut codes, TroubleCodeState::is_known).await;
    assert!(controller.fuel_status().latest().is_some());
    assert!(controller.summary_status().latest().is_some());

    controller.disconnect().await;

    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Disconnected
    );
    assert!(controller.stats().latest().is_empty());
    assert_eq!(controller.trouble_codes().latest(), TroubleCodeState::Unknown);
    assert!(controller.fuel_status().latest().is_none());
    assert!(controller.summary_status().latest().is_none());
    assert!(controller.adapter_identity().latest().is_none());
    assert!(controller.supported_commands().latest().is_empty());
    assert!(controller.active_commands().latest().is_empty());
    assert_eq!(sim.open_streams(), 0);

    // Idempotent.
    controller.disconnect().await;

    // Reconnect starts from a clean slate.
    controller.connect().await;
    let mut stats = controller.stats();
    let fresh = wait_until(&mut stats, |s| s.contains_key(&Command::ENGINE_RPM)).await;
    assert_eq!(fresh[&Command::ENGINE_RPM].sample_count, 1);
}

// ── Session restarts ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_restart_only_when_effective_set_changes() {
    let (controller, registry, sim) =
        setup(supporting(&[Command::ENGINE_RPM, Command::COOLANT_TEMP]));
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    controller.connect().await;
    settle().await;
    assert_eq!(sim.stream_starts(), 1);

    // Unsupported gauge: union changes, effective set does not.
    registry.add(token, [Command::VEHICLE_SPEED]);
    settle().await;
    assert_eq!(sim.stream_starts(), 1);

    // Second consumer re-requesting the same command changes nothing.
    let other = registry.make_token();
    registry.replace(other, [Command::ENGINE_RPM]);
    settle().await;
    assert_eq!(sim.stream_starts(), 1);

    registry.add(other, [Command::COOLANT_TEMP]);
    let mut active = controller.active_commands();
    let active = wait_until(&mut active, |a| a.contains(&Command::COOLANT_TEMP)).await;
    assert_eq!(*active, set(&[Command::ENGINE_RPM, Command::COOLANT_TEMP]));
    assert_eq!(sim.stream_starts(), 2);
    assert_eq!(sim.peak_open_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shared_interest_keeps_session_alive() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    let a = registry.make_token();
    let b = registry.make_token();
    registry.replace(a, [Command::ENGINE_RPM, Command::VEHICLE_SPEED]);
    registry.replace(b, [Command::VEHICLE_SPEED, Command::COOLANT_TEMP]);
    controller.connect().await;
    settle().await;

    registry.clear(a);
    let mut active = controller.active_commands();
    let active = wait_until(&mut active, |a| !a.contains(&Command::ENGINE_RPM)).await;
    assert_eq!(
        *active,
        set(&[Command::VEHICLE_SPEED, Command::COOLANT_TEMP])
    );
    assert_eq!(
        sim.requested_sets().last().unwrap(),
        &set(&[Command::VEHICLE_SPEED, Command::COOLANT_TEMP])
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_demand_idles_without_empty_request() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    controller.connect().await;
    settle().await;
    assert_eq!(sim.stream_starts(), 0);

    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    let mut active = controller.active_commands();
    wait_until(&mut active, |a| !a.is_empty()).await;

    registry.clear(token);
    wait_until(&mut active, |a| a.is_empty()).await;
    settle().await;

    assert_eq!(sim.open_streams(), 0);
    assert!(sim.requested_sets().iter().all(|s| !s.is_empty()));
    assert!(controller.connection_state().borrow().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_unit_change_resets_stats_and_restarts_once() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM, Command::VEHICLE_SPEED]);
    controller.connect().await;

    let mut stats = controller.stats();
    wait_until(&mut stats, |s| {
        s.len() == 2 && s.values().all(|st| st.sample_count >= 3)
    })
    .await;
    let starts = sim.stream_starts();

    controller.set_unit_system(UnitSystem::Imperial).await;

    let snapshot = controller.stats().latest();
    assert_eq!(snapshot.len(), 2);
    for entry in snapshot.values() {
        assert_eq!(entry.sample_count, 1);
        assert!((entry.min - entry.latest.value).abs() < f64::EPSILON);
        assert!((entry.max - entry.latest.value).abs() < f64::EPSILON);
    }
    assert_eq!(sim.stream_starts(), starts + 1);
    assert_eq!(sim.last_requested_units(), Some(UnitSystem::Imperial));
    assert_eq!(controller.unit_system(), UnitSystem::Imperial);

    // Same unit system again: nothing happens.
    controller.set_unit_system(UnitSystem::Imperial).await;
    settle().await;
    assert_eq!(sim.stream_starts(), starts + 1);
    assert_eq!(sim.peak_open_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unit_change_while_disconnected_only_records() {
    let (controller, _registry, sim) = setup(SimulatorProfile::default());
    controller.set_unit_system(UnitSystem::Imperial).await;
    assert_eq!(controller.unit_system(), UnitSystem::Imperial);
    assert_eq!(sim.stream_starts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unit_change_never_folds_old_unit_samples() {
    let sim = SimulatedTransport::new(SimulatorProfile {
        connect_delay: Duration::from_millis(1),
        ..SimulatorProfile::default()
    });
    let registry = InterestRegistry::new();
    let controller = Controller::new(
        ControllerConfig {
            stream_interval: Duration::from_millis(1),
            ..ControllerConfig::default()
        },
        registry.clone(),
        Arc::new(SharedSim(sim.clone())),
    )
    .unwrap();
    let token = registry.make_token();
    registry.replace(token, [Command::VEHICLE_SPEED]);
    controller.connect().await;
    let mut stats = controller.stats();
    wait_until(&mut stats, |s| s.contains_key(&Command::VEHICLE_SPEED)).await;

    let switches = [
        (UnitSystem::Imperial, Unit::MilesPerHour),
        (UnitSystem::Metric, Unit::KilometersPerHour),
    ];
    for (units, unit) in switches.into_iter().cycle().take(20) {
        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.set_unit_system(units).await;
        // Anything folded in after the reset must come from the new stream.
        let speed = controller.stats_for(&Command::VEHICLE_SPEED).unwrap();
        assert!(
            speed.sample_count == 1 || speed.latest.unit == unit,
            "{units}: {speed:?}"
        );
    }

    controller.disconnect().await;
    assert_eq!(sim.open_streams(), 0);
}

// ── Batch ingestion ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stats_track_extrema_and_count() {
    let (controller, registry, _sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    controller.connect().await;

    let mut stats = controller.stats();
    let snapshot = wait_until(&mut stats, |s| {
        s.get(&Command::ENGINE_RPM)
            .is_some_and(|st| st.sample_count >= 10)
    })
    .await;
    let rpm = &snapshot[&Command::ENGINE_RPM];
    assert!(rpm.min <= rpm.latest.value);
    assert!(rpm.latest.value <= rpm.max);
    assert!(rpm.min < rpm.max);
    assert!(controller.stats_for(&Command::ENGINE_RPM).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_trouble_codes_become_received_empty() {
    let (controller, registry, _sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::STORED_TROUBLE_CODES]);

    let mut codes = controller.trouble_codes();
    assert_eq!(*codes.current(), TroubleCodeState::Unknown);

    controller.connect().await;
    let state = wait_until(&mut codes, TroubleCodeState::is_known).await;
    assert_eq!(state.codes(), Some(&[][..]));

    // Stays received on later batches.
    settle().await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(controller.trouble_codes().latest().is_known());
}

// ── Faults ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_transport_fault_fails_and_clears() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    controller.connect().await;
    let mut stats = controller.stats();
    wait_until(&mut stats, |s| !s.is_empty()).await;

    sim.inject_fault("bus error");

    let state = wait_for_state(&controller, ConnectionState::is_terminal).await;
    assert_eq!(
        state,
        ConnectionState::Failed {
            reason: "Telemetry stream interrupted: bus error".into()
        }
    );
    assert!(controller.stats().latest().is_empty());
    assert!(controller.adapter_identity().latest().is_none());
    assert_eq!(sim.open_streams(), 0);

    // A later reconnect is unaffected by the old cycle's fault.
    controller.connect().await;
    settle().await;
    assert!(controller.connection_state().borrow().is_connected());
    assert_eq!(sim.open_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_phase_error_fails_without_a_session() {
    let (controller, _registry, sim) = setup(SimulatorProfile::default());
    controller.connect().await;
    settle().await;
    assert_eq!(sim.stream_starts(), 0);

    sim.inject_fault("bus off");

    let state = wait_for_state(&controller, ConnectionState::is_terminal).await;
    assert_eq!(
        state,
        ConnectionState::Failed {
            reason: "Telemetry stream interrupted: bus off".into()
        }
    );
    assert!(controller.supported_commands().latest().is_empty());
    assert_eq!(sim.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_adapter_dropping_out_is_connection_lost() {
    let (controller, _registry, sim) = setup(SimulatorProfile::default());
    controller.connect().await;
    settle().await;

    sim.stop();

    let state = wait_for_state(&controller, ConnectionState::is_terminal).await;
    assert_eq!(
        state,
        ConnectionState::Failed {
            reason: "Adapter connection lost".into()
        }
    );
    assert!(controller.adapter_identity().latest().is_none());
}

// ── Link regressions ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_link_regression_pauses_and_resumes_streaming() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    controller.connect().await;
    let mut active = controller.active_commands();
    wait_until(&mut active, |a| !a.is_empty()).await;
    let mut stats = controller.stats();
    wait_until(&mut stats, |s| !s.is_empty()).await;

    sim.report_phase(TransportPhase::ConnectingToVehicle);

    wait_for_state(&controller, |s| *s == ConnectionState::Connecting).await;
    wait_until(&mut active, |a| a.is_empty()).await;
    assert_eq!(sim.open_streams(), 0);
    assert!(!controller.stats().latest().is_empty());
    assert!(!controller.supported_commands().latest().is_empty());

    // Demand changes while paused start nothing.
    registry.add(token, [Command::COOLANT_TEMP]);
    settle().await;
    assert_eq!(sim.stream_starts(), 1);

    // Connect is ignored while the link recovers.
    controller.connect().await;
    assert_eq!(sim.connect_calls(), 1);

    sim.report_phase(TransportPhase::ConnectedToVehicle);

    wait_for_state(&controller, ConnectionState::is_connected).await;
    let active = wait_until(&mut active, |a| !a.is_empty()).await;
    assert_eq!(*active, set(&[Command::ENGINE_RPM, Command::COOLANT_TEMP]));
    assert_eq!(sim.stream_starts(), 2);
    assert_eq!(sim.peak_open_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_link_is_down() {
    let (controller, registry, sim) = setup(SimulatorProfile::default());
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    controller.connect().await;
    settle().await;

    sim.report_phase(TransportPhase::ConnectedToAdapter);
    wait_for_state(&controller, |s| *s == ConnectionState::Connecting).await;

    controller.disconnect().await;

    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Disconnected
    );
    assert!(controller.stats().latest().is_empty());
    assert_eq!(sim.open_streams(), 0);
}

// ── Reconfiguration ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_update_connection_details_swaps_transport() {
    let factory = Arc::new(RecordingFactory::default());
    let registry = InterestRegistry::new();
    let controller = Controller::new(
        ControllerConfig::default(),
        registry.clone(),
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
    )
    .unwrap();
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);
    controller.connect().await;
    settle().await;

    let details = ConnectionDetails {
        host: "10.0.0.5".into(),
        port: 35001,
        ..ConnectionDetails::default()
    };
    controller
        .update_connection_details(details.clone())
        .await
        .unwrap();

    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Disconnected
    );
    assert_eq!(controller.config().connection, details);

    let created = factory.created();
    assert_eq!(created.len(), 2);
    let (_, old) = &created[0];
    let (new_details, new) = &created[1];
    assert_eq!(new_details, &details);
    assert_eq!(old.open_streams(), 0);
    assert!(old.stop_calls() >= 1);

    controller.connect().await;
    settle().await;
    assert_eq!(old.connect_calls(), 1);
    assert_eq!(new.connect_calls(), 1);
    assert_eq!(new.open_streams(), 1);

    // The retired transport can no longer affect the controller.
    old.inject_fault("stale adapter");
    settle().await;
    assert!(controller.connection_state().borrow().is_connected());
    assert_eq!(new.open_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_update_connection_details_aborts_inflight_connect() {
    let factory = Arc::new(RecordingFactory::default());
    let registry = InterestRegistry::new();
    let controller = Controller::new(
        ControllerConfig::default(),
        registry.clone(),
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
    )
    .unwrap();
    let token = registry.make_token();
    registry.replace(token, [Command::ENGINE_RPM]);

    let connecting = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.connect().await })
    };
    wait_for_state(&controller, |s| *s == ConnectionState::Connecting).await;

    let details = ConnectionDetails {
        port: 35002,
        ..ConnectionDetails::default()
    };
    controller
        .update_connection_details(details.clone())
        .await
        .unwrap();
    connecting.await.unwrap();
    settle().await;

    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Disconnected
    );
    let created = factory.created();
    let (_, old) = &created[0];
    let (_, new) = &created[1];
    assert_eq!(old.stream_starts(), 0);
    assert!(old.stop_calls() >= 1);
    assert_eq!(new.connect_calls(), 0);
    assert_eq!(new.stream_starts(), 0);

    controller.connect().await;
    settle().await;
    assert_eq!(old.connect_calls(), 1);
    assert_eq!(new.connect_calls(), 1);
    assert_eq!(new.open_streams(), 1);
    assert_eq!(controller.config().connection, details);
}

#[tokio::test(start_paused = true)]
async fn test_update_connection_details_rejects_unsupported_kind() {
    let factory = Arc::new(RecordingFactory::default());
    let controller = Controller::new(
        ControllerConfig::default(),
        InterestRegistry::new(),
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
    )
    .unwrap();
    controller.connect().await;

    let result = controller
        .update_connection_details(ConnectionDetails {
            kind: TransportKind::Bluetooth,
            ..ConnectionDetails::default()
        })
        .await;

    assert!(matches!(
        result,
        Err(CoreError::UnsupportedTransport {
            kind: TransportKind::Bluetooth
        })
    ));
    // Nothing was torn down.
    assert!(controller.connection_state().borrow().is_connected());
    assert_eq!(factory.created().len(), 1);
}
