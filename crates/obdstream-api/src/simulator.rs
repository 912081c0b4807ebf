// ── In-process vehicle simulator ──
//
// A `Transport` that fabricates decoded batches instead of speaking to
// an adapter. Drives the CLI demo mode and every controller test, so it
// also keeps counters about how it was used.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::command::{Command, CommandCategory};
use crate::decode::{
    Batch, DecodeResult, FuelLoopStatus, FuelSystemStatus, Measurement, MonitorReadiness,
    MonitorStatus, TroubleCode, Unit, UnitSystem,
};
use crate::error::Error;
use crate::transport::{
    AdapterIdentity, BatchStream, ConnectionDetails, Handshake, Protocol, Transport,
    TransportFactory, TransportKind, TransportPhase,
};

/// Shortest tick a simulated stream runs at.
const MIN_TICK: Duration = Duration::from_millis(1);

/// What the simulated vehicle looks like.
#[derive(Debug, Clone)]
pub struct SimulatorProfile {
    /// Commands reported by the catalog query.
    pub supported: HashSet<Command>,
    pub identity: AdapterIdentity,
    /// Stored trouble codes. When empty the trouble-code request gets no
    /// answer at all.
    pub trouble_codes: Vec<TroubleCode>,
    /// Time the handshake takes.
    pub connect_delay: Duration,
    /// When set, every connect attempt fails with this reason.
    pub fail_connect: Option<String>,
}

impl Default for SimulatorProfile {
    fn default() -> Self {
        Self {
            supported: Command::catalog().iter().map(|e| e.command).collect(),
            identity: AdapterIdentity {
                adapter: "obdstream simulator v1.0".into(),
                protocol: Protocol::Auto,
                vin: Some("1OBDS7REAM0000001".into()),
            },
            trouble_codes: Vec::new(),
            connect_delay: Duration::from_millis(50),
            fail_connect: None,
        }
    }
}

/// Simulated adapter + vehicle.
///
/// Cheaply cloneable; clones share state so a test can keep one handle
/// while the controller owns another.
#[derive(Clone)]
pub struct SimulatedTransport {
    state: Arc<SimState>,
}

struct SimState {
    profile: Mutex<SimulatorProfile>,
    phase: watch::Sender<TransportPhase>,
    connected: AtomicBool,
    fault: Mutex<Option<String>>,
    tick: AtomicU64,
    connect_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    stream_starts: AtomicUsize,
    open_streams: AtomicUsize,
    peak_open_streams: AtomicUsize,
    requests: Mutex<Vec<(HashSet<Command>, UnitSystem)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedTransport {
    pub fn new(profile: SimulatorProfile) -> Self {
        let (phase, _) = watch::channel(TransportPhase::Disconnected);
        Self {
            state: Arc::new(SimState {
                profile: Mutex::new(profile),
                phase,
                connected: AtomicBool::new(false),
                fault: Mutex::new(None),
                tick: AtomicU64::new(0),
                connect_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
                stream_starts: AtomicUsize::new(0),
                open_streams: AtomicUsize::new(0),
                peak_open_streams: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current profile (copy).
    pub fn profile(&self) -> SimulatorProfile {
        lock(&self.state.profile).clone()
    }

    /// Mutate the profile; affects the next connect or batch.
    pub fn update_profile(&self, f: impl FnOnce(&mut SimulatorProfile)) {
        f(&mut lock(&self.state.profile));
    }

    /// Break the live connection: open streams yield an error and the
    /// phase publisher reports `Error(reason)`.
    pub fn inject_fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(%reason, "simulator: injecting fault");
        *lock(&self.state.fault) = Some(reason.clone());
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.phase.send_replace(TransportPhase::Error(reason));
    }

    /// Publish a link phase without touching the connection or any open
    /// stream. Replays an adapter that loses and regains the vehicle bus.
    pub fn report_phase(&self, phase: TransportPhase) {
        debug!(?phase, "simulator: reporting phase");
        self.set_phase(phase);
    }

    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.state.stop_calls.load(Ordering::SeqCst)
    }

    /// Number of `start_stream` requests issued so far.
    pub fn stream_starts(&self) -> usize {
        self.state.stream_starts.load(Ordering::SeqCst)
    }

    /// Streams currently alive (not yet dropped).
    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    /// Highest number of streams ever alive at the same time.
    pub fn peak_open_streams(&self) -> usize {
        self.state.peak_open_streams.load(Ordering::SeqCst)
    }

    /// Every command set requested, oldest first.
    pub fn requested_sets(&self) -> Vec<HashSet<Command>> {
        lock(&self.state.requests)
            .iter()
            .map(|(commands, _)| commands.clone())
            .collect()
    }

    /// Unit system of the most recent request.
    pub fn last_requested_units(&self) -> Option<UnitSystem> {
        lock(&self.state.requests).last().map(|(_, units)| *units)
    }

    fn set_phase(&self, phase: TransportPhase) {
        trace!(?phase, "simulator phase");
        self.state.phase.send_replace(phase);
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(SimulatorProfile::default())
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(
        &self,
        protocol: Protocol,
        timeout: Duration,
        query_catalog: bool,
    ) -> Result<Handshake, Error> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        let profile = self.profile();

        self.set_phase(TransportPhase::ConnectingToAdapter);
        if profile.connect_delay > timeout {
            tokio::time::sleep(timeout).await;
            self.set_phase(TransportPhase::Error("handshake timed out".into()));
            return Err(Error::Timeout {
                timeout_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(profile.connect_delay).await;

        if let Some(reason) = profile.fail_connect {
            self.set_phase(TransportPhase::Error(reason.clone()));
            return Err(Error::Unreachable {
                address: profile.identity.adapter,
                reason,
            });
        }

        self.set_phase(TransportPhase::ConnectedToAdapter);
        self.set_phase(TransportPhase::ConnectingToVehicle);
        *lock(&self.state.fault) = None;
        self.state.connected.store(true, Ordering::SeqCst);
        self.set_phase(TransportPhase::ConnectedToVehicle);

        // Without a catalog query the whole standard catalog is assumed.
        let supported = if query_catalog {
            profile.supported
        } else {
            Command::catalog().iter().map(|e| e.command).collect()
        };

        let mut identity = profile.identity;
        identity.protocol = match protocol {
            Protocol::Auto => Protocol::Can11bit500k,
            explicit => explicit,
        };

        Ok(Handshake {
            supported,
            identity,
        })
    }

    fn start_stream(
        &self,
        commands: HashSet<Command>,
        units: UnitSystem,
        interval: Duration,
    ) -> BatchStream {
        let state = Arc::clone(&self.state);
        state.stream_starts.fetch_add(1, Ordering::SeqCst);
        lock(&state.requests).push((commands.clone(), units));
        debug!(commands = commands.len(), %units, "simulator: stream requested");

        let guard = OpenStream::new(Arc::clone(&state));
        Box::pin(async_stream::stream! {
            let _guard = guard;
            let mut ticker = tokio::time::interval(interval.max(MIN_TICK));
            loop {
                ticker.tick().await;
                let fault = lock(&state.fault).clone();
                if let Some(reason) = fault {
                    yield Err(Error::StreamInterrupted(reason));
                    break;
                }
                if !state.connected.load(Ordering::SeqCst) {
                    yield Err(Error::NotConnected);
                    break;
                }
                let tick = state.tick.fetch_add(1, Ordering::SeqCst);
                let profile = lock(&state.profile).clone();
                yield Ok(sample_batch(&profile, &commands, units, tick));
            }
        })
    }

    fn stop(&self) {
        self.state.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
        self.set_phase(TransportPhase::Disconnected);
    }

    fn phase(&self) -> watch::Receiver<TransportPhase> {
        self.state.phase.subscribe()
    }
}

/// Keeps the open-stream counters honest for as long as a stream lives.
struct OpenStream {
    state: Arc<SimState>,
}

impl OpenStream {
    fn new(state: Arc<SimState>) -> Self {
        let open = state.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_open_streams.fetch_max(open, Ordering::SeqCst);
        Self { state }
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.state.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Synthetic data ───────────────────────────────────────────────

fn sample_batch(
    profile: &SimulatorProfile,
    commands: &HashSet<Command>,
    units: UnitSystem,
    tick: u64,
) -> Batch {
    commands
        .iter()
        .filter(|cmd| !cmd.is_gauge() || profile.supported.contains(cmd))
        .filter_map(|cmd| sample(profile, *cmd, units, tick).map(|r| (*cmd, r)))
        .collect()
}

fn sample(
    profile: &SimulatorProfile,
    command: Command,
    units: UnitSystem,
    tick: u64,
) -> Option<DecodeResult> {
    let degrees = f64::from(u32::try_from(tick % 45).unwrap_or_default()) * 8.0;
    let wave = degrees.to_radians().sin();
    let imperial = units == UnitSystem::Imperial;

    let measurement =
        |value: f64, unit: Unit| Some(DecodeResult::Measurement(Measurement::new(value, unit)));

    match command.category() {
        CommandCategory::TroubleCodeRequest => {
            if profile.trouble_codes.is_empty() {
                None
            } else {
                Some(DecodeResult::TroubleCodes(profile.trouble_codes.clone()))
            }
        }
        CommandCategory::StatusBundle => match command {
            Command::MONITOR_STATUS => Some(DecodeResult::SummaryStatus(monitor_status(profile))),
            Command::FUEL_SYSTEM_STATUS => Some(DecodeResult::StatusBundle(FuelSystemStatus {
                bank1: if tick < 3 {
                    FuelLoopStatus::OpenLoopCold
                } else {
                    FuelLoopStatus::ClosedLoop
                },
                bank2: None,
            })),
            _ => Some(DecodeResult::NoData),
        },
        CommandCategory::VendorExtended => Some(DecodeResult::NoData),
        CommandCategory::Gauge => match command {
            Command::ENGINE_RPM => measurement(wave.mul_add(1200.0, 2000.0), Unit::Rpm),
            Command::VEHICLE_SPEED => {
                let kmh = wave.mul_add(40.0, 60.0);
                if imperial {
                    measurement(kmh * 0.621_371, Unit::MilesPerHour)
                } else {
                    measurement(kmh, Unit::KilometersPerHour)
                }
            }
            Command::COOLANT_TEMP => temperature(wave.mul_add(4.0, 88.0), imperial),
            Command::INTAKE_AIR_TEMP => temperature(wave.mul_add(5.0, 30.0), imperial),
            Command::ENGINE_LOAD => measurement(wave.mul_add(25.0, 35.0), Unit::Percent),
            Command::THROTTLE_POSITION => measurement(wave.mul_add(10.0, 15.0), Unit::Percent),
            Command::FUEL_LEVEL => measurement(wave.mul_add(0.5, 62.0), Unit::Percent),
            Command::MAF_RATE => {
                let grams = wave.mul_add(6.0, 8.0);
                if imperial {
                    measurement(grams * 0.132_277, Unit::PoundsPerMinute)
                } else {
                    measurement(grams, Unit::GramsPerSecond)
                }
            }
            Command::CONTROL_MODULE_VOLTAGE => measurement(wave.mul_add(0.2, 14.1), Unit::Volts),
            _ => Some(DecodeResult::NoData),
        },
    }
}

fn temperature(celsius: f64, imperial: bool) -> Option<DecodeResult> {
    let m = if imperial {
        Measurement::new(celsius.mul_add(9.0 / 5.0, 32.0), Unit::Fahrenheit)
    } else {
        Measurement::new(celsius, Unit::Celsius)
    };
    Some(DecodeResult::Measurement(m))
}

fn monitor_status(profile: &SimulatorProfile) -> MonitorStatus {
    let monitor = |name: &str, complete: bool| MonitorReadiness {
        name: name.into(),
        available: true,
        complete,
    };
    MonitorStatus {
        mil_on: !profile.trouble_codes.is_empty(),
        trouble_code_count: u8::try_from(profile.trouble_codes.len()).unwrap_or(u8::MAX),
        monitors: vec![
            monitor("misfire", true),
            monitor("fuel_system", true),
            monitor("components", true),
            monitor("catalyst", false),
        ],
    }
}

// ── Factory ──────────────────────────────────────────────────────

/// Builds a fresh [`SimulatedTransport`] for `Simulated` connection details.
#[derive(Debug, Clone, Default)]
pub struct SimulatorFactory {
    profile: SimulatorProfile,
}

impl SimulatorFactory {
    pub fn new(profile: SimulatorProfile) -> Self {
        Self { profile }
    }
}

impl TransportFactory for SimulatorFactory {
    fn create(&self, details: &ConnectionDetails) -> Result<Arc<dyn Transport>, Error> {
        if details.kind != TransportKind::Simulated {
            return Err(Error::UnsupportedTransport(details.kind));
        }
        let mut profile = self.profile.clone();
        profile.identity.adapter = format!(
            "{} @ {}:{}",
            profile.identity.adapter, details.host, details.port
        );
        Ok(Arc::new(SimulatedTransport::new(profile)))
    }
}
