//! Mock adapters for integration tests.
//!
//! Records every actuator call and radio frame so tests can assert on
//! the full history without touching real PCNT/LEDC/ESP-NOW registers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use seedmeter::adapters::nvs::NvsAdapter;
use seedmeter::app::events::AppEvent;
use seedmeter::app::ports::{ActuatorPort, EventSink, InputPort, LinkPort, MotorCutoff, PulseCounterPort};
use seedmeter::app::service::AppService;
use seedmeter::config::{ControlConfig, ControllerConfig};
use seedmeter::error::LinkError;
use seedmeter::link::channels;
use seedmeter::link::packet::{CommandPacket, STATUS_LEN, StatusPacket};
use seedmeter::link::pairing::PeerIdentity;
use seedmeter::shared::SharedState;

/// The screen's station MAC in every test.
pub const SCREEN: [u8; 6] = [0x24, 0x6F, 0x28, 0x11, 0x22, 0x33];

// ── MockHw ────────────────────────────────────────────────────

/// Counter, switches and actuators in one struct, like the real
/// `HardwareAdapter`.
#[derive(Debug, Default)]
pub struct MockHw {
    pub count: i16,
    pub work_switch: bool,
    pub cal_button: bool,
    pub pair_button: bool,
    pub duty: u8,
    pub power_led: bool,
    pub cal_led: bool,
}

#[allow(dead_code)]
impl MockHw {
    /// Advance the encoder by `pulses` (wrapping like the PCNT register).
    /// The control loop drains the count every tick.
    pub fn turn(&mut self, pulses: i16) {
        self.count = self.count.wrapping_add(pulses);
    }
}

impl PulseCounterPort for MockHw {
    fn read_count(&mut self) -> i16 {
        self.count
    }

    fn clear_count(&mut self) {
        self.count = 0;
    }
}

impl InputPort for MockHw {
    fn work_switch(&mut self) -> bool {
        self.work_switch
    }

    fn cal_button(&mut self) -> bool {
        self.cal_button
    }

    fn pair_button(&mut self) -> bool {
        self.pair_button
    }
}

impl ActuatorPort for MockHw {
    fn set_motor(&mut self, duty: u8) {
        self.duty = duty;
    }

    fn stop_motor(&mut self) {
        self.duty = 0;
    }

    fn set_power_led(&mut self, on: bool) {
        self.power_led = on;
    }

    fn set_cal_led(&mut self, on: bool) {
        self.cal_led = on;
    }
}

// ── MockLink ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockLink {
    pub sent: Mutex<Vec<([u8; 6], Vec<u8>)>>,
    pub peers: Mutex<Vec<[u8; 6]>>,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl MockLink {
    pub fn frames(&self) -> Vec<([u8; 6], Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Every status frame sent so far, decoded.
    pub fn status_frames(&self) -> Vec<([u8; 6], StatusPacket)> {
        self.frames()
            .into_iter()
            .filter(|(_, d)| d.len() == STATUS_LEN)
            .map(|(a, d)| (a, StatusPacket::decode(&d).unwrap()))
            .collect()
    }

    pub fn frames_equal_to(&self, data: &[u8]) -> usize {
        self.frames().iter().filter(|(_, d)| d.as_slice() == data).count()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn is_peer(&self, addr: &[u8; 6]) -> bool {
        self.peers.lock().unwrap().contains(addr)
    }
}

impl LinkPort for MockLink {
    fn send(&self, addr: &[u8; 6], data: &[u8]) -> Result<(), LinkError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(LinkError::SendFailed(-1));
        }
        self.sent.lock().unwrap().push((*addr, data.to_vec()));
        Ok(())
    }

    fn register_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError> {
        let mut peers = self.peers.lock().unwrap();
        if !peers.contains(addr) {
            peers.push(*addr);
        }
        Ok(())
    }

    fn unregister_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError> {
        self.peers.lock().unwrap().retain(|p| p != addr);
        Ok(())
    }
}

// ── MockCutoff / NoDelay ──────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MockCutoff(pub Arc<AtomicBool>);

#[allow(dead_code)]
impl MockCutoff {
    pub fn was_cut(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl MotorCutoff for MockCutoff {
    fn cut(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Delay that returns immediately; records the total requested time.
#[derive(Debug, Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A started `AppService` wired to mocks, driven in 10 ms ticks.
pub struct Rig {
    pub app: AppService,
    pub hw: MockHw,
    pub link: Arc<MockLink>,
    pub nvs: NvsAdapter,
    pub sink: RecordingSink,
    pub shared: Arc<SharedState>,
    pub config: ControllerConfig,
    pub now: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with(ControlConfig::default(), PeerIdentity::broadcast())
    }

    pub fn with(control: ControlConfig, peer: PeerIdentity) -> Self {
        let config = ControllerConfig::default();
        let shared = Arc::new(SharedState::new(control, peer));
        let mut hw = MockHw::default();
        let link = Arc::new(MockLink::default());
        let mut sink = RecordingSink::default();
        let mut app = AppService::new(config.clone(), Arc::clone(&shared), 0, &mut hw);
        app.start(&mut hw, link.as_ref(), &mut sink);
        Self {
            app,
            hw,
            link,
            nvs: NvsAdapter::default(),
            sink,
            shared,
            config,
            now: 0,
        }
    }

    /// Run control ticks covering `ms` milliseconds.
    pub fn run(&mut self, ms: u64) {
        let end = self.now + ms;
        while self.now < end {
            self.now += 10;
            self.app
                .tick(self.now, &mut self.hw, self.link.as_ref(), &mut self.nvs, &mut self.sink);
        }
    }

    /// Queue a frame as if it arrived from `src`.
    pub fn receive(&self, src: [u8; 6], bytes: &[u8]) {
        channels::deliver(&self.shared, src, bytes).unwrap();
    }

    /// Queue a command from the screen and run one tick to apply it.
    pub fn command(&mut self, cmd: &CommandPacket) {
        self.receive(SCREEN, &cmd.encode());
        self.run(10);
    }
}

/// A typical in-field command: 10 lb/ac over 40 ft at a simulated 5 mph.
#[allow(dead_code)]
pub fn field_command() -> CommandPacket {
    CommandPacket {
        seeding_rate: 10.0,
        working_width: 40.0,
        speed_test: true,
        speed_test_mph: 5.0,
        calibration_runs: 8,
        stall_protection: true,
        stall_delay_ms: 200,
        ..CommandPacket::default()
    }
}

/// Control values matching [`field_command`] with a calibrated meter.
#[allow(dead_code)]
pub fn calibrated_control() -> ControlConfig {
    ControlConfig {
        target_rate: 10.0,
        working_width: 40.0,
        seed_per_rev: 0.05,
        speed_test: true,
        speed_test_mph: 5.0,
        ..ControlConfig::default()
    }
}
