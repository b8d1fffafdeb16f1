//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the encoder tracker, PID, pairing manager and the
//! input debouncers.  It runs one control cycle per [`tick`](AppService::tick);
//! all I/O flows through port traits injected at call sites, making the
//! whole cycle testable with mock adapters.
//!
//! ```text
//!  inbound Channel ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  PulseCounterPort ──▶│          AppService           │ ──▶ LinkPort (status)
//!  InputPort ─────────▶│ apply · pair · measure · PID  │ ──▶ StoragePort
//!                      └──────────────────────────────┘ ──▶ ActuatorPort
//! ```
//!
//! ## Cycle order
//!
//! 1. Drain and apply screen packets
//! 2. Pairing button
//! 3. Encoder sample
//! 4. Debounced work switch / calibration button
//! 5. Ground speed (GPS or speed-test override)
//! 6. PID step while the work switch is engaged (+ fault side effects)
//! 7. Motor selection and output
//! 8. LEDs
//! 9. Rate-limited status packet, periodic telemetry

use std::sync::Arc;

use core::sync::atomic::Ordering;

use log::{debug, info, warn};

use crate::config::{ControlConfig, ControllerConfig};
use crate::control::pid::PidController;
use crate::control::rate::{calculate_application_rate, calculate_seed_per_rev, calculate_target_shaft_rpm};
use crate::error::FaultCode;
use crate::link::channels::{self, InboundMessage};
use crate::link::packet::{CommandPacket, Packet, pair_ack};
use crate::link::pairing::{PairingEvent, PairingManager, PairingState, PeerIdentity};
use crate::persist::{self, CalibrationRecord};
use crate::sensors::encoder::{PulseRateTracker, ShaftReading};
use crate::sensors::switch::{DEBOUNCE_MS, Debouncer};
use crate::shared::SharedState;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, ConfigPort, EventSink, InputPort, LinkPort, PulseCounterPort, StoragePort};

/// Calibration LED half-period while in pairing mode.
const PAIRING_BLINK_MS: u64 = 250;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: ControllerConfig,
    shared: Arc<SharedState>,
    tracker: PulseRateTracker,
    pid: PidController,
    pairing: PairingManager,
    work_switch: Debouncer,
    cal_button: Debouncer,
    /// Next command received in calibration mode zeroes the revolutions
    reset_revs_armed: bool,
    reading: ShaftReading,
    target_rpm: f32,
    duty: u8,
    last_status_ms: u64,
    last_telemetry_ms: u64,
    tick_count: u64,
}

impl AppService {
    /// Construct the service.  Clears the encoder counter.
    pub fn new(
        config: ControllerConfig,
        shared: Arc<SharedState>,
        now_ms: u64,
        counter: &mut impl PulseCounterPort,
    ) -> Self {
        let tracker = PulseRateTracker::begin(&config, now_ms, counter);
        let pid = PidController::from_config(&config);
        let pairing = PairingManager::new(&config, &shared.peer());

        Self {
            config,
            shared,
            tracker,
            pid,
            pairing,
            work_switch: Debouncer::new(DEBOUNCE_MS),
            cal_button: Debouncer::new(DEBOUNCE_MS),
            reset_revs_armed: false,
            reading: ShaftReading::default(),
            target_rpm: 0.0,
            duty: 0,
            last_status_ms: now_ms,
            last_telemetry_ms: now_ms,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Power LED on, motor off, persisted peer registered with the radio.
    pub fn start(&mut self, hw: &mut impl ActuatorPort, link: &impl LinkPort, sink: &mut impl EventSink) {
        hw.stop_motor();
        hw.set_power_led(true);
        hw.set_cal_led(self.shared.control().calibration_mode);
        self.shared.record_motor(0, false);

        let peer = self.shared.peer();
        if peer.paired {
            if let Err(e) = link.register_peer(&peer.addr) {
                warn!("AppService: restoring peer failed: {}", e);
            }
        }
        sink.emit(&AppEvent::Started);
        info!("AppService started (paired: {})", peer.paired);
    }

    /// Buttons held at power-on.  CAL held through boot wipes the stored
    /// calibration.
    pub fn boot_buttons(&mut self, hw: &mut impl InputPort, storage: &mut impl StoragePort) {
        if hw.cal_button() {
            info!("AppService: CAL held at boot, clearing calibration");
            self.clear_calibration(storage);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies the counter, input **and** actuator
    /// ports; this avoids a double mutable borrow while keeping the port
    /// boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl PulseCounterPort + InputPort + ActuatorPort),
        link: &impl LinkPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Screen packets
        let shared = Arc::clone(&self.shared);
        for msg in channels::drain(&shared) {
            self.apply_inbound(msg, hw, link, storage, sink);
        }

        // 2. Pairing button
        match self.pairing.poll(now_ms, hw.pair_button()) {
            Some(PairingEvent::Entered) => sink.emit(&AppEvent::PairingModeEntered),
            Some(PairingEvent::TimedOut) => sink.emit(&AppEvent::PairingTimedOut),
            Some(PairingEvent::ForgetRequested) => self.forget_peer(link, storage, sink),
            None => {}
        }

        // 3. Encoder
        self.reading = self.tracker.update(now_ms, hw);
        self.shared.rpm.store(self.reading.rpm);
        self.shared.revolutions.store(self.reading.revolutions);
        self.shared.moving.store(self.reading.moving, Ordering::Release);

        // 4. Operator inputs
        let work_switch = self.work_switch.update(hw.work_switch(), now_ms);
        let cal_button = self.cal_button.update(hw.cal_button(), now_ms);
        self.shared.work_switch.store(work_switch, Ordering::Release);

        // 5. Ground speed
        let control = self.shared.control();
        let speed_mph = if control.speed_test {
            control.speed_test_mph
        } else {
            self.shared.gps().speed_mph
        };

        // 6. Rate control
        let pid_duty = if work_switch {
            self.target_rpm = calculate_target_shaft_rpm(
                speed_mph,
                control.target_rate,
                control.seed_per_rev,
                control.working_width,
            );
            let out = self.pid.compute(self.target_rpm, self.reading.rpm);
            if let Some(t) = self.shared.fault.on_pid_output(out.saturation) {
                sink.emit(&AppEvent::FaultChanged { from: t.from, to: t.to });
            }
            self.shared.actual_rate.store(calculate_application_rate(
                self.reading.rpm,
                control.seed_per_rev,
                speed_mph,
                control.working_width,
            ));
            out.duty
        } else {
            self.target_rpm = 0.0;
            self.shared.actual_rate.store(0.0);
            0
        };

        // 7. Motor
        let duty = self.select_duty(&control, cal_button, work_switch, pid_duty);
        self.drive_motor(duty, hw);

        // 8. LEDs
        let cal_led = if self.pairing.in_pairing_mode() {
            (now_ms / PAIRING_BLINK_MS) % 2 == 0
        } else {
            control.calibration_mode
        };
        hw.set_cal_led(cal_led);

        // 9. Outbound
        if now_ms.saturating_sub(self.last_status_ms) >= u64::from(self.config.status_interval_ms) {
            self.last_status_ms = now_ms;
            self.send_status(link);
        }
        if now_ms.saturating_sub(self.last_telemetry_ms) >= u64::from(self.config.telemetry_log_interval_ms) {
            self.last_telemetry_ms = now_ms;
            sink.emit(&AppEvent::Telemetry(self.build_telemetry(speed_mph, work_switch)));
        }
    }

    /// Motor priority: stall → off, motor test, calibration prime,
    /// work switch (PID), otherwise off.
    fn select_duty(&self, control: &ControlConfig, cal_button: bool, work_switch: bool, pid_duty: u8) -> u8 {
        if self.shared.fault.code() == FaultCode::ShaftStall {
            0
        } else if control.motor_test {
            u8::try_from(control.motor_test_pwm.clamp(0, i32::from(self.config.max_pwm))).unwrap_or(0)
        } else if cal_button {
            self.config.max_pwm
        } else if work_switch {
            pid_duty
        } else {
            0
        }
    }

    /// Apply `duty`, then look at the fault again: the stall monitor may
    /// have tripped and cut the motor while this write was in flight.
    fn drive_motor(&mut self, duty: u8, hw: &mut impl ActuatorPort) {
        self.duty = duty;
        if self.duty == 0 {
            hw.stop_motor();
        } else {
            hw.set_motor(self.duty);
            if self.shared.fault.code() == FaultCode::ShaftStall {
                hw.stop_motor();
                self.duty = 0;
            }
        }
        self.shared.record_motor(self.duty, self.duty > 0);
    }

    fn send_status(&self, link: &impl LinkPort) {
        let peer = self.shared.peer();
        let packet = self.shared.status_packet(self.config.utc_offset_hours).encode();
        if let Err(e) = link.send(&peer.addr, &packet) {
            warn!("AppService: status send failed: {}", e);
        }
    }

    // ── Inbound packets ───────────────────────────────────────

    /// Single update path for everything the screen sends.
    fn apply_inbound(
        &mut self,
        msg: InboundMessage,
        counter: &mut impl PulseCounterPort,
        link: &impl LinkPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match msg.packet {
            Packet::Command(cmd) => self.apply_command(&cmd, counter, storage, sink),
            Packet::PairRequest => self.on_pair_request(msg.src, link, storage, sink),
            Packet::PairAck => debug!("AppService: stray pair ack ignored"),
        }
    }

    fn apply_command(
        &mut self,
        cmd: &CommandPacket,
        counter: &mut impl PulseCounterPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let control = self.shared.update_control(|c| {
            c.calibration_mode = cmd.calibration_mode;
            c.target_rate = cmd.seeding_rate;
            c.calibration_weight = cmd.calibration_weight;
            c.motor_test = cmd.motor_test;
            c.motor_test_pwm = cmd.motor_test_pwm;
            c.speed_test = cmd.speed_test;
            c.speed_test_mph = cmd.speed_test_mph;
            c.working_width = cmd.working_width;
            c.calibration_runs = cmd.calibration_runs;
            c.stall_protection = cmd.stall_protection;
            c.stall_delay_ms = cmd.stall_delay_ms;
        });

        if cmd.error_ack {
            if let Some(t) = self.shared.fault.acknowledge(self.work_switch.state()) {
                sink.emit(&AppEvent::FaultChanged { from: t.from, to: t.to });
            } else if self.shared.fault.is_raised() {
                info!("AppService: ack ignored for {}", self.shared.fault.code());
            }
        }

        if cmd.manual_seed_update {
            let control = self.shared.update_control(|c| c.seed_per_rev = cmd.new_seed_per_rev);
            self.persist_calibration(&control, storage);
            sink.emit(&AppEvent::SeedPerRevSet(control.seed_per_rev));
        }

        if cmd.calc_seed_per_rev {
            let revolutions = self.tracker.revolutions();
            let spr = calculate_seed_per_rev(revolutions, control.calibration_weight, control.calibration_runs);
            let control = self.shared.update_control(|c| c.seed_per_rev = spr);
            self.persist_calibration(&control, storage);
            self.reset_revs_armed = true;
            info!("AppService: seed/rev {:.5} from {:.2} revs", spr, revolutions);
            sink.emit(&AppEvent::Calibrated {
                seed_per_rev: spr,
                revolutions,
            });
        } else if control.calibration_mode && self.reset_revs_armed {
            self.tracker.reset_revolutions(counter);
            self.shared.revolutions.store(0.0);
            self.reset_revs_armed = false;
            info!("AppService: calibration revolutions reset");
        }
    }

    fn on_pair_request(
        &mut self,
        src: [u8; 6],
        link: &impl LinkPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let previous = self.shared.peer();
        let Some(peer) = self.pairing.accept(src) else {
            return;
        };

        // The ESP-NOW peer table is small; drop the screen being replaced.
        if previous.paired && previous.addr != peer.addr {
            if let Err(e) = link.unregister_peer(&previous.addr) {
                warn!("AppService: removing old peer failed: {}", e);
            }
        }
        if let Err(e) = link.register_peer(&peer.addr) {
            warn!("AppService: peer registration failed: {}", e);
        }
        self.shared.set_peer(peer);
        if let Err(e) = persist::save_peer(storage, &peer) {
            warn!("AppService: saving peer failed: {}", e);
        }
        if let Err(e) = link.send(&peer.addr, &pair_ack()) {
            warn!("AppService: pair ack failed: {}", e);
        }
        sink.emit(&AppEvent::Paired { addr: peer.addr });
    }

    fn persist_calibration(&self, control: &ControlConfig, storage: &mut impl StoragePort) {
        let rec = CalibrationRecord::from_control(control, self.tracker.revolutions());
        if let Err(e) = persist::save_calibration(storage, &rec) {
            warn!("AppService: saving calibration failed: {}", e);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a local command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        link: &impl LinkPort,
        storage: &mut (impl StoragePort + ConfigPort),
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::ForgetPeer => self.forget_peer(link, storage, sink),
            AppCommand::ClearCalibration => self.clear_calibration(storage),
            AppCommand::UpdateConfig(new_config) => {
                self.pid.retune(&new_config);
                self.config = new_config;
                info!("Configuration updated at runtime");
            }
            AppCommand::SaveConfig => match storage.save(&self.config) {
                Ok(()) => info!("Config saved to NVS"),
                Err(e) => warn!("Config save failed: {}", e),
            },
        }
    }

    fn forget_peer(&mut self, link: &impl LinkPort, storage: &mut impl StoragePort, sink: &mut impl EventSink) {
        let old = self.shared.peer();
        if old.paired {
            if let Err(e) = link.unregister_peer(&old.addr) {
                warn!("AppService: peer removal failed: {}", e);
            }
        }
        self.shared.set_peer(PeerIdentity::broadcast());
        self.pairing.forget();
        if let Err(e) = persist::clear_peer(storage) {
            warn!("AppService: clearing peer failed: {}", e);
        }
        sink.emit(&AppEvent::PeerForgotten);
    }

    fn clear_calibration(&mut self, storage: &mut impl StoragePort) {
        self.shared.update_control(|c| c.seed_per_rev = 0.0);
        if let Err(e) = persist::clear_calibration(storage) {
            warn!("AppService: clearing calibration failed: {}", e);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    fn build_telemetry(&self, speed_mph: f32, work_switch: bool) -> TelemetryData {
        TelemetryData {
            speed_mph,
            target_rpm: self.target_rpm,
            shaft_rpm: self.reading.rpm,
            revolutions: self.reading.revolutions,
            duty: self.duty,
            actual_rate: self.shared.actual_rate.load(),
            work_switch,
            fault: self.shared.fault.code(),
            paired: self.shared.peer().paired,
        }
    }

    /// Motor duty applied on the last cycle.
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Target shaft RPM computed on the last cycle (0 when lifted).
    pub fn target_rpm(&self) -> f32 {
        self.target_rpm
    }

    pub fn reading(&self) -> ShaftReading {
        self.reading
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing.state()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
