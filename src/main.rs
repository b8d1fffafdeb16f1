//! Seed meter controller firmware: main entry point.
//!
//! Hexagonal architecture with three pinned tasks.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   NvsAdapter   EspNowLink │
//! │  (Counter+Input+Motor)  (EventSink)    (Config+NVS) (LinkPort) │
//! │  UartGps (GpsSource)                                           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────────────┐  ┌────────────────────────┐  │
//! │  │  AppService (control loop)   │  │  StallGuard (10 ms)    │  │
//! │  │  Tracker · PID · Pairing     │  │  stall latch + burst   │  │
//! │  └──────────────┬───────────────┘  └───────────┬────────────┘  │
//! │                 └──────── SharedState ─────────┘               │
//! │                    GpsFeed ──┘ (publish_gps)                   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::wifi::{ClientConfiguration, Configuration, EspWifi};

use seedmeter::adapters::device_id;
use seedmeter::adapters::espnow::EspNowLink;
use seedmeter::adapters::gps_uart::UartGps;
use seedmeter::adapters::hardware::HardwareAdapter;
use seedmeter::adapters::log_sink::LogEventSink;
use seedmeter::adapters::nvs::NvsAdapter;
use seedmeter::adapters::time::Esp32TimeAdapter;
use seedmeter::app::ports::ConfigPort;
use seedmeter::app::service::AppService;
use seedmeter::config::{ControlConfig, ControllerConfig};
use seedmeter::drivers::hw_init;
use seedmeter::drivers::motor::LedcCutoff;
use seedmeter::drivers::task_pin::{Core, spawn_on_core};
use seedmeter::drivers::watchdog::Watchdog;
use seedmeter::error::Error;
use seedmeter::fault::StallGuard;
use seedmeter::gps::GpsFeed;
use seedmeter::link::pairing::{PeerIdentity, fmt_addr};
use seedmeter::persist;
use seedmeter::shared::SharedState;

/// Stall monitor runs above the control loop so a stall is caught even
/// while the loop is busy with a radio burst.
const STALL_TASK_PRIORITY: u8 = 10;
const STALL_TASK_STACK_KB: usize = 4;
const GPS_TASK_PRIORITY: u8 = 5;
const GPS_TASK_STACK_KB: usize = 4;
const WATCHDOG_TIMEOUT_MS: u32 = 2_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    let mac = device_id::read_mac();
    info!("╔══════════════════════════════════════╗");
    info!("║  Seedmeter v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!("Device ID: {} (MAC {})", device_id::device_id(&mac), fmt_addr(&mac));

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals()
        .map_err(Error::from)
        .inspect_err(|e| error!("HAL init failed: {}", e))?;
    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);

    // ── 3. Persisted state ────────────────────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ControllerConfig::default()
        }
    };
    if let Ok(json) = serde_json::to_string(&config) {
        info!("Config: {}", json);
    }

    let mut control = ControlConfig::default();
    match persist::load_calibration(&nvs) {
        Ok(Some(rec)) => {
            rec.apply(&mut control);
            info!(
                "Calibration restored: {:.5} seed/rev, target {:.1}",
                control.seed_per_rev, control.target_rate
            );
        }
        Ok(None) => info!("No stored calibration"),
        Err(e) => warn!("Calibration load failed ({}), using defaults", e),
    }
    let peer = match persist::load_peer(&nvs) {
        Ok(Some(p)) => {
            info!("Paired screen: {}", fmt_addr(&p.addr));
            p
        }
        Ok(None) => PeerIdentity::broadcast(),
        Err(e) => {
            warn!("Peer load failed ({}), broadcasting", e);
            PeerIdentity::broadcast()
        }
    };

    let shared = Arc::new(SharedState::new(control, peer));

    // ── 4. Radio ──────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = EspWifi::new(peripherals.modem, sysloop, None)?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
    wifi.start()?;

    let link = Arc::new(
        EspNowLink::init(Arc::clone(&shared))
            .map_err(Error::from)
            .inspect_err(|e| error!("ESP-NOW init failed: {}", e))?,
    );

    // ── 5. Stall monitor task ─────────────────────────────────
    {
        let config = config.clone();
        let shared = Arc::clone(&shared);
        let link = Arc::clone(&link);
        spawn_on_core(Core::App, STALL_TASK_PRIORITY, STALL_TASK_STACK_KB, "stall-mon\0", move || {
            let clock = Esp32TimeAdapter::new();
            let mut delay = clock;
            let mut guard = StallGuard::new(&config, shared, link, LedcCutoff);
            loop {
                guard.poll(clock.uptime_ms(), &mut delay);
                delay.delay_ms(config.stall_sample_interval_ms);
            }
        })?;
    }

    // ── 6. GPS reader task ────────────────────────────────────
    {
        let shared = Arc::clone(&shared);
        spawn_on_core(Core::App, GPS_TASK_PRIORITY, GPS_TASK_STACK_KB, "gps\0", move || {
            let clock = Esp32TimeAdapter::new();
            let mut feed = GpsFeed::new(UartGps, shared, clock.uptime_ms());
            loop {
                // The UART read blocks briefly, so this loop yields on its own.
                feed.poll(clock.uptime_ms());
            }
        })?;
    }

    // ── 7. Control loop ───────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut delay = clock;
    let mut hw = HardwareAdapter::default();
    hw.all_off();
    let mut sink = LogEventSink::new();

    let mut app = AppService::new(config.clone(), Arc::clone(&shared), clock.uptime_ms(), &mut hw);
    app.start(&mut hw, link.as_ref(), &mut sink);
    app.boot_buttons(&mut hw, &mut nvs);

    info!("System ready. Entering control loop.");

    let period_ms = u64::from(config.control_loop_interval_ms);
    let mut next_ms = clock.uptime_ms();
    loop {
        app.tick(clock.uptime_ms(), &mut hw, link.as_ref(), &mut nvs, &mut sink);
        watchdog.feed();

        next_ms += period_ms;
        let now = clock.uptime_ms();
        if next_ms > now {
            delay.delay_ms((next_ms - now) as u32);
        } else {
            // Overran; resynchronise instead of bursting catch-up ticks.
            next_ms = now;
        }
    }
}
