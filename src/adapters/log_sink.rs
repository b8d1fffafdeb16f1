//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::link::pairing::fmt_addr;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | speed={:.1}mph | rpm={:.1}/{:.1} | revs={:.2} | duty={} | \
                     rate={:.1}lb/ac | ws={} | fault={} | paired={}",
                    t.speed_mph,
                    t.shaft_rpm,
                    t.target_rpm,
                    t.revolutions,
                    t.duty,
                    t.actual_rate,
                    if t.work_switch { "DOWN" } else { "UP" },
                    t.fault,
                    t.paired,
                );
            }
            AppEvent::FaultChanged { from, to } => {
                warn!("FAULT | {} -> {}", from, to);
            }
            AppEvent::PairingModeEntered => {
                info!("PAIR | pairing mode");
            }
            AppEvent::PairingTimedOut => {
                info!("PAIR | pairing mode timed out");
            }
            AppEvent::Paired { addr } => {
                info!("PAIR | paired with {}", fmt_addr(addr));
            }
            AppEvent::PeerForgotten => {
                info!("PAIR | peer forgotten, broadcasting");
            }
            AppEvent::Calibrated {
                seed_per_rev,
                revolutions,
            } => {
                info!("CAL | seed/rev={:.5} from {:.2} revs", seed_per_rev, revolutions);
            }
            AppEvent::SeedPerRevSet(spr) => {
                info!("CAL | seed/rev set to {:.5}", spr);
            }
            AppEvent::Started => {
                info!("START | v{}", env!("CARGO_PKG_VERSION"));
            }
        }
    }
}
