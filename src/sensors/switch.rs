//! Time-based debouncer for the active-low operator inputs.
//!
//! A level must stay unchanged for longer than the debounce delay before
//! it replaces the stable state.  Used for the work switch and the
//! calibration button; the pairing button has its own hold timer.

/// Default settle time for mechanical switches.
pub const DEBOUNCE_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    stable: bool,
    last_raw: bool,
    last_change_ms: u64,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            stable: false,
            last_raw: false,
            last_change_ms: 0,
        }
    }

    /// Feed the current raw level (`true` = active) and return the
    /// debounced state.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> bool {
        if raw != self.last_raw {
            self.last_change_ms = now_ms;
            self.last_raw = raw;
        }
        if now_ms.saturating_sub(self.last_change_ms) > self.delay_ms {
            self.stable = raw;
        }
        self.stable
    }

    pub fn state(&self) -> bool {
        self.stable
    }
}
