//! Long-hold detector for the BOOT / pairing button.
//!
//! ## Hardware
//!
//! Active-low momentary switch with internal pull-up on GPIO0.  The
//! control loop samples the level each tick and feeds it to
//! [`HoldTrigger::update`] as "pressed".
//!
//! ## Gesture detection
//!
//! | Gesture   | Condition                   | Result        |
//! |-----------|-----------------------------|---------------|
//! | Long hold | Held continuously ≥ hold_ms | fires once    |
//! | Release   | Level returns high          | re-arms       |
//!
//! Pairing uses two triggers on the same button: 3 s enters pairing mode
//! and 10 s forgets the peer.
//!
//! A hold that keeps going after firing does not fire again until the
//! button is released and pressed anew.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldState {
    Released,
    Held { since_ms: u64 },
    Fired,
}

#[derive(Debug, Clone)]
pub struct HoldTrigger {
    hold_ms: u64,
    state: HoldState,
}

impl HoldTrigger {
    pub fn new(hold_ms: u32) -> Self {
        Self {
            hold_ms: u64::from(hold_ms),
            state: HoldState::Released,
        }
    }

    /// Returns `true` exactly once per qualifying hold.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> bool {
        if !pressed {
            self.state = HoldState::Released;
            return false;
        }

        match self.state {
            HoldState::Released => {
                self.state = HoldState::Held { since_ms: now_ms };
                self.hold_ms == 0 && self.fire()
            }
            HoldState::Held { since_ms } => {
                now_ms.saturating_sub(since_ms) >= self.hold_ms && self.fire()
            }
            HoldState::Fired => false,
        }
    }

    pub fn is_held(&self) -> bool {
        self.state != HoldState::Released
    }

    fn fire(&mut self) -> bool {
        self.state = HoldState::Fired;
        true
    }
}
