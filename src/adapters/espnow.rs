//! ESP-NOW link adapter.
//!
//! Implements [`LinkPort`] for the screen link.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw `esp_now_*` sys calls.  WiFi must be
//!   started (STA mode) before [`EspNowLink::init`].  The receive callback
//!   runs in the WiFi task; it only decodes and enqueues via
//!   [`channels::deliver`](crate::link::channels::deliver).
//! - **all other targets**: an in-memory simulation that records every
//!   frame, used by host tests.

use std::sync::Arc;

use log::info;

use crate::app::ports::LinkPort;
use crate::error::LinkError;
use crate::link::pairing::BROADCAST_ADDR;
use crate::shared::SharedState;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use std::sync::OnceLock;

#[cfg(not(target_os = "espidf"))]
use std::sync::Mutex;

/// Where the receive callback delivers frames.  Set once by `init`.
#[cfg(target_os = "espidf")]
static RX_TARGET: OnceLock<Arc<SharedState>> = OnceLock::new();

/// One frame handed to the simulated radio.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub addr: [u8; 6],
    pub data: Vec<u8>,
}

pub struct EspNowLink {
    #[cfg(not(target_os = "espidf"))]
    sent: Mutex<Vec<SentFrame>>,
    #[cfg(not(target_os = "espidf"))]
    peers: Mutex<Vec<[u8; 6]>>,
    #[cfg(not(target_os = "espidf"))]
    shared: Arc<SharedState>,
}

impl EspNowLink {
    /// Bring up ESP-NOW, register the broadcast peer and route received
    /// frames into `shared`'s inbound queue.
    #[cfg(target_os = "espidf")]
    pub fn init(shared: Arc<SharedState>) -> Result<Self, LinkError> {
        if RX_TARGET.set(shared).is_err() {
            return Err(LinkError::InitFailed(ESP_ERR_INVALID_STATE));
        }

        // SAFETY: WiFi is started by main before this call; the callback is
        // a plain extern fn reading only the 'static RX_TARGET.
        let ret = unsafe { esp_now_init() };
        if ret != ESP_OK {
            return Err(LinkError::InitFailed(ret));
        }
        let ret = unsafe { esp_now_register_recv_cb(Some(espnow_recv_cb)) };
        if ret != ESP_OK {
            return Err(LinkError::InitFailed(ret));
        }

        let link = Self {};
        link.register_peer(&BROADCAST_ADDR)?;
        info!("EspNow: initialised");
        Ok(link)
    }

    /// Simulation: frames passed to [`inject`](Self::inject) land in
    /// `shared`'s inbound queue.
    #[cfg(not(target_os = "espidf"))]
    pub fn init(shared: Arc<SharedState>) -> Result<Self, LinkError> {
        info!("EspNow(sim): initialised");
        Ok(Self {
            sent: Mutex::new(Vec::new()),
            peers: Mutex::new(vec![BROADCAST_ADDR]),
            shared,
        })
    }

    /// Simulate a frame arriving over the air.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&self, src: [u8; 6], data: &[u8]) {
        let _ = crate::link::channels::deliver(&self.shared, src, data);
    }

    /// Every frame sent so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_peer(&self, addr: &[u8; 6]) -> bool {
        self.peers.lock().is_ok_and(|p| p.contains(addr))
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn espnow_recv_cb(info: *const esp_now_recv_info_t, data: *const u8, len: i32) {
    let Some(shared) = RX_TARGET.get() else {
        return;
    };
    if info.is_null() || data.is_null() || len <= 0 {
        return;
    }
    // SAFETY: the WiFi driver guarantees `src_addr` points at 6 bytes and
    // `data` at `len` bytes for the duration of the callback.
    let (src, bytes) = unsafe {
        let mut src = [0u8; 6];
        core::ptr::copy_nonoverlapping((*info).src_addr, src.as_mut_ptr(), 6);
        (src, core::slice::from_raw_parts(data, len as usize))
    };
    let _ = crate::link::channels::deliver(shared, src, bytes);
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl LinkPort for EspNowLink {
    fn send(&self, addr: &[u8; 6], data: &[u8]) -> Result<(), LinkError> {
        // SAFETY: esp_now_send copies `data` before returning.
        let ret = unsafe { esp_now_send(addr.as_ptr(), data.as_ptr(), data.len()) };
        if ret != ESP_OK {
            return Err(LinkError::SendFailed(ret));
        }
        Ok(())
    }

    fn register_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError> {
        // SAFETY: read-only lookup by address.
        if unsafe { esp_now_is_peer_exist(addr.as_ptr()) } {
            return Ok(());
        }
        let peer = esp_now_peer_info_t {
            peer_addr: *addr,
            channel: 0,
            ifidx: wifi_interface_t_WIFI_IF_STA,
            encrypt: false,
            ..Default::default()
        };
        // SAFETY: the peer info is copied by the driver.
        let ret = unsafe { esp_now_add_peer(&peer) };
        if ret != ESP_OK {
            return Err(LinkError::PeerRejected(ret));
        }
        Ok(())
    }

    fn unregister_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError> {
        // SAFETY: lookup by address; a missing peer is reported, not UB.
        let ret = unsafe { esp_now_del_peer(addr.as_ptr()) };
        if ret != ESP_OK && ret != ESP_ERR_ESPNOW_NOT_FOUND {
            return Err(LinkError::PeerRejected(ret));
        }
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkPort for EspNowLink {
    fn send(&self, addr: &[u8; 6], data: &[u8]) -> Result<(), LinkError> {
        if !self.is_peer(addr) {
            return Err(LinkError::SendFailed(-1));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentFrame {
                addr: *addr,
                data: data.to_vec(),
            });
        }
        Ok(())
    }

    fn register_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError> {
        let mut peers = self.peers.lock().map_err(|_| LinkError::PeerRejected(-1))?;
        if !peers.contains(addr) {
            peers.push(*addr);
        }
        Ok(())
    }

    fn unregister_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError> {
        let mut peers = self.peers.lock().map_err(|_| LinkError::PeerRejected(-1))?;
        peers.retain(|p| p != addr);
        Ok(())
    }
}
