//! GPS receiver on UART1.
//!
//! The driver itself is installed by `hw_init`; this adapter only hands
//! buffered bytes to the [`GpsFeed`](crate::gps::GpsFeed).  On host
//! targets the receiver is silent.

use crate::app::ports::GpsSource;
use crate::drivers::hw_init;

/// Longest a single read blocks waiting for the first byte.
const READ_TIMEOUT_MS: u32 = 20;

#[derive(Debug, Default)]
pub struct UartGps;

impl GpsSource for UartGps {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        hw_init::gps_uart_read(buf, READ_TIMEOUT_MS)
    }
}
