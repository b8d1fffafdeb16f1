//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                 |
//! |-------------|---------------------|-----------------------------|
//! | `device_id` | -                   | eFuse factory MAC           |
//! | `espnow`    | LinkPort            | ESP-NOW (WiFi STA)          |
//! | `gps_uart`  | GpsSource           | UART1 (GPS receiver)        |
//! | `hardware`  | PulseCounterPort    | PCNT unit 0                 |
//! |             | InputPort           | GPIO (active-low)           |
//! |             | ActuatorPort        | LEDC PWM, GPIO              |
//! | `log_sink`  | EventSink           | Serial log output           |
//! | `nvs`       | ConfigPort          | NVS / in-memory store       |
//! |             | StoragePort         |                             |
//! | `time`      | DelayNs             | ESP32 high-resolution timer |

pub mod device_id;
pub mod espnow;
pub mod gps_uart;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
