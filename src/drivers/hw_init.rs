//! One-shot hardware peripheral initialization.
//!
//! Configures the encoder pulse counter, GPIO directions, the motor
//! LEDC timer/channel and the GPS UART using raw ESP-IDF sys calls.  Called once from
//! `main()` before the control loop starts.  On host targets every
//! accessor is a stub so the drivers above stay target-agnostic.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    PcntConfigFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    UartInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PcntConfigFailed(rc) => write!(f, "PCNT config failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::UartInitFailed(rc) => write!(f, "GPS UART config failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any task is spawned.
    unsafe {
        init_pulse_counter(pins::ENCODER_A_GPIO)?;
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc()?;
        init_gps_uart()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── Pulse counter (PCNT unit 0) ───────────────────────────────

/// Rising edges on `pin` increment unit 0; falling edges are ignored.
/// The counter spans the full `i16` range.
#[cfg(target_os = "espidf")]
unsafe fn init_pulse_counter(pin: i32) -> Result<(), HwInitError> {
    let cfg = pcnt_config_t {
        pulse_gpio_num: pin,
        ctrl_gpio_num: PCNT_PIN_NOT_USED,
        lctrl_mode: pcnt_ctrl_mode_t_PCNT_MODE_KEEP,
        hctrl_mode: pcnt_ctrl_mode_t_PCNT_MODE_KEEP,
        pos_mode: pcnt_count_mode_t_PCNT_COUNT_INC,
        neg_mode: pcnt_count_mode_t_PCNT_COUNT_DIS,
        counter_h_lim: i16::MAX,
        counter_l_lim: i16::MIN,
        unit: pcnt_unit_t_PCNT_UNIT_0,
        channel: pcnt_channel_t_PCNT_CHANNEL_0,
    };
    let ret = unsafe { pcnt_unit_config(&cfg) };
    if ret != ESP_OK { return Err(HwInitError::PcntConfigFailed(ret)); }

    unsafe {
        pcnt_counter_pause(pcnt_unit_t_PCNT_UNIT_0);
        pcnt_counter_clear(pcnt_unit_t_PCNT_UNIT_0);
        pcnt_counter_resume(pcnt_unit_t_PCNT_UNIT_0);
    }
    info!("hw_init: PCNT unit 0 counting GPIO{}", pin);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn pcnt_read() -> i16 {
    let mut count: i16 = 0;
    // SAFETY: register read on a configured unit; only the control loop calls this.
    let ret = unsafe { pcnt_get_counter_value(pcnt_unit_t_PCNT_UNIT_0, &mut count) };
    if ret != ESP_OK {
        return 0;
    }
    count
}

#[cfg(not(target_os = "espidf"))]
pub fn pcnt_read() -> i16 {
    0
}

#[cfg(target_os = "espidf")]
pub fn pcnt_clear() {
    // SAFETY: see pcnt_read.
    unsafe { pcnt_counter_clear(pcnt_unit_t_PCNT_UNIT_0); }
}

#[cfg(not(target_os = "espidf"))]
pub fn pcnt_clear() {}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let input_pins = [
        pins::WORK_SWITCH_GPIO,
        pins::CAL_BUTTON_GPIO,
        pins::PAIR_BUTTON_GPIO,
    ];

    for &pin in &input_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: inputs idle high (pull-ups, nothing pressed).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let output_pins = [
        pins::MOTOR_DIR_GPIO,
        pins::POWER_LED_GPIO,
        pins::CAL_LED_GPIO,
    ];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC PWM ─────────────────────────────────────────────────

pub const LEDC_CH_MOTOR: u32 = 0;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    // Timer 0: metering motor (5 kHz, 8-bit)
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::MOTOR_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer0) };
    if ret != ESP_OK { return Err(HwInitError::LedcInitFailed(ret)); }

    let ret = unsafe { ledc_channel_config(&ledc_channel_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        channel: LEDC_CH_MOTOR,
        timer_sel: ledc_timer_t_LEDC_TIMER_0,
        gpio_num: pins::MOTOR_PWM_GPIO,
        duty: 0,
        hpoint: 0,
        ..Default::default()
    }) };
    if ret != ESP_OK { return Err(HwInitError::LedcInitFailed(ret)); }

    info!("hw_init: LEDC configured (motor=CH0)");
    Ok(())
}

/// Write an 8-bit duty.  Also called from the stall monitor thread; the
/// LEDC driver serialises duty updates internally.
#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: channel configured in init_ledc().
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, u32::from(duty));
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

// ── GPS UART (UART1, 8N1) ─────────────────────────────────────

pub const GPS_BAUD: u32 = 460_800;

#[cfg(target_os = "espidf")]
const GPS_UART: uart_port_t = 1;
#[cfg(target_os = "espidf")]
const GPS_RX_BUF: i32 = 2048;

#[cfg(target_os = "espidf")]
unsafe fn init_gps_uart() -> Result<(), HwInitError> {
    let cfg = uart_config_t {
        baud_rate: GPS_BAUD as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };
    let ret = unsafe { uart_param_config(GPS_UART, &cfg) };
    if ret != ESP_OK { return Err(HwInitError::UartInitFailed(ret)); }

    let ret = unsafe { uart_set_pin(GPS_UART, pins::GPS_TX_GPIO, pins::GPS_RX_GPIO, -1, -1) };
    if ret != ESP_OK { return Err(HwInitError::UartInitFailed(ret)); }

    let ret = unsafe { uart_driver_install(GPS_UART, GPS_RX_BUF, 0, 0, core::ptr::null_mut(), 0) };
    if ret != ESP_OK { return Err(HwInitError::UartInitFailed(ret)); }

    info!("hw_init: GPS UART1 at {} baud (RX=GPIO{})", GPS_BAUD, pins::GPS_RX_GPIO);
    Ok(())
}

/// Read buffered GPS bytes, blocking for at most `timeout_ms`.
#[cfg(target_os = "espidf")]
pub fn gps_uart_read(buf: &mut [u8], timeout_ms: u32) -> usize {
    let ticks = (timeout_ms * configTICK_RATE_HZ / 1000).max(1);
    // SAFETY: driver installed in init_gps_uart(); `buf` bounds the write.
    let n = unsafe { uart_read_bytes(GPS_UART, buf.as_mut_ptr().cast(), buf.len() as u32, ticks) };
    usize::try_from(n).unwrap_or(0)
}

/// Simulation: the receiver is silent.
#[cfg(not(target_os = "espidf"))]
pub fn gps_uart_read(_buf: &mut [u8], _timeout_ms: u32) -> usize {
    0
}
