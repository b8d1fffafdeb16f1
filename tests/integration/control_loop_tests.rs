//! Control cycle: rate control, motor priority and the status cadence.

use seedmeter::app::commands::AppCommand;
use seedmeter::app::events::AppEvent;
use seedmeter::app::ports::ConfigPort;
use seedmeter::config::ControllerConfig;
use seedmeter::error::FaultCode;
use seedmeter::gps::GpsReading;
use seedmeter::link::pairing::{BROADCAST_ADDR, PeerIdentity};

use super::mock_hw::{Rig, calibrated_control, field_command};

#[test]
fn engaged_drive_chases_target_rpm() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    rig.run(100);

    // 5 mph × 40 ft, 10 lb/ac at 0.05 lb/rev
    assert!((rig.app.target_rpm() - 80.808).abs() < 0.01, "got {}", rig.app.target_rpm());
    assert!(rig.hw.duty > 0);
    assert_eq!(rig.shared.motor_duty(), rig.hw.duty);
}

#[test]
fn switch_needs_to_settle_before_engaging() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    rig.run(40);
    assert_eq!(rig.hw.duty, 0, "engaged before the debounce settled");
    rig.run(60);
    assert!(rig.hw.duty > 0);
}

#[test]
fn lifted_implement_zeroes_rate_and_motor() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    rig.run(200);
    assert!(rig.hw.duty > 0);

    rig.hw.work_switch = false;
    rig.run(100);
    assert_eq!(rig.hw.duty, 0);
    assert_eq!(rig.app.target_rpm(), 0.0);
    assert_eq!(rig.shared.actual_rate.load(), 0.0);
}

#[test]
fn uncalibrated_meter_does_not_drive() {
    let mut rig = Rig::new();
    rig.command(&field_command());
    rig.hw.work_switch = true;
    rig.run(200);
    assert_eq!(rig.app.target_rpm(), 0.0);
    assert_eq!(rig.hw.duty, 0);
}

#[test]
fn actual_rate_follows_measured_rpm() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    // 14 pulses / 10 ms at 1024 ppr ≈ 82 rpm
    for _ in 0..150 {
        rig.hw.turn(14);
        rig.run(10);
    }
    let rpm = rig.app.reading().rpm;
    assert!((rpm - 82.03).abs() < 0.5, "rpm {rpm}");
    let rate = rig.shared.actual_rate.load();
    assert!((rate - 10.15).abs() < 0.2, "rate {rate}");
}

#[test]
fn saturated_output_raises_and_ignores_ack() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    rig.run(200);

    // A stopped shaft winds the integral up until the output clamps.
    assert_eq!(rig.shared.fault.code(), FaultCode::MaxPwmSaturation);
    assert!(rig.sink.contains(&AppEvent::FaultChanged {
        from: FaultCode::None,
        to: FaultCode::MaxPwmSaturation,
    }));

    rig.command(&seedmeter::link::packet::CommandPacket {
        error_ack: true,
        ..field_command()
    });
    rig.run(50);
    assert_eq!(rig.shared.fault.code(), FaultCode::MaxPwmSaturation);
    assert!(!rig.sink.contains(&AppEvent::FaultChanged {
        from: FaultCode::MaxPwmSaturation,
        to: FaultCode::None,
    }));
}

#[test]
fn calibration_button_primes_at_full_duty() {
    let mut rig = Rig::new();
    rig.hw.cal_button = true;
    rig.run(100);
    assert_eq!(rig.hw.duty, 255);

    rig.hw.cal_button = false;
    rig.run(100);
    assert_eq!(rig.hw.duty, 0);
}

#[test]
fn motor_test_overrides_priming_and_pid() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    rig.hw.cal_button = true;
    rig.command(&seedmeter::link::packet::CommandPacket {
        motor_test: true,
        motor_test_pwm: 60,
        ..field_command()
    });
    rig.run(100);
    assert_eq!(rig.hw.duty, 60);
}

#[test]
fn status_is_rate_limited() {
    let mut rig = Rig::new();
    rig.run(1000);
    assert_eq!(rig.app.tick_count(), 100);
    let frames = rig.link.status_frames();
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|(addr, _)| *addr == BROADCAST_ADDR));
}

#[test]
fn status_reports_gps_in_local_time() {
    let mut rig = Rig::new();
    rig.shared.publish_gps(GpsReading {
        fix_valid: true,
        num_satellites: 9,
        speed_mph: 4.5,
        hour: 3,
        minute: 15,
        second: 42,
    });
    rig.run(200);

    let (_, status) = *rig.link.status_frames().last().unwrap();
    assert!(status.fix_valid);
    assert_eq!(status.num_satellites, 9);
    assert_eq!(status.speed_mph, 4.5);
    assert_eq!(status.hour, 21, "UTC-6");
    assert_eq!((status.minute, status.second), (15, 42));
    assert_eq!(status.version_str(), env!("CARGO_PKG_VERSION"));
    assert_eq!(status.error_code, FaultCode::None);
}

#[test]
fn send_failures_do_not_stall_the_loop() {
    let mut rig = Rig::new();
    rig.link.fail.store(true, std::sync::atomic::Ordering::Relaxed);
    rig.run(500);
    assert_eq!(rig.app.tick_count(), 50);
    assert!(rig.link.frames().is_empty());
}

#[test]
fn telemetry_logged_periodically() {
    let mut rig = Rig::new();
    rig.run(10_000);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 2);
}

#[test]
fn runtime_config_update_and_save() {
    let mut rig = Rig::new();
    let cfg = ControllerConfig {
        status_interval_ms: 100,
        ..ControllerConfig::default()
    };
    rig.app
        .handle_command(AppCommand::UpdateConfig(cfg.clone()), rig.link.as_ref(), &mut rig.nvs, &mut rig.sink);
    rig.run(1000);
    assert_eq!(rig.link.status_frames().len(), 10);

    rig.app
        .handle_command(AppCommand::SaveConfig, rig.link.as_ref(), &mut rig.nvs, &mut rig.sink);
    assert_eq!(rig.nvs.load().unwrap(), cfg);
}
