//! Catch-test calibration, manual overrides and persistence.

use seedmeter::app::commands::AppCommand;
use seedmeter::app::events::AppEvent;
use seedmeter::config::ControlConfig;
use seedmeter::link::packet::CommandPacket;
use seedmeter::persist;

use super::mock_hw::{Rig, field_command};

fn cal_command() -> CommandPacket {
    CommandPacket {
        calibration_mode: true,
        calibration_weight: 12.5,
        calibration_runs: 8,
        ..field_command()
    }
}

/// Enter calibration mode and turn the meter `revs` whole revolutions.
fn catch_run(rig: &mut Rig, revs: i16) {
    rig.command(&cal_command());
    for _ in 0..revs / 4 {
        rig.hw.turn(4 * 1024);
        rig.run(10);
    }
}

#[test]
fn catch_test_computes_and_persists_seed_per_rev() {
    let mut rig = Rig::new();
    catch_run(&mut rig, 400);
    assert!((rig.app.reading().revolutions - 400.0).abs() < 1e-3);

    rig.command(&CommandPacket {
        calc_seed_per_rev: true,
        ..cal_command()
    });

    let spr = rig.shared.control().seed_per_rev;
    assert!((spr - 0.25).abs() < 1e-6, "12.5 lb × 8 runs / 400 revs, got {spr}");
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Calibrated { seed_per_rev, revolutions }
            if (*seed_per_rev - 0.25).abs() < 1e-6 && (*revolutions - 400.0).abs() < 1e-3
    )));

    let rec = persist::load_calibration(&rig.nvs).unwrap().unwrap();
    assert!((rec.seed_per_rev - 0.25).abs() < 1e-6);
    assert!((rec.cal_revs - 400.0).abs() < 1e-3);
    assert_eq!(rec.cal_weight, 12.5);
    assert_eq!(rec.target_rate, 10.0);

    // The status packet carries the new constant.
    rig.run(200);
    let (_, status) = *rig.link.status_frames().last().unwrap();
    assert!((status.seed_per_rev - 0.25).abs() < 1e-6);
}

#[test]
fn next_calibration_command_resets_revolutions() {
    let mut rig = Rig::new();
    catch_run(&mut rig, 40);
    rig.command(&CommandPacket {
        calc_seed_per_rev: true,
        ..cal_command()
    });
    assert!(rig.app.reading().revolutions > 39.0, "calc must not reset by itself");

    rig.command(&cal_command());
    assert_eq!(rig.app.reading().revolutions, 0.0);
    assert_eq!(rig.shared.revolutions.load(), 0.0);

    // Only once per calculation.
    rig.hw.turn(2048);
    rig.run(10);
    rig.command(&cal_command());
    assert!((rig.app.reading().revolutions - 2.0).abs() < 1e-3);
}

#[test]
fn zero_revolutions_yield_zero_seed_per_rev() {
    let mut rig = Rig::new();
    rig.command(&CommandPacket {
        calc_seed_per_rev: true,
        ..cal_command()
    });
    assert_eq!(rig.shared.control().seed_per_rev, 0.0);
}

#[test]
fn manual_seed_per_rev_is_applied_and_persisted() {
    let mut rig = Rig::new();
    rig.command(&CommandPacket {
        manual_seed_update: true,
        new_seed_per_rev: 0.07,
        ..field_command()
    });
    assert_eq!(rig.shared.control().seed_per_rev, 0.07);
    assert!(rig.sink.contains(&AppEvent::SeedPerRevSet(0.07)));

    let mut restored = ControlConfig::default();
    persist::load_calibration(&rig.nvs).unwrap().unwrap().apply(&mut restored);
    assert_eq!(restored.seed_per_rev, 0.07);
}

#[test]
fn commands_do_not_touch_seed_per_rev() {
    let mut rig = Rig::new();
    rig.command(&CommandPacket {
        manual_seed_update: true,
        new_seed_per_rev: 0.07,
        ..field_command()
    });
    rig.command(&CommandPacket {
        new_seed_per_rev: 0.5,
        ..field_command()
    });
    assert_eq!(rig.shared.control().seed_per_rev, 0.07);
}

#[test]
fn clear_calibration_forgets_the_constant() {
    let mut rig = Rig::new();
    rig.command(&CommandPacket {
        manual_seed_update: true,
        new_seed_per_rev: 0.07,
        ..field_command()
    });
    rig.app
        .handle_command(AppCommand::ClearCalibration, rig.link.as_ref(), &mut rig.nvs, &mut rig.sink);
    assert_eq!(rig.shared.control().seed_per_rev, 0.0);
    assert_eq!(persist::load_calibration(&rig.nvs).unwrap(), None);
}

#[test]
fn cal_held_at_boot_clears_calibration() {
    let mut rig = Rig::new();
    rig.command(&CommandPacket {
        manual_seed_update: true,
        new_seed_per_rev: 0.07,
        ..field_command()
    });
    assert!(persist::load_calibration(&rig.nvs).unwrap().is_some());

    rig.hw.cal_button = false;
    rig.app.boot_buttons(&mut rig.hw, &mut rig.nvs);
    assert_eq!(rig.shared.control().seed_per_rev, 0.07);

    rig.hw.cal_button = true;
    rig.app.boot_buttons(&mut rig.hw, &mut rig.nvs);
    assert_eq!(rig.shared.control().seed_per_rev, 0.0);
    assert_eq!(persist::load_calibration(&rig.nvs).unwrap(), None);
}
