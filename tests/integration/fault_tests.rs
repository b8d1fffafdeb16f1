//! Stall latch, motor cut, status burst and acknowledgement gating.

use std::sync::Arc;

use seedmeter::app::events::AppEvent;
use seedmeter::error::FaultCode;
use seedmeter::fault::StallGuard;
use seedmeter::link::packet::CommandPacket;
use seedmeter::link::pairing::PeerIdentity;

use super::mock_hw::{MockCutoff, MockLink, NoDelay, Rig, calibrated_control, field_command};

fn engaged_rig() -> Rig {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.hw.work_switch = true;
    rig.run(100);
    rig
}

fn guard(rig: &Rig) -> (StallGuard<MockLink, MockCutoff>, MockCutoff) {
    let cutoff = MockCutoff::default();
    let guard = StallGuard::new(&rig.config, Arc::clone(&rig.shared), Arc::clone(&rig.link), cutoff.clone());
    (guard, cutoff)
}

/// Poll the guard every 10 ms over `ms`; returns how many polls latched.
fn poll_for(guard: &mut StallGuard<MockLink, MockCutoff>, from: u64, ms: u64, delay: &mut NoDelay) -> usize {
    (from..=from + ms)
        .step_by(10)
        .filter(|&t| guard.poll(t, delay))
        .count()
}

#[test]
fn stalled_shaft_latches_and_cuts_motor() {
    let mut rig = engaged_rig();
    assert!(rig.hw.duty > 0);
    let (mut guard, cutoff) = guard(&rig);
    let mut delay = NoDelay::default();
    rig.link.clear();

    assert_eq!(poll_for(&mut guard, rig.now, 190, &mut delay), 0);
    assert!(guard.poll(rig.now + 200, &mut delay));

    assert!(cutoff.was_cut());
    assert_eq!(rig.shared.fault.code(), FaultCode::ShaftStall);
    assert_eq!(rig.shared.motor_duty(), 0);

    // Fire-and-forget burst: three copies, 20 ms apart.
    let burst = rig.link.status_frames();
    assert_eq!(burst.len(), 3);
    assert!(burst.iter().all(|(_, s)| s.error_code == FaultCode::ShaftStall && s.error_raised));
    assert_eq!(delay.total_ns, 40_000_000);

    // The control loop keeps the motor off on its next cycle.
    rig.run(10);
    assert_eq!(rig.hw.duty, 0);
    assert_eq!(rig.app.duty(), 0);
}

#[test]
fn latched_stall_is_not_re_entered() {
    let rig = engaged_rig();
    let (mut guard, _) = guard(&rig);
    let mut delay = NoDelay::default();
    assert_eq!(poll_for(&mut guard, rig.now, 1000, &mut delay), 1);
    assert_eq!(rig.link.status_frames().iter().filter(|(_, s)| s.error_raised).count(), 3);
}

#[test]
fn ack_clears_stall_only_with_switch_lifted() {
    let mut rig = engaged_rig();
    let (mut guard, _) = guard(&rig);
    let mut delay = NoDelay::default();
    poll_for(&mut guard, rig.now, 200, &mut delay);
    assert_eq!(rig.shared.fault.code(), FaultCode::ShaftStall);

    let ack = CommandPacket {
        error_ack: true,
        ..field_command()
    };
    rig.command(&ack);
    assert_eq!(rig.shared.fault.code(), FaultCode::ShaftStall, "cleared while engaged");
    assert_eq!(rig.hw.duty, 0);

    rig.hw.work_switch = false;
    rig.run(100);
    rig.command(&ack);
    assert_eq!(rig.shared.fault.code(), FaultCode::None);
    assert!(rig.sink.contains(&AppEvent::FaultChanged {
        from: FaultCode::ShaftStall,
        to: FaultCode::None,
    }));

    // Lowering the implement again resumes the drive.
    rig.hw.work_switch = true;
    rig.run(100);
    assert!(rig.hw.duty > 0);
}

#[test]
fn disabled_protection_never_trips() {
    let mut rig = engaged_rig();
    rig.command(&CommandPacket {
        stall_protection: false,
        ..field_command()
    });
    let (mut guard, cutoff) = guard(&rig);
    let mut delay = NoDelay::default();
    assert_eq!(poll_for(&mut guard, rig.now, 2000, &mut delay), 0);
    assert!(!cutoff.was_cut());
}

#[test]
fn lifted_implement_never_trips() {
    let mut rig = Rig::with(calibrated_control(), PeerIdentity::broadcast());
    rig.run(100);
    let (mut guard, _) = guard(&rig);
    let mut delay = NoDelay::default();
    assert_eq!(poll_for(&mut guard, rig.now, 2000, &mut delay), 0);
    assert_eq!(rig.shared.fault.code(), FaultCode::None);
}

#[test]
fn stall_window_comes_from_the_screen() {
    let mut rig = engaged_rig();
    rig.command(&CommandPacket {
        stall_delay_ms: 1000,
        ..field_command()
    });
    let (mut guard, _) = guard(&rig);
    let mut delay = NoDelay::default();
    let start = rig.now;
    assert_eq!(poll_for(&mut guard, start, 990, &mut delay), 0);
    assert!(guard.poll(start + 1000, &mut delay));
}
