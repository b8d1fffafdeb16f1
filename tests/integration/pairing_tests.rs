//! Pairing button, pair request handling and peer persistence.

use seedmeter::app::commands::AppCommand;
use seedmeter::app::events::AppEvent;
use seedmeter::config::ControlConfig;
use seedmeter::link::packet::{pair_ack, pair_request};
use seedmeter::link::pairing::{BROADCAST_ADDR, PairingState, PeerIdentity};
use seedmeter::persist;

use super::mock_hw::{Rig, SCREEN};

fn enter_pairing_mode(rig: &mut Rig) {
    rig.hw.pair_button = true;
    rig.run(3100);
    rig.hw.pair_button = false;
    rig.run(10);
    assert!(matches!(rig.app.pairing_state(), PairingState::PairingMode { .. }));
}

#[test]
fn request_outside_pairing_mode_is_ignored() {
    let mut rig = Rig::new();
    rig.receive(SCREEN, &pair_request());
    rig.run(10);

    assert_eq!(rig.link.frames_equal_to(&pair_ack()), 0);
    assert_eq!(rig.app.pairing_state(), PairingState::Unpaired);
    assert_eq!(rig.shared.peer(), PeerIdentity::broadcast());
    assert_eq!(persist::load_peer(&rig.nvs).unwrap(), None);
}

#[test]
fn short_press_does_not_enter_pairing_mode() {
    let mut rig = Rig::new();
    rig.hw.pair_button = true;
    rig.run(2900);
    rig.hw.pair_button = false;
    rig.run(500);
    assert_eq!(rig.app.pairing_state(), PairingState::Unpaired);
    assert!(!rig.sink.contains(&AppEvent::PairingModeEntered));
}

#[test]
fn long_hold_enters_pairing_mode_once() {
    let mut rig = Rig::new();
    rig.hw.pair_button = true;
    rig.run(6000);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::PairingModeEntered), 1);
}

#[test]
fn cal_led_blinks_while_pairing() {
    let mut rig = Rig::new();
    enter_pairing_mode(&mut rig);
    let mut seen = [false; 2];
    for _ in 0..60 {
        rig.run(10);
        seen[usize::from(rig.hw.cal_led)] = true;
    }
    assert_eq!(seen, [true, true]);
}

#[test]
fn pair_request_in_pairing_mode_is_acked_once() {
    let mut rig = Rig::new();
    enter_pairing_mode(&mut rig);
    rig.link.clear();

    rig.receive(SCREEN, &pair_request());
    rig.receive(SCREEN, &pair_request());
    rig.run(10);

    let acks: Vec<_> = rig
        .link
        .frames()
        .into_iter()
        .filter(|(_, d)| d.as_slice() == pair_ack().as_slice())
        .collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].0, SCREEN);

    assert_eq!(rig.app.pairing_state(), PairingState::Paired);
    assert_eq!(rig.shared.peer(), PeerIdentity::paired(SCREEN));
    assert!(rig.link.is_peer(&SCREEN));
    assert!(rig.sink.contains(&AppEvent::Paired { addr: SCREEN }));
    assert_eq!(persist::load_peer(&rig.nvs).unwrap(), Some(PeerIdentity::paired(SCREEN)));

    // Status now goes to the screen instead of broadcast.
    rig.run(200);
    let (addr, _) = *rig.link.status_frames().last().unwrap();
    assert_eq!(addr, SCREEN);
}

#[test]
fn pairing_mode_times_out() {
    let mut rig = Rig::new();
    enter_pairing_mode(&mut rig);
    rig.run(60_000);
    assert!(rig.sink.contains(&AppEvent::PairingTimedOut));
    assert_eq!(rig.app.pairing_state(), PairingState::Unpaired);

    rig.receive(SCREEN, &pair_request());
    rig.run(10);
    assert_eq!(rig.link.frames_equal_to(&pair_ack()), 0);
}

#[test]
fn persisted_peer_is_restored_at_start() {
    let rig = Rig::with(ControlConfig::default(), PeerIdentity::paired(SCREEN));
    assert_eq!(rig.app.pairing_state(), PairingState::Paired);
    assert!(rig.link.is_peer(&SCREEN));
}

#[test]
fn forget_peer_returns_to_broadcast() {
    let mut rig = Rig::new();
    enter_pairing_mode(&mut rig);
    rig.receive(SCREEN, &pair_request());
    rig.run(10);

    rig.app
        .handle_command(AppCommand::ForgetPeer, rig.link.as_ref(), &mut rig.nvs, &mut rig.sink);
    assert_eq!(rig.shared.peer(), PeerIdentity::broadcast());
    assert_eq!(rig.app.pairing_state(), PairingState::Unpaired);
    assert!(!rig.link.is_peer(&SCREEN));
    assert_eq!(persist::load_peer(&rig.nvs).unwrap(), None);
    assert!(rig.sink.contains(&AppEvent::PeerForgotten));

    rig.link.clear();
    rig.run(200);
    assert!(rig.link.status_frames().iter().all(|(a, _)| *a == BROADCAST_ADDR));
}

#[test]
fn repairing_replaces_the_registered_screen() {
    const OTHER: [u8; 6] = [0x24, 0x6F, 0x28, 0x44, 0x55, 0x66];
    let mut rig = Rig::new();
    enter_pairing_mode(&mut rig);
    rig.receive(SCREEN, &pair_request());
    rig.run(10);
    assert!(rig.link.is_peer(&SCREEN));

    enter_pairing_mode(&mut rig);
    rig.receive(OTHER, &pair_request());
    rig.run(10);

    assert!(rig.link.is_peer(&OTHER));
    assert!(!rig.link.is_peer(&SCREEN));
    assert_eq!(rig.link.peers.lock().unwrap().len(), 1);
    assert_eq!(rig.shared.peer(), PeerIdentity::paired(OTHER));
    assert_eq!(persist::load_peer(&rig.nvs).unwrap(), Some(PeerIdentity::paired(OTHER)));
}

#[test]
fn ten_second_hold_forgets_the_screen() {
    let mut rig = Rig::with(ControlConfig::default(), PeerIdentity::paired(SCREEN));
    persist::save_peer(&mut rig.nvs, &PeerIdentity::paired(SCREEN)).unwrap();

    rig.hw.pair_button = true;
    rig.run(9_000);
    assert!(matches!(rig.app.pairing_state(), PairingState::PairingMode { .. }));
    rig.run(1_100);
    rig.hw.pair_button = false;
    rig.run(10);

    assert_eq!(rig.app.pairing_state(), PairingState::Unpaired);
    assert_eq!(rig.shared.peer(), PeerIdentity::broadcast());
    assert!(!rig.link.is_peer(&SCREEN));
    assert_eq!(persist::load_peer(&rig.nvs).unwrap(), None);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::PeerForgotten), 1);
}
