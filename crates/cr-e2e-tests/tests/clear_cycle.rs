//! E2E tests for clearing trouble codes.

mod helpers;

use cr_agent::format::{CLEAR_ERROR_MESSAGE, CLEARED_MESSAGE};
use cr_canbus::safety;
use cr_canbus::CanFrame;
use cr_canbus::types::{MODE_CLEAR_DTCS, MODE_STORED_DTCS};
use cr_protocol::events::CodeEvent;

use helpers::{
    TestHarness, engine_frame, script_clear_confirmation, script_vehicle_with_codes,
};

#[test]
fn e2e_clear_confirmed() {
    let mut h = TestHarness::new();
    script_clear_confirmation(&h.bus);

    h.press(b'c');
    h.tick(5);

    assert_eq!(h.console(), vec!["Clearing codes...", CLEARED_MESSAGE]);
    assert_eq!(h.take_events(), vec![CodeEvent::Clear, CodeEvent::Cleared]);
    assert_eq!(h.bus.requested_services(), vec![MODE_CLEAR_DTCS]);
}

#[test]
fn e2e_clear_with_ignition_off() {
    let mut h = TestHarness::new();

    h.press(b'c');
    h.tick(5);

    assert_eq!(h.console(), vec!["Clearing codes...", CLEAR_ERROR_MESSAGE]);
    assert_eq!(h.take_events(), vec![CodeEvent::Clear, CodeEvent::Error]);
}

#[test]
fn e2e_clear_rejected_by_every_ecu() {
    let mut h = TestHarness::new();
    // 0x22: conditions not correct.
    h.bus
        .reply_to(MODE_CLEAR_DTCS, vec![engine_frame(&[0x03, 0x7F, 0x04, 0x22])]);

    h.press(b'c');
    h.tick(5);

    assert_eq!(h.take_events(), vec![CodeEvent::Clear, CodeEvent::Error]);
}

#[test]
fn e2e_clear_reports_exactly_once() {
    let mut h = TestHarness::new();
    script_clear_confirmation(&h.bus);

    h.press(b'c');
    h.tick(1_000);

    assert_eq!(h.take_events().len(), 2);
    assert_eq!(h.bus.requested_services().len(), 1);
}

#[test]
fn e2e_only_whitelisted_services_reach_the_bus() {
    let mut h = TestHarness::new();
    script_clear_confirmation(&h.bus);
    helpers::script_vehicle_with_codes(&h.bus);

    h.press(b'r');
    h.tick(5);
    h.press(b'c');
    h.tick(5);

    let services = h.bus.requested_services();
    assert_eq!(services, vec![0x03, 0x07, 0x0A, 0x04]);
    assert!(services.iter().all(|s| safety::is_service_allowed(*s)));
}

#[test]
fn e2e_read_and_clear_started_in_the_same_tick() {
    let mut h = TestHarness::new();
    script_vehicle_with_codes(&h.bus);
    script_clear_confirmation(&h.bus);

    h.press(b'r');
    h.call("clearCodes");
    h.tick(10);

    // The clear window closes first; the read needs one tick per service.
    assert_eq!(
        h.take_events(),
        vec![
            CodeEvent::Start,
            CodeEvent::Clear,
            CodeEvent::Cleared,
            CodeEvent::Result("P0415s,P0010p,U0300c".into()),
        ]
    );
}

#[test]
fn e2e_clear_during_multi_frame_read_sends_one_flow_control() {
    let mut h = TestHarness::new();
    script_clear_confirmation(&h.bus);
    h.bus.reply_to(
        MODE_STORED_DTCS,
        vec![
            engine_frame(&[0x04, 0x43, 0x01, 0x01, 0x71]),
            CanFrame::new(0x7E9, vec![0x10, 0x0A, 0x43, 0x04, 0x04, 0x15, 0x00, 0x10]),
            CanFrame::new(0x7E9, vec![0x21, 0xC3, 0x00, 0x40, 0x35, 0, 0, 0]),
        ],
    );

    // Clearer is already listening when the reader's long answer arrives.
    h.press(b'c');
    h.call("readCodes");
    h.tick(10);

    assert_eq!(
        h.take_events(),
        vec![
            CodeEvent::Clear,
            CodeEvent::Start,
            CodeEvent::Cleared,
            CodeEvent::Result("P0171s,P0415s,P0010s,U0300s,C0035s".into()),
        ]
    );
    let flow_controls: Vec<_> = h
        .bus
        .sent_frames()
        .into_iter()
        .filter(|f| f.data.first().is_some_and(|b| b >> 4 == 0x3))
        .collect();
    assert_eq!(flow_controls.len(), 1);
    assert_eq!(flow_controls[0].id, 0x7E1);
}
