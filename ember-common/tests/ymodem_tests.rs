// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for the YMODEM-1K receiver state machine.

mod support;

use ember_common::flash::Flash;
use ember_common::layout::{Bank, BANK_SIZE, CONFIG_ADDR, CONFIG_AREA_SIZE};
use ember_common::sim::SimFlash;
use ember_common::ymodem::{
    Receiver, SessionStatus, ACK, CAN, CRC_KICKOFF, NAK, SESSION_CLOSE,
};

use support::{
    build_image, close_frame, data_frames, eot_frame, header_frame, run_session, sample_payload,
    session_frames,
};

fn make_receiver() -> (Receiver, SimFlash) {
    (Receiver::new(Bank::A.addr()), SimFlash::new())
}

fn small_image() -> Vec<u8> {
    build_image(&sample_payload(1500), (1, 0, 0), 7)
}

// =============================================================================
// session kickoff
// =============================================================================

#[test]
fn test_header_block_acked_and_invited() {
    let (mut rx, mut flash) = make_receiver();
    // Leave junk in the bank to prove the header erases it.
    flash.poke(Bank::A.addr() + 100, 0x55);

    let reply = rx.handle_frame(&header_frame("app.img", 1524), &mut flash);
    assert_eq!(&reply[..], &[ACK, CRC_KICKOFF]);
    assert_eq!(rx.file_size(), 1524);
    assert_eq!(rx.bytes_received(), 0);
    assert_eq!(flash.snapshot(Bank::A.addr() + 100, 1)[0], 0xFF);
}

#[test]
fn test_line_noise_before_header_is_ignored() {
    let (mut rx, mut flash) = make_receiver();
    assert!(rx.handle_frame(&[0x1B, 0x5B, 0x41], &mut flash).is_empty());
    assert!(rx.handle_frame(&[], &mut flash).is_empty());
    assert!(rx.is_waiting());
}

#[test]
fn test_zero_size_header_refused() {
    let (mut rx, mut flash) = make_receiver();
    let reply = rx.handle_frame(&header_frame("", 0), &mut flash);
    assert_eq!(&reply[..], &[NAK]);
    assert!(rx.is_waiting());
}

#[test]
fn test_oversized_announcement_refused() {
    let (mut rx, mut flash) = make_receiver();
    let reply = rx.handle_frame(&header_frame("big.img", BANK_SIZE as usize + 1), &mut flash);
    assert_eq!(&reply[..], &[NAK]);
    assert!(rx.is_waiting());
}

// =============================================================================
// data phase
// =============================================================================

#[test]
fn test_blocks_stream_into_flash() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);
    for frame in data_frames(&image) {
        let reply = rx.handle_frame(&frame, &mut flash);
        assert_eq!(&reply[..], &[ACK]);
    }

    assert_eq!(rx.bytes_received(), image.len() as u32);
    assert_eq!(flash.snapshot(Bank::A.addr(), image.len() as u32), &image[..]);
}

#[test]
fn test_sender_padding_not_written_past_file_size() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image(); // 1524 bytes: second block is half padding

    run_session(&mut rx, &mut flash, "app.img", &image);

    let after = flash.snapshot(Bank::A.addr() + image.len() as u32, 64);
    assert!(after.iter().all(|&b| b == 0xFF));
}

#[test]
fn test_corrupt_block_naked_and_retransmit_accepted() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();
    let frames = data_frames(&image);

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);

    let mut bad = frames[0].clone();
    bad[40] ^= 0xFF;
    let reply = rx.handle_frame(&bad, &mut flash);
    assert_eq!(&reply[..], &[NAK]);
    assert_eq!(rx.bytes_received(), 0);

    // The erased range was not touched, so the retransmit lands cleanly.
    let reply = rx.handle_frame(&frames[0], &mut flash);
    assert_eq!(&reply[..], &[ACK]);
    assert_eq!(rx.bytes_received(), 1024);
}

#[test]
fn test_truncated_frame_naked() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();
    let frames = data_frames(&image);

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);
    let reply = rx.handle_frame(&frames[0][..200], &mut flash);
    assert_eq!(&reply[..], &[NAK]);
    assert_eq!(rx.bytes_received(), 0);
}

#[test]
fn test_unexpected_byte_resets_session() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);
    let reply = rx.handle_frame(&[0x99], &mut flash);
    assert!(reply.is_empty());
    assert!(rx.is_waiting());
    assert_eq!(rx.status(), SessionStatus::InProgress);
}

// =============================================================================
// end of transfer
// =============================================================================

#[test]
fn test_eot_dance_and_close() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);
    for frame in data_frames(&image) {
        rx.handle_frame(&frame, &mut flash);
    }

    // First EOT gets a NAK, the second an ACK plus a fresh kickoff.
    assert_eq!(&rx.handle_frame(&eot_frame(), &mut flash)[..], &[NAK]);
    assert_eq!(
        &rx.handle_frame(&eot_frame(), &mut flash)[..],
        &[ACK, CRC_KICKOFF]
    );
    assert_eq!(rx.status(), SessionStatus::Complete);

    // Null header closes the session.
    assert_eq!(
        &rx.handle_frame(&close_frame(), &mut flash)[..],
        &[ACK, SESSION_CLOSE]
    );
}

#[test]
fn test_session_replies_end_to_end() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();

    let replies = run_session(&mut rx, &mut flash, "app.img", &image);

    let n = replies.len();
    assert_eq!(replies[0], vec![ACK, CRC_KICKOFF]);
    for reply in &replies[1..n - 3] {
        assert_eq!(reply, &vec![ACK]);
    }
    assert_eq!(replies[n - 3], vec![NAK]);
    assert_eq!(replies[n - 2], vec![ACK, CRC_KICKOFF]);
    assert_eq!(replies[n - 1], vec![ACK, SESSION_CLOSE]);
    assert_eq!(rx.status(), SessionStatus::Complete);
}

// =============================================================================
// isolation and idempotence
// =============================================================================

#[test]
fn test_session_leaves_other_bank_untouched() {
    let (mut rx, mut flash) = make_receiver();

    // Something is already living in bank B and the config area.
    let resident = build_image(&sample_payload(900), (0, 9, 0), 3);
    flash.program(Bank::B.addr(), &resident).unwrap();
    flash.program(CONFIG_ADDR, &[0x42; 60]).unwrap();
    let bank_b_before = flash.snapshot(Bank::B.addr(), BANK_SIZE).to_vec();
    let config_before = flash.snapshot(CONFIG_ADDR, CONFIG_AREA_SIZE).to_vec();

    run_session(&mut rx, &mut flash, "app.img", &small_image());

    assert_eq!(flash.snapshot(Bank::B.addr(), BANK_SIZE), &bank_b_before[..]);
    assert_eq!(
        flash.snapshot(CONFIG_ADDR, CONFIG_AREA_SIZE),
        &config_before[..]
    );
}

#[test]
fn test_replayed_session_yields_identical_flash() {
    let image = small_image();

    let (mut rx, mut flash) = make_receiver();
    run_session(&mut rx, &mut flash, "app.img", &image);
    let first = flash.snapshot(Bank::A.addr(), BANK_SIZE).to_vec();

    rx.reset(Bank::A.addr());
    run_session(&mut rx, &mut flash, "app.img", &image);

    assert_eq!(flash.snapshot(Bank::A.addr(), BANK_SIZE), &first[..]);
}

// =============================================================================
// flash failure
// =============================================================================

#[test]
fn test_program_failure_cancels_session() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();
    let frames = data_frames(&image);

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);

    flash.program_limit = Some(100);
    let reply = rx.handle_frame(&frames[0], &mut flash);
    assert_eq!(&reply[..], &[CAN, CAN]);
    assert_eq!(rx.status(), SessionStatus::Failed);
}

#[test]
fn test_new_header_recovers_from_failed_session() {
    let (mut rx, mut flash) = make_receiver();
    let image = small_image();
    let frames = data_frames(&image);

    rx.handle_frame(&header_frame("app.img", image.len()), &mut flash);
    flash.program_limit = Some(100);
    rx.handle_frame(&frames[0], &mut flash);
    flash.program_limit = None;

    let replies = run_session(&mut rx, &mut flash, "app.img", &image);
    assert_eq!(replies[0], vec![ACK, CRC_KICKOFF]);
    assert_eq!(rx.status(), SessionStatus::Complete);
    assert_eq!(flash.snapshot(Bank::A.addr(), image.len() as u32), &image[..]);
}
