// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared builders: firmware images and the sender side of a YMODEM-1K
//! session, so the tests can drive the receiver the way a host would.

// Each test crate pulls in the subset it needs.
#![allow(dead_code)]

use ember_common::crc::{crc16, crc32};
use ember_common::image::FirmwareInfo;
use ember_common::sim::SimFlash;
use ember_common::ymodem::{Receiver, EOT, SOH, STX};
use ember_common::FIRMWARE_VALID_FLAG;

/// An initial stack pointer inside the 20 KiB SRAM window.
pub const SAMPLE_SP: u32 = 0x2000_4FF0;
/// A thumb-mode reset vector somewhere in bank A.
pub const SAMPLE_RESET: u32 = 0x0800_4819;

/// Application payload of `len` bytes: vector table words first, then a
/// deterministic byte pattern.
pub fn sample_payload(len: usize) -> Vec<u8> {
    assert!(len >= 8, "payload needs at least SP + reset vector");
    let mut payload = vec![0u8; len];
    payload[0..4].copy_from_slice(&SAMPLE_SP.to_le_bytes());
    payload[4..8].copy_from_slice(&SAMPLE_RESET.to_le_bytes());
    for (i, b) in payload[8..].iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    payload
}

/// 24-byte header + payload, with the CRC the header promises.
pub fn build_image(payload: &[u8], version: (u8, u8, u8), timestamp: u32) -> Vec<u8> {
    let info = FirmwareInfo {
        version_major: version.0,
        version_minor: version.1,
        version_patch: version.2,
        firmware_size: payload.len() as u32,
        firmware_crc32: crc32(payload),
        build_timestamp: timestamp,
        is_valid: FIRMWARE_VALID_FLAG,
        ..FirmwareInfo::invalid()
    };

    let mut image = info.as_bytes().to_vec();
    image.extend_from_slice(payload);
    image
}

fn frame(kind: u8, seq: u8, data: &[u8]) -> Vec<u8> {
    let mut f = Vec::with_capacity(data.len() + 5);
    f.push(kind);
    f.push(seq);
    f.push(!seq);
    f.extend_from_slice(data);
    f.extend_from_slice(&crc16(data).to_be_bytes());
    f
}

/// YMODEM header block: NUL-terminated name, ASCII-decimal size, zero fill.
pub fn header_frame(name: &str, size: usize) -> Vec<u8> {
    let mut data = [0u8; 128];
    let name = name.as_bytes();
    data[..name.len()].copy_from_slice(name);
    let size = size.to_string();
    data[name.len() + 1..name.len() + 1 + size.len()].copy_from_slice(size.as_bytes());
    frame(SOH, 0, &data)
}

/// 1024-byte STX data blocks with sequence numbers starting at 1; the last
/// block is padded with 0x1A as senders do.
pub fn data_frames(image: &[u8]) -> Vec<Vec<u8>> {
    image
        .chunks(1024)
        .enumerate()
        .map(|(i, chunk)| {
            let mut data = [0x1Au8; 1024];
            data[..chunk.len()].copy_from_slice(chunk);
            frame(STX, (i + 1) as u8, &data)
        })
        .collect()
}

pub fn eot_frame() -> Vec<u8> {
    vec![EOT]
}

/// Session-terminating null header block.
pub fn close_frame() -> Vec<u8> {
    frame(SOH, 0, &[0u8; 128])
}

/// Every frame of a complete single-file session, in order.
pub fn session_frames(name: &str, image: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = vec![header_frame(name, image.len())];
    frames.extend(data_frames(image));
    frames.push(eot_frame());
    frames.push(eot_frame());
    frames.push(close_frame());
    frames
}

/// Play a full session into the receiver, returning the reply to each frame.
pub fn run_session(rx: &mut Receiver, flash: &mut SimFlash, name: &str, image: &[u8]) -> Vec<Vec<u8>> {
    session_frames(name, image)
        .iter()
        .map(|f| rx.handle_frame(f, flash).to_vec())
        .collect()
}
