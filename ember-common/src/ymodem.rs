// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! YMODEM-1K receiver state machine.
//!
//! Pure protocol logic: the receiver knows its target bank base address and
//! a [`Flash`] to stream blocks into, nothing else. The caller (frame timer
//! on target, the test harness on the host) feeds it one coalesced frame at
//! a time and transmits whatever control bytes come back. All persistent
//! state transitions around a download belong to the boot orchestrator.

use heapless::Vec;

use crate::crc::crc16;
use crate::flash::Flash;
use crate::layout::{BANK_PAGES, BANK_SIZE, IMAGE_HEADER_SIZE};

pub const SOH: u8 = 0x01; // 128-byte block
pub const STX: u8 = 0x02; // 1024-byte block
pub const EOT: u8 = 0x04;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
pub const CAN: u8 = 0x18;
pub const CRC_KICKOFF: u8 = 0x43; // 'C'
pub const SESSION_CLOSE: u8 = 0x4F; // 'O'

/// Largest logical frame the serial framer coalesces (STX block + framing,
/// with headroom), and the capacity of the RX byte queue feeding it.
pub const FRAME_CAPACITY: usize = 1200;

/// Inter-byte silence that marks a frame boundary.
pub const FRAME_GAP_MS: u32 = 20;

/// Control bytes to transmit in response to one frame.
pub type Reply = Vec<u8, 2>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    WaitingHeader,
    Receiving,
    EndAck,
    Closing,
}

/// Where a session currently stands, as seen by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    /// Transfer finished; the image is in flash awaiting verification.
    Complete,
    /// Flash refused an erase or program; the bank contents are garbage.
    Failed,
}

pub struct Receiver {
    state: State,
    target: u32,
    write_cursor: u32,
    bytes_received: u32,
    file_size: u32,
    packet_count: u16,
    complete: bool,
    failed: bool,
}

impl Receiver {
    pub fn new(target: u32) -> Self {
        Self {
            state: State::WaitingHeader,
            target,
            write_cursor: target,
            bytes_received: 0,
            file_size: 0,
            packet_count: 0,
            complete: false,
            failed: false,
        }
    }

    /// Drop all session state and re-arm for `target`.
    pub fn reset(&mut self, target: u32) {
        *self = Self::new(target);
    }

    pub fn status(&self) -> SessionStatus {
        if self.failed {
            SessionStatus::Failed
        } else if self.complete {
            SessionStatus::Complete
        } else {
            SessionStatus::InProgress
        }
    }

    /// True while no transfer has started; the receiver side keeps
    /// emitting the `C` kickoff in this state.
    pub fn is_waiting(&self) -> bool {
        self.state == State::WaitingHeader && !self.complete && !self.failed
    }

    pub fn bytes_received(&self) -> u32 {
        self.bytes_received
    }

    pub fn file_size(&self) -> u32 {
        self.file_size
    }

    pub fn packet_count(&self) -> u16 {
        self.packet_count
    }

    /// Consume one coalesced frame and return the control bytes to send.
    pub fn handle_frame<F: Flash + ?Sized>(&mut self, frame: &[u8], flash: &mut F) -> Reply {
        let mut reply = Reply::new();
        let Some(&kind) = frame.first() else {
            return reply;
        };

        match self.state {
            State::WaitingHeader => {
                if kind == SOH {
                    self.start_session(frame, flash, &mut reply);
                }
                // Anything else on an idle line is noise; stay quiet.
            }
            State::Receiving => match kind {
                SOH | STX => self.receive_block(kind, frame, flash, &mut reply),
                EOT => {
                    // NAK the first EOT, ACK the second.
                    let _ = reply.push(NAK);
                    self.state = State::EndAck;
                }
                _ => {
                    // Out of sequence: drop the session, host restarts.
                    self.state = State::WaitingHeader;
                }
            },
            State::EndAck => {
                if kind == EOT {
                    let _ = reply.push(ACK);
                    let _ = reply.push(CRC_KICKOFF);
                    self.complete = true;
                    self.state = State::Closing;
                }
            }
            State::Closing => {
                if kind == SOH {
                    let _ = reply.push(ACK);
                    let _ = reply.push(SESSION_CLOSE);
                }
                self.state = State::WaitingHeader;
            }
        }

        reply
    }

    /// Header block: parse the file name and decimal size, erase the target
    /// bank and invite the data phase with ACK + `C`.
    fn start_session<F: Flash + ?Sized>(
        &mut self,
        frame: &[u8],
        flash: &mut F,
        reply: &mut Reply,
    ) {
        let file_size = parse_file_size(frame.get(3..).unwrap_or(&[]));

        // An empty or oversized announcement would stream past the end of
        // the bank; refuse it while still idle.
        if file_size == 0 || file_size > BANK_SIZE {
            let _ = reply.push(NAK);
            return;
        }

        if flash.erase(self.target, BANK_PAGES).is_err() {
            self.fail(reply);
            return;
        }

        self.write_cursor = self.target;
        self.bytes_received = 0;
        self.packet_count = 0;
        self.file_size = file_size;
        self.complete = false;
        self.failed = false;

        let _ = reply.push(ACK);
        let _ = reply.push(CRC_KICKOFF);
        self.state = State::Receiving;
    }

    /// Data block: check the block CRC, stream the payload into flash, ACK.
    fn receive_block<F: Flash + ?Sized>(
        &mut self,
        kind: u8,
        frame: &[u8],
        flash: &mut F,
        reply: &mut Reply,
    ) {
        let block = if kind == SOH { 128 } else { 1024 };

        // Truncated frame: ask for a retransmit.
        let Some(data) = frame.get(3..3 + block) else {
            let _ = reply.push(NAK);
            return;
        };

        // Verify the per-block XMODEM CRC before touching flash, so a NAKed
        // block leaves the erased range untouched and the retransmit
        // programs it exactly once.
        if let Some(&[hi, lo]) = frame.get(3 + block..3 + block + 2) {
            if crc16(data) != u16::from_be_bytes([hi, lo]) {
                let _ = reply.push(NAK);
                return;
            }
        }

        let remaining = self.file_size - self.bytes_received;
        let to_write = (block as u32).min(remaining) as usize;

        if to_write > 0 {
            // Half-word programming: pad an odd tail with the erased value.
            let mut buf = [0xFFu8; 1024];
            buf[..to_write].copy_from_slice(&data[..to_write]);
            let even = to_write + (to_write & 1);

            if flash.program(self.write_cursor, &buf[..even]).is_err() {
                self.fail(reply);
                return;
            }
            self.write_cursor += to_write as u32;
            self.bytes_received += to_write as u32;
        }

        self.packet_count += 1;
        let _ = reply.push(ACK);
    }

    fn fail(&mut self, reply: &mut Reply) {
        self.failed = true;
        self.state = State::WaitingHeader;
        let _ = reply.push(CAN);
        let _ = reply.push(CAN);
    }
}

/// Pull the decimal file size out of a header block payload:
/// NUL-terminated file name, then ASCII digits.
fn parse_file_size(data: &[u8]) -> u32 {
    let data = &data[..data.len().min(128)];
    let mut it = data.iter();
    for &b in it.by_ref() {
        if b == 0 {
            break;
        }
    }

    let mut size: u32 = 0;
    for &b in it {
        if !b.is_ascii_digit() {
            break;
        }
        size = size.saturating_mul(10).saturating_add((b - b'0') as u32);
    }
    size
}

// Data blocks never need to carry more than one bank's worth of framing.
const _: () = assert!(FRAME_CAPACITY >= 1024 + 5);
const _: () = assert!(IMAGE_HEADER_SIZE as usize <= 128);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_size_name_then_digits() {
        let mut data = [0u8; 128];
        data[..9].copy_from_slice(b"app.img\x004");
        data[9..13].copy_from_slice(b"096\x00");
        assert_eq!(parse_file_size(&data), 4096);
    }

    #[test]
    fn test_parse_file_size_empty_name() {
        let data = [0u8; 128];
        assert_eq!(parse_file_size(&data), 0);
    }

    #[test]
    fn test_parse_file_size_stops_at_non_digit() {
        let mut data = [0u8; 128];
        data[..8].copy_from_slice(b"f\x00123 64");
        assert_eq!(parse_file_size(&data), 123);
    }

    #[test]
    fn test_parse_file_size_unterminated_name() {
        assert_eq!(parse_file_size(&[b'a'; 64]), 0);
    }
}
