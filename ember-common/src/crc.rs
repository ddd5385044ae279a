// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! CRC engines: CRC-32 (IEEE 802.3, reflected 0xEDB88320) for image and
//! config integrity, CRC-16/XMODEM for per-block download checks.

use crc::{Crc, CRC_16_XMODEM, CRC_32_ISO_HDLC};

use crate::flash::Flash;

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-32 over a RAM buffer.
pub fn crc32(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

/// CRC-32 over a flash-mapped range, read in 256-byte chunks.
pub fn crc32_region<F: Flash + ?Sized>(flash: &F, addr: u32, len: u32) -> u32 {
    let mut digest = CRC32.digest();
    let mut remaining = len as usize;
    let mut addr = addr;
    let mut chunk = [0u8; 256];

    while remaining > 0 {
        let n = remaining.min(chunk.len());
        flash.read(addr, &mut chunk[..n]);
        digest.update(&chunk[..n]);
        addr += n as u32;
        remaining -= n;
    }

    digest.finalize()
}

/// CRC-16/XMODEM over a block payload.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}
