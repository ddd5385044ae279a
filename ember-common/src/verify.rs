// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware image verification.

use crate::config::SystemConfig;
use crate::crc::crc32_region;
use crate::flash::{read_word, Flash};
use crate::image::{FIRMWARE_MAGIC, FIRMWARE_VALID_FLAG};
use crate::layout::{Bank, MAX_PAYLOAD_SIZE, RAM_BASE};

/// A candidate initial stack pointer must land in SRAM. A freshly erased
/// bank reads `0xFFFFFFFF` here, so this also guards against jumping into
/// an empty bank whose metadata happens to look plausible.
pub fn stack_pointer_in_ram(sp: u32) -> bool {
    (sp & 0x2FFF_0000) == RAM_BASE
}

/// Full runnability check for one bank: metadata magic and accepted flag,
/// size bound, payload CRC-32 against the recorded value, and the
/// stack-pointer sanity check on the first payload word.
pub fn verify_bank<F: Flash + ?Sized>(flash: &F, cfg: &SystemConfig, bank: Bank) -> bool {
    let info = cfg.bank_info(bank);

    if info.magic != FIRMWARE_MAGIC {
        return false;
    }
    if info.is_valid != FIRMWARE_VALID_FLAG {
        return false;
    }
    if info.firmware_size == 0 || info.firmware_size > MAX_PAYLOAD_SIZE {
        return false;
    }

    let payload = bank.payload_addr();
    if crc32_region(flash, payload, info.firmware_size) != info.firmware_crc32 {
        return false;
    }

    stack_pointer_in_ram(read_word(flash, payload))
}
