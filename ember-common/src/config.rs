// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Persistent configuration record.
//!
//! One 60-byte packed record in the 2 KiB config area, protected by a
//! trailing CRC-32 over all preceding bytes. Erase-then-program is the only
//! atomicity primitive: a half-written record fails the magic or CRC check
//! on the next read and counts as absent.

use crate::crc::crc32;
use crate::flash::{Flash, FlashError};
use crate::image::FirmwareInfo;
use crate::layout::{Bank, CONFIG_ADDR, CONFIG_PAGES};
use crate::FIRMWARE_VALID_FLAG;

pub const CONFIG_MAGIC: u32 = 0xA5A5_A5A5;

/// Boot attempts tolerated before rollback, unless the record says otherwise.
pub const DEFAULT_MAX_BOOT_RETRY: u8 = 3;

/// Why a config read came back empty-handed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No magic: the area is erased or holds something else entirely.
    NotPresent,
    /// Magic found but the trailing CRC does not match (half-written save).
    CrcMismatch,
}

/// Upgrade state persisted across resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum UpgradeStatus {
    Idle = 0x00,
    Downloading = 0x01,
    Verifying = 0x02,
    Installing = 0x03,
    Success = 0x04,
    Failed = 0x05,
}

impl UpgradeStatus {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(UpgradeStatus::Idle),
            0x01 => Some(UpgradeStatus::Downloading),
            0x02 => Some(UpgradeStatus::Verifying),
            0x03 => Some(UpgradeStatus::Installing),
            0x04 => Some(UpgradeStatus::Success),
            0x05 => Some(UpgradeStatus::Failed),
            _ => None,
        }
    }
}

// --- SystemConfig (repr(C), 60 bytes) ---

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemConfig {
    pub magic: u32,         // 0xA5A5A5A5
    pub active_bank: u8,    // 0 = A, 1 = B
    pub upgrade_status: u8, // raw UpgradeStatus
    pub boot_count: u8,     // attempts since last confirmed boot
    pub max_boot_retry: u8, // rollback threshold
    pub bank_a_info: FirmwareInfo,
    pub bank_b_info: FirmwareInfo,
    pub config_crc32: u32, // over all preceding bytes
}

// Compile-time size check: 4 + 4 + 24 + 24 + 4
const _: () = assert!(core::mem::size_of::<SystemConfig>() == 60);

const CRC_OFFSET: usize = core::mem::size_of::<SystemConfig>() - 4;

impl SystemConfig {
    /// Factory record: bank B active so the first upgrade targets bank A,
    /// both banks unaccepted.
    pub fn default_new() -> Self {
        Self {
            magic: CONFIG_MAGIC,
            active_bank: 1,
            upgrade_status: UpgradeStatus::Idle as u8,
            boot_count: 0,
            max_boot_retry: DEFAULT_MAX_BOOT_RETRY,
            bank_a_info: FirmwareInfo::invalid(),
            bank_b_info: FirmwareInfo::invalid(),
            config_crc32: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }

    fn from_bytes(raw: &[u8; 60]) -> Self {
        unsafe { core::ptr::read_unaligned(raw.as_ptr() as *const Self) }
    }

    pub fn active_bank(&self) -> Bank {
        Bank::from_index(self.active_bank)
    }

    pub fn set_active_bank(&mut self, bank: Bank) {
        self.active_bank = bank.index();
    }

    /// Decoded upgrade status; unknown raw values read as `None`.
    pub fn status(&self) -> Option<UpgradeStatus> {
        UpgradeStatus::from_raw(self.upgrade_status)
    }

    pub fn set_status(&mut self, status: UpgradeStatus) {
        self.upgrade_status = status as u8;
    }

    pub fn bank_info(&self, bank: Bank) -> &FirmwareInfo {
        match bank {
            Bank::A => &self.bank_a_info,
            Bank::B => &self.bank_b_info,
        }
    }

    pub fn bank_info_mut(&mut self, bank: Bank) -> &mut FirmwareInfo {
        match bank {
            Bank::A => &mut self.bank_a_info,
            Bank::B => &mut self.bank_b_info,
        }
    }
}

/// Read the record from the config area, checking magic and CRC.
pub fn read_config<F: Flash + ?Sized>(flash: &F) -> Result<SystemConfig, ConfigError> {
    let mut raw = [0u8; 60];
    flash.read(CONFIG_ADDR, &mut raw);
    let cfg = SystemConfig::from_bytes(&raw);

    if cfg.magic != CONFIG_MAGIC {
        return Err(ConfigError::NotPresent);
    }
    if crc32(&raw[..CRC_OFFSET]) != cfg.config_crc32 {
        return Err(ConfigError::CrcMismatch);
    }
    Ok(cfg)
}

/// Stamp the CRC, erase the config area and program the record.
pub fn save_config<F: Flash + ?Sized>(
    flash: &mut F,
    cfg: &mut SystemConfig,
) -> Result<(), FlashError> {
    cfg.config_crc32 = crc32(&cfg.as_bytes()[..CRC_OFFSET]);
    flash.erase(CONFIG_ADDR, CONFIG_PAGES)?;
    flash.program(CONFIG_ADDR, cfg.as_bytes())
}

/// Write the factory record and read it back to prove the area works.
pub fn init_default<F: Flash + ?Sized>(flash: &mut F) -> Result<SystemConfig, FlashError> {
    let mut cfg = SystemConfig::default_new();
    save_config(flash, &mut cfg)?;
    read_config(flash).map_err(|_| FlashError::Program)
}

/// Install `info` as the given bank's metadata with the accepted flag set.
pub fn mark_firmware_valid<F: Flash + ?Sized>(
    flash: &mut F,
    cfg: &mut SystemConfig,
    bank: Bank,
    info: &FirmwareInfo,
) -> Result<(), FlashError> {
    let slot = cfg.bank_info_mut(bank);
    *slot = *info;
    slot.is_valid = FIRMWARE_VALID_FLAG;
    save_config(flash, cfg)
}
