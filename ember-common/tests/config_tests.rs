// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for the persistent configuration record.

use ember_common::config::{
    init_default, mark_firmware_valid, read_config, save_config, ConfigError, SystemConfig,
    UpgradeStatus, DEFAULT_MAX_BOOT_RETRY,
};
use ember_common::crc::crc32;
use ember_common::image::FirmwareInfo;
use ember_common::layout::{Bank, CONFIG_ADDR};
use ember_common::sim::SimFlash;
use ember_common::{FIRMWARE_MAGIC, FIRMWARE_VALID_FLAG};

fn make_config() -> SystemConfig {
    let mut cfg = SystemConfig::default_new();
    cfg.boot_count = 2;
    cfg.set_status(UpgradeStatus::Success);
    cfg.bank_a_info = FirmwareInfo {
        version_major: 1,
        version_minor: 2,
        version_patch: 3,
        firmware_size: 4072,
        firmware_crc32: 0xDEAD_BEEF,
        build_timestamp: 1_700_000_000,
        is_valid: FIRMWARE_VALID_FLAG,
        ..FirmwareInfo::invalid()
    };
    cfg
}

// =============================================================================
// defaults
// =============================================================================

#[test]
fn test_default_record_targets_bank_a_for_first_upgrade() {
    let cfg = SystemConfig::default_new();
    assert_eq!(cfg.active_bank(), Bank::B);
    assert_eq!(cfg.active_bank().other(), Bank::A);
}

#[test]
fn test_default_record_both_banks_unaccepted() {
    let cfg = SystemConfig::default_new();
    assert_ne!(cfg.bank_a_info.is_valid, FIRMWARE_VALID_FLAG);
    assert_ne!(cfg.bank_b_info.is_valid, FIRMWARE_VALID_FLAG);
    assert_eq!(cfg.bank_a_info.magic, FIRMWARE_MAGIC);
    assert_eq!(cfg.status(), Some(UpgradeStatus::Idle));
    assert_eq!(cfg.max_boot_retry, DEFAULT_MAX_BOOT_RETRY);
}

#[test]
fn test_init_default_persists_and_reads_back() {
    let mut flash = SimFlash::new();
    let cfg = init_default(&mut flash).unwrap();
    assert_eq!(cfg.active_bank(), Bank::B);
    assert_eq!(read_config(&flash).unwrap(), cfg);
}

// =============================================================================
// round-trip
// =============================================================================

#[test]
fn test_save_then_read_round_trips() {
    let mut flash = SimFlash::new();
    let mut cfg = make_config();

    save_config(&mut flash, &mut cfg).unwrap();
    let back = read_config(&flash).unwrap();

    assert_eq!(back, cfg);
}

#[test]
fn test_saved_crc_matches_record_bytes() {
    let mut flash = SimFlash::new();
    let mut cfg = make_config();
    save_config(&mut flash, &mut cfg).unwrap();

    let back = read_config(&flash).unwrap();
    let bytes = back.as_bytes();
    assert_eq!(crc32(&bytes[..bytes.len() - 4]), back.config_crc32);
}

#[test]
fn test_resave_overwrites_previous_record() {
    let mut flash = SimFlash::new();
    let mut cfg = make_config();
    save_config(&mut flash, &mut cfg).unwrap();

    cfg.boot_count = 7;
    save_config(&mut flash, &mut cfg).unwrap();

    assert_eq!(read_config(&flash).unwrap().boot_count, 7);
}

// =============================================================================
// absence and corruption
// =============================================================================

#[test]
fn test_erased_area_reads_as_not_present() {
    let flash = SimFlash::new();
    assert_eq!(read_config(&flash), Err(ConfigError::NotPresent));
}

#[test]
fn test_bit_damage_reads_as_crc_mismatch() {
    let mut flash = SimFlash::new();
    let mut cfg = make_config();
    save_config(&mut flash, &mut cfg).unwrap();

    // Flip a byte in the middle of the record.
    flash.poke(CONFIG_ADDR + 9, 0x00);
    assert_eq!(read_config(&flash), Err(ConfigError::CrcMismatch));
}

#[test]
fn test_truncated_save_never_reads_as_valid() {
    // Power loss at every byte boundary of the programming phase: the
    // partial record must read as absent or corrupt, never as a third,
    // valid-looking configuration.
    for cut in 0..60 {
        let mut flash = SimFlash::new();
        let mut cfg = make_config();
        save_config(&mut flash, &mut cfg).unwrap();

        let mut update = cfg;
        update.boot_count = 9;
        flash.program_limit = Some(cut);
        assert!(save_config(&mut flash, &mut update).is_err());
        flash.program_limit = None;

        assert!(
            read_config(&flash).is_err(),
            "cut at byte {cut} produced a readable record"
        );
    }
}

#[test]
fn test_save_recovers_after_truncated_save() {
    let mut flash = SimFlash::new();
    let mut cfg = make_config();

    flash.program_limit = Some(17);
    assert!(save_config(&mut flash, &mut cfg).is_err());
    flash.program_limit = None;

    save_config(&mut flash, &mut cfg).unwrap();
    assert_eq!(read_config(&flash).unwrap(), cfg);
}

// =============================================================================
// mark_firmware_valid
// =============================================================================

#[test]
fn test_mark_firmware_valid_sets_flag_and_persists() {
    let mut flash = SimFlash::new();
    let mut cfg = init_default(&mut flash).unwrap();

    let info = FirmwareInfo {
        firmware_size: 1000,
        firmware_crc32: 0x1234_5678,
        is_valid: 0, // flag is the manager's to set
        ..FirmwareInfo::invalid()
    };
    mark_firmware_valid(&mut flash, &mut cfg, Bank::A, &info).unwrap();

    let back = read_config(&flash).unwrap();
    assert_eq!(back.bank_a_info.is_valid, FIRMWARE_VALID_FLAG);
    assert_eq!(back.bank_a_info.firmware_size, 1000);
    assert_ne!(back.bank_b_info.is_valid, FIRMWARE_VALID_FLAG);
}
