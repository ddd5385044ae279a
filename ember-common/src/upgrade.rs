// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Upgrade finalization: verify a freshly downloaded image and commit the
//! bank switch.
//!
//! The download itself is the receiver's business; this runs afterwards in
//! the foreground. Status transitions are persisted so an interruption at
//! any point is recoverable: VERIFYING and FAILED are written immediately,
//! the metadata install + bank flip + SUCCESS land in a single save whose
//! magic/CRC pair is the commit marker.

use crate::config::{save_config, SystemConfig, UpgradeStatus};
use crate::crc::crc32_region;
use crate::flash::{Flash, FlashError};
use crate::image::{parse_header, FirmwareInfo, ImageError};
use crate::layout::Bank;
use crate::FIRMWARE_VALID_FLAG;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeError {
    /// The downloaded bytes do not start with a plausible image header.
    Header(ImageError),
    /// The payload does not match the CRC the header promises.
    CrcMismatch { expected: u32, actual: u32 },
    /// A config save failed while recording the outcome.
    Flash(FlashError),
}

impl From<FlashError> for UpgradeError {
    fn from(e: FlashError) -> Self {
        UpgradeError::Flash(e)
    }
}

/// Verify the image sitting in `target` and, if sound, make it the active
/// bank with a zeroed boot counter. On verification failure the FAILED
/// status is persisted and the previous active bank stays in charge.
pub fn finalize_upgrade<F: Flash + ?Sized>(
    flash: &mut F,
    cfg: &mut SystemConfig,
    target: Bank,
) -> Result<FirmwareInfo, UpgradeError> {
    cfg.set_status(UpgradeStatus::Verifying);
    save_config(flash, cfg)?;

    let info = match parse_header(flash, target.addr()) {
        Ok(info) => info,
        Err(e) => {
            cfg.set_status(UpgradeStatus::Failed);
            save_config(flash, cfg)?;
            return Err(UpgradeError::Header(e));
        }
    };

    let actual = crc32_region(flash, target.payload_addr(), info.firmware_size);
    if actual != info.firmware_crc32 {
        cfg.set_status(UpgradeStatus::Failed);
        save_config(flash, cfg)?;
        return Err(UpgradeError::CrcMismatch {
            expected: info.firmware_crc32,
            actual,
        });
    }

    cfg.set_status(UpgradeStatus::Installing);
    let slot = cfg.bank_info_mut(target);
    *slot = info;
    slot.is_valid = FIRMWARE_VALID_FLAG;
    cfg.set_active_bank(target);
    cfg.boot_count = 0;
    cfg.set_status(UpgradeStatus::Success);
    save_config(flash, cfg)?;

    Ok(info)
}
