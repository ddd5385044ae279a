// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot policy - pure decisions without hardware dependencies.
//!
//! The orchestrator in the bootloader binary computes the two banks'
//! verification results once, then drives these functions and persists
//! whatever they change. Keeping the policy free of flash access makes the
//! rollback and resume behavior testable on the host.

use crate::config::{SystemConfig, UpgradeStatus};
use crate::layout::Bank;

/// Steps 3-4 of the startup sequence: a held upgrade key or an interrupted
/// download (status still DOWNLOADING from a previous life) both route
/// straight into the upgrade flow before any boot attempt.
pub fn upgrade_requested(key_pressed: bool, cfg: &SystemConfig) -> bool {
    key_pressed || cfg.status() == Some(UpgradeStatus::Downloading)
}

/// Outcome of the boot-counter bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterOutcome {
    /// Neither bank verifies; there is nothing to count attempts against.
    NoBootableImage,
    /// Counter bumped; `rolled_back` reports an exhaustion-triggered swap.
    Continue { rolled_back: bool },
}

/// Boot-counter policy: with at least one runnable bank, charge this boot
/// attempt against the active bank and swap away from it once the retry
/// budget is exhausted. The caller persists `cfg` afterwards either way.
pub fn apply_boot_counter(
    cfg: &mut SystemConfig,
    active_ok: bool,
    other_ok: bool,
) -> CounterOutcome {
    if !active_ok && !other_ok {
        return CounterOutcome::NoBootableImage;
    }

    cfg.boot_count = cfg.boot_count.saturating_add(1);

    if cfg.boot_count > cfg.max_boot_retry {
        cfg.set_active_bank(cfg.active_bank().other());
        cfg.boot_count = 0;
        return CounterOutcome::Continue { rolled_back: true };
    }

    CounterOutcome::Continue { rolled_back: false }
}

/// Which bank a boot attempt should run, relative to the active one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootChoice {
    Active,
    /// The active bank failed verification but the other one is runnable;
    /// the caller must commit the swap before handing off.
    Fallback(Bank),
}

/// Step 6: prefer the active bank, fall back to the other, or give up.
pub fn choose_boot_bank(cfg: &SystemConfig, active_ok: bool, other_ok: bool) -> Option<BootChoice> {
    if active_ok {
        Some(BootChoice::Active)
    } else if other_ok {
        Some(BootChoice::Fallback(cfg.active_bank().other()))
    } else {
        None
    }
}
