// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! STM32F1 FPEC driver: page erase and half-word programming.
//!
//! The sequence per the flash programming manual:
//!   1. unlock the FPEC with the two key writes
//!   2. erase: set PER, load AR, set STRT, poll BSY
//!   3. program: set PG, write one half-word, poll BSY
//!   4. check SR error flags, relock
//!
//! The CPU stalls on instruction fetches while the FPEC is busy; interrupts
//! stay enabled, so UART bytes keep queueing into the RX ring during the
//! multi-millisecond erase of a bank.

use ember_common::flash::{Flash, FlashError};
use ember_common::layout::FLASH_PAGE_SIZE;
use stm32f1xx_hal::pac;

const KEY1: u32 = 0x4567_0123;
const KEY2: u32 = 0xCDEF_89AB;

// FLASH_SR bits
const SR_BSY: u32 = 1 << 0;
const SR_PGERR: u32 = 1 << 2;
const SR_WRPRTERR: u32 = 1 << 4;
const SR_EOP: u32 = 1 << 5;

// FLASH_CR bits
const CR_PG: u32 = 1 << 0;
const CR_PER: u32 = 1 << 1;
const CR_STRT: u32 = 1 << 6;
const CR_LOCK: u32 = 1 << 7;

/// Exclusive handle to the flash program/erase controller. Constructed once
/// during board init and handed around (or parked in the downloader) from
/// then on.
pub struct FpecFlash {
    _private: (),
}

fn regs() -> &'static pac::flash::RegisterBlock {
    unsafe { &*pac::FLASH::ptr() }
}

impl FpecFlash {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn unlock(&mut self) {
        let flash = regs();
        if flash.cr.read().bits() & CR_LOCK != 0 {
            flash.keyr.write(|w| unsafe { w.bits(KEY1) });
            flash.keyr.write(|w| unsafe { w.bits(KEY2) });
        }
    }

    fn lock(&mut self) {
        regs().cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_LOCK) });
    }

    fn wait_ready(&self) {
        while regs().sr.read().bits() & SR_BSY != 0 {
            core::hint::spin_loop();
        }
    }

    /// Clear EOP and the sticky error flags (write-1-to-clear).
    fn clear_status(&mut self) {
        regs()
            .sr
            .write(|w| unsafe { w.bits(SR_EOP | SR_PGERR | SR_WRPRTERR) });
    }

    fn had_error(&self) -> bool {
        regs().sr.read().bits() & (SR_PGERR | SR_WRPRTERR) != 0
    }
}

impl Default for FpecFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl Flash for FpecFlash {
    fn erase(&mut self, addr: u32, pages: u32) -> Result<(), FlashError> {
        debug_assert!(addr % FLASH_PAGE_SIZE == 0);

        let flash = regs();
        self.unlock();

        for page in 0..pages {
            self.wait_ready();
            self.clear_status();

            flash.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_PER) });
            flash
                .ar
                .write(|w| unsafe { w.bits(addr + page * FLASH_PAGE_SIZE) });
            flash.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_STRT) });

            self.wait_ready();
            flash.cr.modify(|r, w| unsafe { w.bits(r.bits() & !CR_PER) });

            if self.had_error() {
                self.lock();
                return Err(FlashError::Busy);
            }
        }

        self.lock();
        Ok(())
    }

    fn program(&mut self, addr: u32, bytes: &[u8]) -> Result<(), FlashError> {
        debug_assert!(addr % 2 == 0);
        debug_assert!(bytes.len() % 2 == 0);

        let flash = regs();
        self.unlock();
        self.wait_ready();
        self.clear_status();

        flash.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_PG) });

        let mut result = Ok(());
        for (i, pair) in bytes.chunks_exact(2).enumerate() {
            let half = u16::from_le_bytes([pair[0], pair[1]]);
            let dest = (addr as usize + i * 2) as *mut u16;

            unsafe { dest.write_volatile(half) };
            self.wait_ready();

            if self.had_error() || unsafe { dest.read_volatile() } != half {
                result = Err(FlashError::Program);
                break;
            }
        }

        flash.cr.modify(|r, w| unsafe { w.bits(r.bits() & !CR_PG) });
        self.lock();
        result
    }

    fn read(&self, addr: u32, out: &mut [u8]) {
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = unsafe { ((addr + i as u32) as *const u8).read_volatile() };
        }
    }
}
