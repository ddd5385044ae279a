// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot orchestration: config bring-up, upgrade flow, boot-counter policy
//! and the hand-off into the application.

use ember_common::boot::{
    apply_boot_counter, choose_boot_bank, upgrade_requested, BootChoice, CounterOutcome,
};
use ember_common::config::{self, SystemConfig, UpgradeStatus};
use ember_common::flash::FlashError;
use ember_common::layout::Bank;
use ember_common::upgrade::{finalize_upgrade, UpgradeError};
use ember_common::verify::{stack_pointer_in_ram, verify_bank};
use ember_common::ymodem::SessionStatus;

use crate::flash::FpecFlash;
use crate::indicator::{codes, Indicator, BUSY_BLINK_MS, WAITING_BLINK_MS};
use crate::peripherals::TxPort;
use crate::serial::{self, Downloader};

/// All bootloader state. The flash driver and TX port are `None` only while
/// a download session has them checked out to interrupt context.
pub struct Bootloader {
    flash: Option<FpecFlash>,
    tx: Option<TxPort>,
    indicator: Indicator,
    key_pressed: bool,
}

impl Bootloader {
    pub fn new(flash: FpecFlash, tx: TxPort, indicator: Indicator, key_pressed: bool) -> Self {
        Self {
            flash: Some(flash),
            tx: Some(tx),
            indicator,
            key_pressed,
        }
    }

    /// Startup sequence. Ends in a hand-off, a reset or the wait loop.
    pub fn run(mut self) -> ! {
        let mut cfg = self.load_config();

        // A held key or an interrupted download routes straight into the
        // upgrade flow, before any boot attempt.
        if upgrade_requested(self.key_pressed, &cfg) {
            if let Ok(bank) = self.upgrade(&mut cfg) {
                self.hand_off(bank);
            }
            self.indicator.status_code(codes::UNKNOWN_ERROR);
            reset();
        }

        // Verify both banks once; the policy steps below reuse the results.
        let a_ok = verify_bank(self.flash_ref(), &cfg, Bank::A);
        let b_ok = verify_bank(self.flash_ref(), &cfg, Bank::B);
        defmt::println!(
            "banks: A={} B={} active={} attempts={}",
            a_ok,
            b_ok,
            cfg.active_bank,
            cfg.boot_count
        );

        let (active_ok, other_ok) = ordered(&cfg, a_ok, b_ok);
        match apply_boot_counter(&mut cfg, active_ok, other_ok) {
            CounterOutcome::NoBootableImage => self.wait_for_upgrade(cfg),
            CounterOutcome::Continue { rolled_back } => {
                if self.save(&mut cfg).is_err() {
                    self.fatal();
                }
                if rolled_back {
                    defmt::println!("boot retries exhausted, switching banks");
                    self.indicator.status_code(codes::BANK_SWITCHED);
                }
            }
        }

        let (active_ok, other_ok) = ordered(&cfg, a_ok, b_ok);
        match choose_boot_bank(&cfg, active_ok, other_ok) {
            Some(BootChoice::Active) => {
                self.hand_off(cfg.active_bank());
            }
            Some(BootChoice::Fallback(bank)) => {
                cfg.set_active_bank(bank);
                cfg.boot_count = 0;
                if self.save(&mut cfg).is_err() {
                    self.fatal();
                }
                self.indicator.status_code(codes::BANK_SWITCHED);
                self.hand_off(bank);
            }
            None => self.wait_for_upgrade(cfg),
        }

        // A bank that verified moments ago refused the jump.
        self.indicator.status_code(codes::UNKNOWN_ERROR);
        reset();
    }

    fn load_config(&mut self) -> SystemConfig {
        match config::read_config(self.flash_ref()) {
            Ok(cfg) => cfg,
            Err(_) => {
                defmt::println!("config absent or corrupt, writing defaults");
                self.indicator.status_code(codes::CONFIG_DEFAULTED);
                match config::init_default(self.flash_mut()) {
                    Ok(cfg) => cfg,
                    Err(_) => self.fatal(),
                }
            }
        }
    }

    /// Full upgrade flow: persist DOWNLOADING, receive into the inactive
    /// bank, then verify and commit. On success the new bank is active and
    /// ready for hand-off; on failure FAILED is persisted and the previous
    /// active bank is untouched.
    fn upgrade(&mut self, cfg: &mut SystemConfig) -> Result<Bank, ()> {
        let target = cfg.active_bank().other();
        defmt::println!("upgrade: receiving into bank {}", target.index());

        cfg.set_status(UpgradeStatus::Downloading);
        if self.save(cfg).is_err() {
            return Err(());
        }

        self.indicator.fast_blink(6, BUSY_BLINK_MS);
        self.arm_session(target);
        let session = self.await_session(BUSY_BLINK_MS);
        self.reclaim_session();

        if session.is_err() {
            defmt::println!("upgrade: flash failure during download");
            cfg.set_status(UpgradeStatus::Failed);
            let _ = self.save(cfg);
            self.indicator.status_code(codes::UNKNOWN_ERROR);
            return Err(());
        }

        match finalize_upgrade(self.flash_mut(), cfg, target) {
            Ok(info) => {
                defmt::println!(
                    "upgrade: installed {}.{}.{} ({} bytes)",
                    info.version_major,
                    info.version_minor,
                    info.version_patch,
                    info.firmware_size
                );
                self.indicator.fast_blink(10, BUSY_BLINK_MS);
                Ok(target)
            }
            Err(e) => {
                self.indicate_upgrade_error(e);
                Err(())
            }
        }
    }

    /// Terminal state with no runnable bank: keep the receiver armed so a
    /// host can still push an image, blink the waiting pattern, and finalize
    /// in place when a transfer lands.
    fn wait_for_upgrade(mut self, mut cfg: SystemConfig) -> ! {
        defmt::println!("no bootable image, waiting for upgrade");
        self.indicator.status_code(codes::NO_VALID_FIRMWARE);

        loop {
            let target = cfg.active_bank().other();
            self.arm_session(target);
            let session = self.await_session(WAITING_BLINK_MS);
            self.reclaim_session();

            match session {
                Ok(()) => match finalize_upgrade(self.flash_mut(), &mut cfg, target) {
                    Ok(_) => {
                        self.indicator.fast_blink(10, BUSY_BLINK_MS);
                        self.hand_off(target);
                        // Jump refused; fall through and keep waiting.
                        self.indicator.status_code(codes::UNKNOWN_ERROR);
                    }
                    Err(e) => self.indicate_upgrade_error(e),
                },
                Err(()) => self.indicator.status_code(codes::UNKNOWN_ERROR),
            }
        }
    }

    fn indicate_upgrade_error(&mut self, e: UpgradeError) {
        match e {
            UpgradeError::Header(_) => {
                defmt::println!("upgrade: image header rejected");
                self.indicator.status_code(codes::NO_VALID_FIRMWARE);
            }
            UpgradeError::CrcMismatch { expected, actual } => {
                defmt::println!(
                    "upgrade: payload crc {=u32:x}, header promised {=u32:x}",
                    actual,
                    expected
                );
                self.indicator.status_code(codes::CRC_FAILED);
            }
            UpgradeError::Flash(_) => {
                self.indicator.status_code(codes::UNKNOWN_ERROR);
            }
        }
    }

    /// Move the flash driver and TX port into interrupt context and open
    /// the session with the first `C` kickoff.
    fn arm_session(&mut self, target: Bank) {
        let flash = self.flash.take().expect("flash driver already armed");
        let tx = self.tx.take().expect("tx port already armed");
        serial::arm(Downloader::new(target.addr(), flash, tx));
        serial::kick();
    }

    /// Poll for session completion, blinking at the given rate. Each idle
    /// cycle re-emits the kickoff until the sender shows up.
    fn await_session(&mut self, half_period_ms: u32) -> Result<(), ()> {
        loop {
            self.indicator.pulse(half_period_ms);
            serial::kick();
            match serial::status() {
                Some(SessionStatus::Complete) => return Ok(()),
                Some(SessionStatus::Failed) => return Err(()),
                _ => {}
            }
        }
    }

    fn reclaim_session(&mut self) {
        let downloader = serial::disarm();
        self.flash = Some(downloader.flash);
        self.tx = Some(downloader.tx);
    }

    fn save(&mut self, cfg: &mut SystemConfig) -> Result<(), FlashError> {
        config::save_config(self.flash_mut(), cfg)
    }

    fn flash_ref(&self) -> &FpecFlash {
        self.flash.as_ref().expect("flash driver checked out")
    }

    fn flash_mut(&mut self) -> &mut FpecFlash {
        self.flash.as_mut().expect("flash driver checked out")
    }

    /// Transfer control to the application in `bank`. Returns only if the
    /// image's initial stack pointer is not in RAM.
    fn hand_off(&mut self, bank: Bank) {
        let payload = bank.payload_addr();
        let sp = unsafe { (payload as *const u32).read_volatile() };
        if !stack_pointer_in_ram(sp) {
            defmt::println!("refusing jump: sp {=u32:x} outside RAM", sp);
            return;
        }
        let reset_vector = unsafe { ((payload + 4) as *const u32).read_volatile() };

        defmt::println!(
            "handing off to bank {}: sp={=u32:x} pc={=u32:x}",
            bank.index(),
            sp,
            reset_vector
        );
        self.indicator.off();
        self.indicator.delay_ms(10);

        unsafe { start_app(payload, sp, reset_vector) }
    }

    fn fatal(&mut self) -> ! {
        defmt::println!("config area unusable");
        loop {
            self.indicator.fast_blink(1, BUSY_BLINK_MS);
        }
    }
}

fn ordered(cfg: &SystemConfig, a_ok: bool, b_ok: bool) -> (bool, bool) {
    match cfg.active_bank() {
        Bank::A => (a_ok, b_ok),
        Bank::B => (b_ok, a_ok),
    }
}

fn reset() -> ! {
    cortex_m::peripheral::SCB::sys_reset()
}

/// The irrevocable jump. The caller has checked `sp`; everything the
/// bootloader armed is torn down so the application starts from a quiet
/// machine with its own vector table.
unsafe fn start_app(vector_base: u32, sp: u32, reset_vector: u32) -> ! {
    cortex_m::interrupt::disable();

    // SysTick off
    const SYST_CSR: *mut u32 = 0xE000_E010 as *mut u32;
    const SYST_RVR: *mut u32 = 0xE000_E014 as *mut u32;
    const SYST_CVR: *mut u32 = 0xE000_E018 as *mut u32;
    SYST_CSR.write_volatile(0);
    SYST_RVR.write_volatile(0);
    SYST_CVR.write_volatile(0);

    // Disable and clear every NVIC line
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    for i in 0..8 {
        NVIC_ICER.add(i).write_volatile(0xFFFF_FFFF);
        NVIC_ICPR.add(i).write_volatile(0xFFFF_FFFF);
    }

    // The application's vector table sits right after the image header.
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(vector_base);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();

    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",
        "bx {reset}",
        sp = in(reg) sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
