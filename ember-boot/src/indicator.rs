// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Status LED patterns.
//!
//! One output communicates everything: N pulses of 200 ms followed by a
//! one-second pause signal status code N; fast symmetric blinking means an
//! operation is in progress (100 ms) or the device is waiting for an
//! upgrade (500 ms).

use cortex_m::delay::Delay;
use stm32f1xx_hal::gpio::{gpioc::PC13, Output, PushPull};

/// Status codes shown as pulse counts.
pub mod codes {
    pub const CONFIG_DEFAULTED: u8 = 1;
    pub const CRC_FAILED: u8 = 2;
    pub const BANK_SWITCHED: u8 = 4;
    pub const NO_VALID_FIRMWARE: u8 = 5;
    pub const UNKNOWN_ERROR: u8 = 9;
}

const STATUS_PULSE_MS: u32 = 200;
const STATUS_PAUSE_MS: u32 = 1000;

/// Blink rate while a download is running.
pub const BUSY_BLINK_MS: u32 = 100;
/// Blink rate while waiting for a host to start an upgrade.
pub const WAITING_BLINK_MS: u32 = 500;

pub struct Indicator {
    led: PC13<Output<PushPull>>,
    delay: Delay,
}

impl Indicator {
    pub fn new(led: PC13<Output<PushPull>>, delay: Delay) -> Self {
        Self { led, delay }
    }

    // PC13 sinks the LED: low = lit.
    fn led_on(&mut self) {
        self.led.set_low();
    }

    fn led_off(&mut self) {
        self.led.set_high();
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// One on/off cycle at the given half-period.
    pub fn pulse(&mut self, half_period_ms: u32) {
        self.led_on();
        self.delay.delay_ms(half_period_ms);
        self.led_off();
        self.delay.delay_ms(half_period_ms);
    }

    /// Status code `code`: that many 200 ms pulses, then a 1 s pause.
    pub fn status_code(&mut self, code: u8) {
        for _ in 0..code {
            self.pulse(STATUS_PULSE_MS);
        }
        self.delay.delay_ms(STATUS_PAUSE_MS);
    }

    /// Equal-duration blinking for an ongoing operation.
    pub fn fast_blink(&mut self, times: u8, half_period_ms: u32) {
        for _ in 0..times {
            self.pulse(half_period_ms);
        }
    }

    pub fn off(&mut self) {
        self.led_off();
    }
}
