// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Minimal application image: proves a hand-off worked by blinking the LED
//! at a steady rate the bootloader never uses.

#![no_std]
#![no_main]

use cortex_m::delay::Delay;
use defmt_rtt as _;
use panic_probe as _;
use stm32f1xx_hal::pac;
use stm32f1xx_hal::prelude::*;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[entry]
fn main() -> ! {
    defmt::println!("sample application started");

    let dp = unsafe { pac::Peripherals::steal() };
    let cp = unsafe { cortex_m::Peripherals::steal() };

    let mut acr = dp.FLASH.constrain().acr;
    let rcc = dp.RCC.constrain();
    let clocks = rcc
        .cfgr
        .use_hse(8.MHz())
        .sysclk(72.MHz())
        .freeze(&mut acr);

    let mut gpioc = dp.GPIOC.split();
    let mut led = gpioc.pc13.into_push_pull_output(&mut gpioc.crh);
    let mut delay = Delay::new(cp.SYST, clocks.sysclk().to_Hz());

    loop {
        led.set_low();
        delay.delay_ms(1000);
        led.set_high();
        delay.delay_ms(1000);
    }
}
