// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! ember-boot: IAP bootloader for STM32F103 with A/B banks, boot-failure
//! rollback and YMODEM-1K serial upgrade.

#![no_std]
#![no_main]

mod boot;
mod flash;
mod indicator;
mod peripherals;
mod serial;

use defmt_rtt as _;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[entry]
fn main() -> ! {
    defmt::println!("ember-boot init");

    let board = peripherals::init();
    serial::init(board.rx);

    boot::Bootloader::new(board.flash, board.tx, board.indicator, board.key_pressed).run()
}
