// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Peripheral initialization for the bootloader.

use cortex_m::delay::Delay;
use stm32f1xx_hal::pac;
use stm32f1xx_hal::prelude::*;
use stm32f1xx_hal::serial::{Config, Rx, Serial, Tx};

use crate::flash::FpecFlash;
use crate::indicator::Indicator;

pub type TxPort = Tx<pac::USART1>;
pub type RxPort = Rx<pac::USART1>;

pub struct Board {
    pub flash: FpecFlash,
    pub indicator: Indicator,
    pub key_pressed: bool,
    pub tx: TxPort,
    pub rx: RxPort,
}

pub fn init() -> Board {
    let dp = unsafe { pac::Peripherals::steal() };
    let cp = unsafe { cortex_m::Peripherals::steal() };

    let mut acr = dp.FLASH.constrain().acr;
    let rcc = dp.RCC.constrain();
    let clocks = rcc
        .cfgr
        .use_hse(8.MHz())
        .sysclk(72.MHz())
        .pclk1(36.MHz())
        .freeze(&mut acr);

    let mut afio = dp.AFIO.constrain();
    let mut gpioa = dp.GPIOA.split();
    let mut gpioc = dp.GPIOC.split();

    let led = gpioc.pc13.into_push_pull_output(&mut gpioc.crh);
    let key = gpioa.pa0.into_pull_down_input(&mut gpioa.crl);

    let tx_pin = gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh);
    let rx_pin = gpioa.pa10;
    let serial = Serial::new(
        dp.USART1,
        (tx_pin, rx_pin),
        &mut afio.mapr,
        Config::default().baudrate(115_200.bps()),
        &clocks,
    );
    let (tx, mut rx) = serial.split();
    rx.listen();

    let mut delay = Delay::new(cp.SYST, clocks.sysclk().to_Hz());

    // Debounce the force-upgrade key before sampling it.
    delay.delay_ms(10);
    let key_pressed = key.is_high();

    Board {
        flash: FpecFlash::new(),
        indicator: Indicator::new(led, delay),
        key_pressed,
        tx,
        rx,
    }
}
