// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial intake: RX ring buffer, frame-boundary timer and the interrupt
//! half of the download protocol.
//!
//! The USART1 interrupt enqueues every received byte and re-arms TIM3; when
//! TIM3 expires (20 ms of line silence) the accumulated bytes form one
//! logical frame and go to the protocol receiver. The foreground arms a
//! [`Downloader`] before a session and takes it back when the session
//! status says the transfer is over; while armed, the flash driver and the
//! TX half of the UART live in here.

use core::cell::RefCell;

use cortex_m::interrupt::Mutex;
use cortex_m::peripheral::NVIC;
use ember_common::queue::ByteQueue;
use ember_common::ymodem::{Receiver, SessionStatus, CRC_KICKOFF, FRAME_CAPACITY, FRAME_GAP_MS};
use stm32f1xx_hal::pac::{self, interrupt};
use stm32f1xx_hal::prelude::*;

use crate::flash::FpecFlash;
use crate::peripherals::{RxPort, TxPort};

/// TIM3 runs from the doubled APB1 clock.
const TIM_CLOCK_HZ: u32 = 72_000_000;
/// Prescale to a 10 kHz tick so the gap fits a 16-bit reload.
const TIM_PRESCALER: u32 = 7_199;
const TIM_TICK_HZ: u32 = TIM_CLOCK_HZ / (TIM_PRESCALER + 1);
const TIM_RELOAD: u32 = FRAME_GAP_MS * TIM_TICK_HZ / 1000 - 1;

const _: () = assert!(TIM_PRESCALER <= 0xFFFF);
const _: () = assert!(TIM_RELOAD <= 0xFFFF);

static RX_QUEUE: Mutex<RefCell<ByteQueue<FRAME_CAPACITY>>> =
    Mutex::new(RefCell::new(ByteQueue::new()));
static RX_PORT: Mutex<RefCell<Option<RxPort>>> = Mutex::new(RefCell::new(None));
static DOWNLOADER: Mutex<RefCell<Option<Downloader>>> = Mutex::new(RefCell::new(None));

/// Everything a download session needs from interrupt context.
pub struct Downloader {
    pub session: Receiver,
    pub flash: FpecFlash,
    pub tx: TxPort,
}

impl Downloader {
    pub fn new(target: u32, flash: FpecFlash, tx: TxPort) -> Self {
        Self {
            session: Receiver::new(target),
            flash,
            tx,
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let _ = nb::block!(self.tx.write(byte));
        }
    }
}

/// Park the RX half of the UART and start the frame timer machinery.
pub fn init(rx: RxPort) {
    cortex_m::interrupt::free(|cs| {
        RX_PORT.borrow(cs).borrow_mut().replace(rx);
    });

    setup_frame_timer();

    unsafe {
        NVIC::unmask(pac::Interrupt::USART1);
        NVIC::unmask(pac::Interrupt::TIM3);
    }
}

/// Hand the session, flash driver and TX port to interrupt context.
/// Bytes queued before the session existed are stale; drop them.
pub fn arm(downloader: Downloader) {
    cortex_m::interrupt::free(|cs| {
        RX_QUEUE.borrow(cs).borrow_mut().clear();
        DOWNLOADER.borrow(cs).borrow_mut().replace(downloader);
    });
}

/// Session status as last seen; `None` while the frame timer is mid-frame.
pub fn status() -> Option<SessionStatus> {
    cortex_m::interrupt::free(|cs| {
        DOWNLOADER
            .borrow(cs)
            .borrow()
            .as_ref()
            .map(|d| d.session.status())
    })
}

/// Re-emit the `C` kickoff while no transfer has started yet; the sender
/// side waits for it and may have missed the first one.
pub fn kick() {
    cortex_m::interrupt::free(|cs| {
        if let Some(d) = DOWNLOADER.borrow(cs).borrow_mut().as_mut() {
            if d.session.is_waiting() {
                d.send(&[CRC_KICKOFF]);
            }
        }
    });
}

/// Reclaim the downloader. Spins through the window in which the frame
/// timer has it checked out.
pub fn disarm() -> Downloader {
    loop {
        let taken = cortex_m::interrupt::free(|cs| DOWNLOADER.borrow(cs).borrow_mut().take());
        if let Some(downloader) = taken {
            return downloader;
        }
    }
}

/// TIM3 free-runs at a 10 kHz tick and interrupts once on update; the RX
/// interrupt rewinds it on every byte, so the update only fires after
/// `FRAME_GAP_MS` of silence.
fn setup_frame_timer() {
    // The HAL's RCC singleton is consumed by clock setup; reach the enable
    // bit directly, as the FPEC driver does for its register block.
    let rcc = unsafe { &*pac::RCC::ptr() };
    rcc.apb1enr.modify(|_, w| w.tim3en().set_bit());

    let tim = unsafe { &*pac::TIM3::ptr() };
    tim.psc.write(|w| w.psc().bits(TIM_PRESCALER as u16));
    tim.arr.write(|w| w.arr().bits(TIM_RELOAD as u16));
    tim.dier.modify(|_, w| w.uie().set_bit());
    // Not started here: the first received byte starts it.
}

fn rewind_frame_timer() {
    let tim = unsafe { &*pac::TIM3::ptr() };
    tim.cnt.write(|w| w.cnt().bits(0));
    tim.cr1.modify(|_, w| w.cen().set_bit());
}

#[interrupt]
fn USART1() {
    cortex_m::interrupt::free(|cs| {
        let mut port = RX_PORT.borrow(cs).borrow_mut();
        let mut queue = RX_QUEUE.borrow(cs).borrow_mut();
        if let Some(rx) = port.as_mut() {
            while let Ok(byte) = rx.read() {
                // A full queue drops the byte; the sender's retry recovers.
                let _ = queue.push(byte);
            }
        }
    });

    rewind_frame_timer();
}

#[interrupt]
fn TIM3() {
    let tim = unsafe { &*pac::TIM3::ptr() };
    tim.sr.modify(|_, w| w.uif().clear_bit());
    tim.cr1.modify(|_, w| w.cen().clear_bit());

    let mut frame = [0u8; FRAME_CAPACITY];
    let mut len = 0;

    let downloader = cortex_m::interrupt::free(|cs| {
        let mut queue = RX_QUEUE.borrow(cs).borrow_mut();
        while let Some(byte) = queue.pop() {
            frame[len] = byte;
            len += 1;
        }
        DOWNLOADER.borrow(cs).borrow_mut().take()
    });

    // The receiver runs with interrupts enabled: flash erase/program stalls
    // the CPU for milliseconds and new bytes must keep reaching the queue.
    if let Some(mut d) = downloader {
        if len > 0 {
            let reply = d.session.handle_frame(&frame[..len], &mut d.flash);
            d.send(&reply);
        }
        cortex_m::interrupt::free(|cs| {
            DOWNLOADER.borrow(cs).borrow_mut().replace(d);
        });
    }
    // With no session armed the drained bytes are line noise; drop them.
}
