// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash access seam.
//!
//! Every component that touches flash does so through [`Flash`], so the
//! protocol FSM, config manager and verifier can run against the real FPEC
//! driver on target and against [`crate::sim::SimFlash`] on the host.

/// Errors surfaced by flash drivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashError {
    /// The hardware reported a non-completion while erasing a page.
    Busy,
    /// A programmed half-word did not read back as written.
    Program,
}

/// Page-erase / half-word-program / read interface of the internal flash.
///
/// Flash erases to `0xFF` and programming only clears bits; callers erase
/// explicitly before their write sequences, the driver never re-erases.
pub trait Flash {
    /// Erase `pages` consecutive pages starting at page-aligned `addr`.
    ///
    /// A failed page aborts the erase; already-erased pages stay erased
    /// (the caller treats any failure as fatal for the region).
    fn erase(&mut self, addr: u32, pages: u32) -> Result<(), FlashError>;

    /// Program `bytes` at half-word-aligned `addr` as little-endian
    /// half-words. `bytes.len()` must be even; odd tails are padded with
    /// `0xFF` by the caller.
    fn program(&mut self, addr: u32, bytes: &[u8]) -> Result<(), FlashError>;

    /// Copy from the flash-mapped region into `out`.
    fn read(&self, addr: u32, out: &mut [u8]);
}

/// Read a little-endian word from flash.
pub fn read_word<F: Flash + ?Sized>(flash: &F, addr: u32) -> u32 {
    let mut raw = [0u8; 4];
    flash.read(addr, &mut raw);
    u32::from_le_bytes(raw)
}
