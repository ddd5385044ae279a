// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash partition map for the STM32F103C8 target (64 KiB, 1 KiB pages).

/// Start of the memory-mapped flash region.
pub const FLASH_BASE: u32 = 0x0800_0000;
/// Total flash size.
pub const FLASH_SIZE: u32 = 64 * 1024;
/// Erase granularity.
pub const FLASH_PAGE_SIZE: u32 = 1024;

/// Bootloader code region.
pub const BOOT_ADDR: u32 = FLASH_BASE;
pub const BOOT_SIZE: u32 = 0x4000;

/// Persistent configuration record.
pub const CONFIG_ADDR: u32 = 0x0800_4000;
pub const CONFIG_AREA_SIZE: u32 = 0x800;
pub const CONFIG_PAGES: u32 = CONFIG_AREA_SIZE / FLASH_PAGE_SIZE;

/// Firmware banks. Each holds a 24-byte image header plus the payload.
pub const BANK_A_ADDR: u32 = 0x0800_4800;
pub const BANK_B_ADDR: u32 = 0x0800_9800;
pub const BANK_SIZE: u32 = 0x5000;
pub const BANK_PAGES: u32 = BANK_SIZE / FLASH_PAGE_SIZE;

/// Reserved for upgrade logs; laid out but not written.
pub const LOG_AREA_ADDR: u32 = 0x0800_E800;
pub const LOG_AREA_SIZE: u32 = 0x800;

/// Size of the image header preceding the application payload.
pub const IMAGE_HEADER_SIZE: u32 = 24;
/// Largest payload a bank can hold after its header.
pub const MAX_PAYLOAD_SIZE: u32 = BANK_SIZE - IMAGE_HEADER_SIZE;

/// RAM window used for the stack-pointer sanity check.
pub const RAM_BASE: u32 = 0x2000_0000;

// The map must tile without gaps or overlap.
const _: () = assert!(BOOT_ADDR + BOOT_SIZE == CONFIG_ADDR);
const _: () = assert!(CONFIG_ADDR + CONFIG_AREA_SIZE == BANK_A_ADDR);
const _: () = assert!(BANK_A_ADDR + BANK_SIZE == BANK_B_ADDR);
const _: () = assert!(BANK_B_ADDR + BANK_SIZE == LOG_AREA_ADDR);
const _: () = assert!(LOG_AREA_ADDR + LOG_AREA_SIZE == FLASH_BASE + FLASH_SIZE);
const _: () = assert!(BANK_A_ADDR % FLASH_PAGE_SIZE == 0);
const _: () = assert!(BANK_B_ADDR % FLASH_PAGE_SIZE == 0);

/// One of the two firmware banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    A,
    B,
}

impl Bank {
    /// Bank selected by the raw `active_bank` config field (0 = A, 1 = B).
    pub fn from_index(index: u8) -> Self {
        if index == 0 { Bank::A } else { Bank::B }
    }

    pub fn index(self) -> u8 {
        match self {
            Bank::A => 0,
            Bank::B => 1,
        }
    }

    /// Base address of the bank's image header.
    pub fn addr(self) -> u32 {
        match self {
            Bank::A => BANK_A_ADDR,
            Bank::B => BANK_B_ADDR,
        }
    }

    /// Address of the application payload (vector table) within the bank.
    pub fn payload_addr(self) -> u32 {
        self.addr() + IMAGE_HEADER_SIZE
    }

    pub fn other(self) -> Self {
        match self {
            Bank::A => Bank::B,
            Bank::B => Bank::A,
        }
    }
}
