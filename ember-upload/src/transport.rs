// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport layer for talking to the bootloader.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serialport::SerialPort;

/// Default timeout for single-byte reads in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

pub struct Transport {
    port: Box<dyn SerialPort>,
}

impl Transport {
    /// Open the named serial port.
    pub fn new(port_name: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self { port })
    }

    /// Write a full buffer.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .context("Failed to write to serial port")?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one byte, or `None` after `timeout_ms` of silence.
    pub fn read_byte(&mut self, timeout_ms: u64) -> Result<Option<u8>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(1) => return Ok(Some(byte[0])),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e).context("Serial read error"),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    /// Discard anything queued on the RX side.
    pub fn drain(&mut self) {
        let mut buf = [0u8; 64];
        let old_timeout = self.port.timeout();
        let _ = self.port.set_timeout(Duration::from_millis(10));
        while self.port.read(&mut buf).unwrap_or(0) > 0 {}
        let _ = self.port.set_timeout(old_timeout);
    }
}
