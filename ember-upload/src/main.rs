// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware packing and upload tool for ember-boot.
//!
//! Usage:
//!   ember-upload pack app.bin --version 1.0.0 --output app.img
//!   ember-upload info app.img
//!   ember-upload send app.img --port /dev/ttyUSB0

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
