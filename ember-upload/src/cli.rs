// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "ember-upload")]
#[command(about = "Firmware packing and upload tool for ember-boot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Wrap a raw binary in the 24-byte image header
    Pack {
        /// Raw application binary
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Image version as major.minor.patch
        #[arg(short, long, default_value = "0.1.0")]
        version: String,

        /// Output image file (defaults to FILE with .img appended)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the header of a packed image
    Info {
        /// Packed image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Send a packed image to a waiting bootloader over YMODEM-1K
    Send {
        /// Packed image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Serial port (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, default_value = "115200")]
        baud: u32,
    },
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pack {
            input,
            version,
            output,
        } => commands::pack(&input, &version, output.as_deref()),
        Commands::Info { image } => commands::info(&image),
        Commands::Send { image, port, baud } => commands::send(&image, &port, baud),
    }
}
