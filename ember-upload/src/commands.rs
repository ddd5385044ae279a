// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations: image packing, inspection and YMODEM-1K upload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use ember_common::crc::{crc16, crc32};
use ember_common::image::FirmwareInfo;
use ember_common::layout::MAX_PAYLOAD_SIZE;
use ember_common::ymodem::{ACK, CAN, CRC_KICKOFF, EOT, NAK, SESSION_CLOSE, SOH, STX};
use ember_common::{FIRMWARE_MAGIC, FIRMWARE_VALID_FLAG};

use crate::transport::Transport;

/// Wrap a raw binary in the 24-byte image header.
pub fn pack(input: &Path, version: &str, output: Option<&Path>) -> Result<()> {
    let payload = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    if payload.is_empty() {
        bail!("{} is empty", input.display());
    }
    if payload.len() as u32 > MAX_PAYLOAD_SIZE {
        bail!(
            "{} is {} bytes; a bank holds at most {} bytes of payload",
            input.display(),
            payload.len(),
            MAX_PAYLOAD_SIZE
        );
    }

    let (major, minor, patch) = parse_version(version)?;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);

    let info = FirmwareInfo {
        version_major: major,
        version_minor: minor,
        version_patch: patch,
        firmware_size: payload.len() as u32,
        firmware_crc32: crc32(&payload),
        build_timestamp: timestamp,
        is_valid: FIRMWARE_VALID_FLAG,
        ..FirmwareInfo::invalid()
    };

    let output: PathBuf = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_extension("img"),
    };

    let mut image = info.as_bytes().to_vec();
    image.extend_from_slice(&payload);
    fs::write(&output, &image).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Packed {} -> {}", input.display(), output.display());
    println!("  Version:   {}.{}.{}", major, minor, patch);
    println!("  Payload:   {} bytes", payload.len());
    println!("  CRC32:     0x{:08x}", info.firmware_crc32);
    println!("  Timestamp: {}", timestamp);

    Ok(())
}

/// Dump the header of a packed image and cross-check the payload CRC.
pub fn info(image: &Path) -> Result<()> {
    let bytes = fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    if bytes.len() < 24 {
        bail!("{} is too short to carry an image header", image.display());
    }

    let mut raw = [0u8; 24];
    raw.copy_from_slice(&bytes[..24]);
    let info = FirmwareInfo::parse(&raw)
        .map_err(|e| anyhow::anyhow!("{}: bad image header ({:?})", image.display(), e))?;

    println!("Image: {}", image.display());
    println!("  Magic:     0x{:08x}", FIRMWARE_MAGIC);
    println!(
        "  Version:   {}.{}.{}",
        info.version_major, info.version_minor, info.version_patch
    );
    println!("  Payload:   {} bytes", info.firmware_size);
    println!("  CRC32:     0x{:08x}", info.firmware_crc32);
    println!("  Timestamp: {}", info.build_timestamp);

    let payload = &bytes[24..];
    if payload.len() as u32 != info.firmware_size {
        println!(
            "  WARNING: file carries {} payload bytes, header says {}",
            payload.len(),
            info.firmware_size
        );
    } else if crc32(payload) != info.firmware_crc32 {
        println!("  WARNING: payload CRC does not match the header");
    } else {
        println!("  Payload CRC OK");
    }

    Ok(())
}

const BLOCK_RETRIES: usize = 10;

/// Send a packed image to a waiting bootloader over YMODEM-1K.
pub fn send(image: &Path, port: &str, baud: u32) -> Result<()> {
    let bytes = fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    let name = image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("firmware.img");

    let mut transport = Transport::new(port, baud)?;

    println!("Waiting for the bootloader's 'C' on {}...", port);
    wait_for(&mut transport, CRC_KICKOFF, 30_000)
        .context("No kickoff from the device (is it in upgrade mode?)")?;
    transport.drain();

    println!("Sending header for {} ({} bytes)", name, bytes.len());
    send_block(&mut transport, &header_block(name, bytes.len()))?;
    wait_for(&mut transport, CRC_KICKOFF, 5_000).context("No data-phase kickoff after header")?;

    let pb = ProgressBar::new(bytes.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    for (i, chunk) in bytes.chunks(1024).enumerate() {
        if let Err(e) = send_block(&mut transport, &data_block((i + 1) as u8, chunk)) {
            pb.abandon();
            return Err(e.context(format!("Block {} rejected", i + 1)));
        }
        pb.set_position(((i * 1024) + chunk.len()) as u64);
    }
    pb.finish_with_message("Data sent");

    // End of file: NAK expected on the first EOT, ACK on the second.
    transport.send(&[EOT])?;
    expect_reply(&mut transport, NAK, "first EOT")?;
    transport.send(&[EOT])?;
    expect_reply(&mut transport, ACK, "second EOT")?;

    // Null header block ends the session.
    wait_for(&mut transport, CRC_KICKOFF, 5_000).context("No kickoff before the close block")?;
    send_block(&mut transport, &close_block())?;
    let _ = wait_for(&mut transport, SESSION_CLOSE, 2_000);

    println!();
    println!("Transfer complete; the device is verifying the image.");

    Ok(())
}

fn parse_version(version: &str) -> Result<(u8, u8, u8)> {
    let mut parts = version.split('.');
    let mut next = |name: &str| -> Result<u8> {
        parts
            .next()
            .unwrap_or("0")
            .parse::<u8>()
            .with_context(|| format!("Bad {} version in '{}'", name, version))
    };
    Ok((next("major")?, next("minor")?, next("patch")?))
}

fn block(kind: u8, seq: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 5);
    frame.push(kind);
    frame.push(seq);
    frame.push(!seq);
    frame.extend_from_slice(data);
    frame.extend_from_slice(&crc16(data).to_be_bytes());
    frame
}

fn header_block(name: &str, size: usize) -> Vec<u8> {
    let mut data = [0u8; 128];
    let name = name.as_bytes();
    let name_len = name.len().min(100);
    data[..name_len].copy_from_slice(&name[..name_len]);
    let size = size.to_string();
    data[name_len + 1..name_len + 1 + size.len()].copy_from_slice(size.as_bytes());
    block(SOH, 0, &data)
}

fn data_block(seq: u8, chunk: &[u8]) -> Vec<u8> {
    let mut data = [0x1Au8; 1024];
    data[..chunk.len()].copy_from_slice(chunk);
    block(STX, seq, &data)
}

fn close_block() -> Vec<u8> {
    block(SOH, 0, &[0u8; 128])
}

/// Transmit one block, retrying on NAK or silence.
fn send_block(transport: &mut Transport, frame: &[u8]) -> Result<()> {
    for _ in 0..BLOCK_RETRIES {
        transport.send(frame)?;
        loop {
            match transport.read_byte(3_000)? {
                Some(b) if b == ACK => return Ok(()),
                Some(b) if b == NAK => break, // retransmit
                Some(b) if b == CAN => bail!("Receiver cancelled the transfer"),
                Some(_) => {} // stray kickoff or echo; keep reading
                None => break,
            }
        }
    }
    bail!("Block not acknowledged after {} attempts", BLOCK_RETRIES)
}

fn expect_reply(transport: &mut Transport, wanted: u8, what: &str) -> Result<()> {
    match transport.read_byte(3_000)? {
        Some(b) if b == wanted => Ok(()),
        Some(b) => bail!("Unexpected 0x{:02x} in reply to {}", b, what),
        None => bail!("No reply to {}", what),
    }
}

/// Swallow bytes until `wanted` shows up.
fn wait_for(transport: &mut Transport, wanted: u8, timeout_ms: u64) -> Result<()> {
    let mut remaining = timeout_ms;
    loop {
        match transport.read_byte(1_000)? {
            Some(b) if b == wanted => return Ok(()),
            Some(_) => {}
            None => {
                remaining = remaining.saturating_sub(1_000);
                if remaining == 0 {
                    bail!("Timed out waiting for 0x{:02x}", wanted);
                }
            }
        }
    }
}
