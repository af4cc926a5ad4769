// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

mod check;
mod client;
mod error;
mod wire;


use check::ImageReport;
use clap::{Parser, Subcommand};
use client::{hex, Gap8Bootloader};
use consts::{DEFAULT_DECK_IP, DEFAULT_DECK_PORT};
use cpx_protocol::FlashRange;
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::net::TcpStream;

#[derive(Debug, Parser)]
#[command(about = "Flash and start firmware on the AI-deck GAP8 over Wi-Fi")]
struct Args {
    /// AI-deck IP address
    #[arg(short = 'n', long, default_value = DEFAULT_DECK_IP)]
    ip: String,
    /// AI-deck port
    #[arg(short, long, default_value_t = DEFAULT_DECK_PORT)]
    port: u16,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Print the bootloader version
    Version,
    /// Dump a flash range
    Read {
        #[arg(value_parser = parse_u32)]
        start: u32,
        #[arg(value_parser = parse_u32)]
        size: u32,
        /// Write the data to a file instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// MD5 of a flash range, computed on the device
    Md5 {
        #[arg(value_parser = parse_u32)]
        start: u32,
        #[arg(value_parser = parse_u32)]
        size: u32,
    },
    /// Program a file into flash at `start`
    Write {
        #[arg(value_parser = parse_u32)]
        start: u32,
        file: PathBuf,
    },
    /// Install a firmware image, verify it and start it
    Flash { image: PathBuf },
    /// Start the installed firmware
    Jump,
    /// Show the segments of an image and check them against the bootloader
    CheckImage { image: PathBuf },
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid number '{s}': {err}"))
}

/// Hex dump, 16 bytes per line, prefixed with the flash address.
fn hex_dump(start: u32, data: &[u8]) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(line, bytes)| {
            let address = start.wrapping_add(line as u32 * 16);
            let bytes: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("{address:08X}: {}\n", bytes.join(" "))
        })
        .collect()
}

async fn connect(ip: &str, port: u16) -> Result<Gap8Bootloader<TcpStream>, Box<dyn Error>> {
    info!("Connecting to {}:{}", ip, port);
    let stream = TcpStream::connect((ip, port)).await?;
    stream.set_nodelay(true)?;
    info!("Connected");
    Ok(Gap8Bootloader::new(stream))
}

async fn check_image(image: &Path) -> Result<ExitCode, Box<dyn Error>> {
    let data = tokio::fs::read(image).await?;
    println!("Showing info for {}", image.display());
    let report = ImageReport::analyze(&data)?;
    println!("{report}");
    Ok(if report.is_loadable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    pretty_env_logger::init();

    let Args { ip, port, command } = Args::parse();

    match command {
        Cmd::Version => {
            let version = connect(&ip, port).await?.version().await?;
            println!("GAP8 bootloader is version {version:#04x}");
        }
        Cmd::Read { start, size, out } => {
            let mut bootloader = connect(&ip, port).await?;
            let data = bootloader.read(FlashRange::new(start, size)).await?;
            match out {
                Some(path) => tokio::fs::write(path, &data).await?,
                None => print!("{}", hex_dump(start, &data)),
            }
        }
        Cmd::Md5 { start, size } => {
            let mut bootloader = connect(&ip, port).await?;
            let digest = bootloader.md5(FlashRange::new(start, size)).await?;
            println!("{}", hex(&digest));
        }
        Cmd::Write { start, file } => {
            let data = tokio::fs::read(file).await?;
            connect(&ip, port).await?.write(start, &data).await?;
            println!("Sent {} bytes to {start:#x}", data.len());
        }
        Cmd::Flash { image } => {
            let data = tokio::fs::read(image).await?;
            connect(&ip, port).await?.flash(&data).await?;
        }
        Cmd::Jump => connect(&ip, port).await?.jump().await?,
        Cmd::CheckImage { image } => return check_image(&image).await,
    }

    Ok(ExitCode::SUCCESS)
}
