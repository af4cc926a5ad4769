// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Second stage bootloader for the GAP8 on the AI-deck.
//!
//! The bootloader sits on the packet transport and serves one request at a
//! time: it reports its version, streams flash contents out, rewrites flash
//! with data streamed in, hashes flash ranges, and finally loads the installed
//! firmware image into memory and jumps to it.
//!
//! Hardware is reached through three seams: flash through
//! [`embedded_storage::nor_flash::NorFlash`], the link through [`Transport`]
//! and the core/memory through [`Platform`]. The board crate wires these up and
//! calls [`Bootloader::run`].

#![cfg_attr(not(test), no_std)]

// Must go first so the other modules see its macros.
mod fmt;

mod config;
mod engine;
mod error;
mod loader;
mod platform;
mod stream;
mod transport;

#[cfg(target_arch = "riscv32")]
pub mod riscv;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use engine::Bootloader;
pub use error::{Error, FlashError};
pub use loader::{CopyStrategy, Loaded, Region, VectorTable};
pub use platform::Platform;
pub use transport::{CpxLink, LinkError, Transport};
