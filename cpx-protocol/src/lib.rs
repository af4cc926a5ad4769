// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Routed packet protocol spoken between the host, the Wi-Fi co-processor and
//! the GAP8 bootloader.
//!
//! Every packet starts with a two byte routing header naming the destination
//! and source endpoints and the functional channel, followed by the payload.
//! Bootloader traffic uses the [`Function::Bootloader`] channel; its payload
//! starts with a one byte opcode (see [`Command`]).

#![no_std]

mod command;
mod image;


pub use command::{Command, FlashRange, Opcode, MD5_REPLY_LEN, VERSION_REPLY_LEN};
pub use consts::{MTU, PAYLOAD_MAX, ROUTING_HEADER_SIZE};
pub use image::{ImageHeader, SegmentDescriptor};

use heapless::Vec;

/// Logical endpoint on the deck or the host side.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stm32,
    Esp32,
    Host,
    Gap8,
    /// Any value not listed above, kept so that decoding never fails
    Unknown(u8),
}

impl From<u8> for Target {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Stm32,
            2 => Self::Esp32,
            3 => Self::Host,
            4 => Self::Gap8,
            other => Self::Unknown(other),
        }
    }
}

impl From<Target> for u8 {
    fn from(target: Target) -> Self {
        match target {
            Target::Stm32 => 1,
            Target::Esp32 => 2,
            Target::Host => 3,
            Target::Gap8 => 4,
            Target::Unknown(other) => other,
        }
    }
}

/// Functional channel multiplexed over the same link.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    System,
    Console,
    Crtp,
    WifiCtrl,
    App,
    Test,
    Bootloader,
    Unknown(u8),
}

impl From<u8> for Function {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::System,
            0x02 => Self::Console,
            0x03 => Self::Crtp,
            0x04 => Self::WifiCtrl,
            0x05 => Self::App,
            0x0E => Self::Test,
            0x0F => Self::Bootloader,
            other => Self::Unknown(other),
        }
    }
}

impl From<Function> for u8 {
    fn from(function: Function) -> Self {
        match function {
            Function::System => 0x01,
            Function::Console => 0x02,
            Function::Crtp => 0x03,
            Function::WifiCtrl => 0x04,
            Function::App => 0x05,
            Function::Test => 0x0E,
            Function::Bootloader => 0x0F,
            Function::Unknown(other) => other,
        }
    }
}

/// Routing header carried by every packet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub destination: Target,
    pub source: Target,
    pub function: Function,
}

impl Routing {
    pub const fn new(destination: Target, source: Target, function: Function) -> Self {
        Self {
            destination,
            source,
            function,
        }
    }

    /// Pack the header: destination in the low nibble, source in the high
    /// nibble of the first byte, function in the second byte.
    pub fn encode(&self) -> [u8; ROUTING_HEADER_SIZE] {
        let destination = u8::from(self.destination) & 0x0F;
        let source = u8::from(self.source) & 0x0F;
        [(source << 4) | destination, u8::from(self.function)]
    }

    pub fn decode(bytes: [u8; ROUTING_HEADER_SIZE]) -> Self {
        Self {
            destination: Target::from(bytes[0] & 0x0F),
            source: Target::from(bytes[0] >> 4),
            function: Function::from(bytes[1]),
        }
    }

    /// Header of the reply to a packet carrying this header.
    ///
    /// The reply goes back to whoever sent the request, comes from `me`, and
    /// always travels on the bootloader channel.
    pub fn reply(&self, me: Target) -> Self {
        Self::new(self.source, me, Function::Bootloader)
    }

    pub fn is_bootloader(&self) -> bool {
        self.function == Function::Bootloader
    }
}

impl Default for Routing {
    fn default() -> Self {
        Self::new(Target::Unknown(0), Target::Unknown(0), Function::Unknown(0))
    }
}

/// A routed packet: header plus a payload of at most [`PAYLOAD_MAX`] bytes.
///
/// Packets are meant to be allocated once and reused; [`Packet::decode_into`]
/// overwrites an existing packet in place.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub routing: Routing,
    pub payload: Vec<u8, PAYLOAD_MAX>,
}

impl Packet {
    pub const fn new(routing: Routing) -> Self {
        Self {
            routing,
            payload: Vec::new(),
        }
    }

    /// Number of bytes this packet occupies on the wire.
    pub fn wire_len(&self) -> usize {
        ROUTING_HEADER_SIZE + self.payload.len()
    }

    /// Replace the payload with `data`.
    pub fn set_payload(&mut self, data: &[u8]) -> Result<(), Error> {
        self.payload.clear();
        self.payload
            .extend_from_slice(data)
            .map_err(|_| Error::PayloadTooLarge)
    }

    /// Write `[routing][payload]` to `buf`, returning the number of bytes
    /// written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let len = self.wire_len();
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }
        buf[..ROUTING_HEADER_SIZE].copy_from_slice(&self.routing.encode());
        buf[ROUTING_HEADER_SIZE..len].copy_from_slice(&self.payload);
        Ok(len)
    }

    /// Parse a wire packet into `self`, reusing its payload storage.
    pub fn decode_into(&mut self, wire: &[u8]) -> Result<(), Error> {
        if wire.len() < ROUTING_HEADER_SIZE {
            return Err(Error::Truncated);
        }
        self.routing = Routing::decode([wire[0], wire[1]]);
        self.set_payload(&wire[ROUTING_HEADER_SIZE..])
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Output buffer cannot hold the encoded data
    BufferTooSmall,
    /// Payload exceeds the capacity of one packet
    PayloadTooLarge,
    /// Input ended before a complete header or argument block
    Truncated,
    /// Image header segment count outside `1..=16`
    InvalidSegmentCount(u32),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::PayloadTooLarge => write!(f, "payload larger than {PAYLOAD_MAX} bytes"),
            Self::Truncated => write!(f, "truncated packet"),
            Self::InvalidSegmentCount(count) => {
                write!(f, "invalid segment count {count} in image header")
            }
        }
    }
}
