// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error;

/// Length of the version reply: opcode + version byte.
pub const VERSION_REPLY_LEN: usize = 2;

/// Length of the MD5 reply: opcode + 16 byte digest.
pub const MD5_REPLY_LEN: usize = 17;

/// Opcodes in the first payload byte of a bootloader packet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Version = 0,
    /// Reserved, not handled by the bootloader
    ErasePage = 1,
    Write = 2,
    Read = 3,
    Md5 = 4,
    /// Reserved, not handled by the bootloader
    Info = 5,
    Jump = 6,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Version),
            1 => Ok(Self::ErasePage),
            2 => Ok(Self::Write),
            3 => Ok(Self::Read),
            4 => Ok(Self::Md5),
            5 => Ok(Self::Info),
            6 => Ok(Self::Jump),
            other => Err(other),
        }
    }
}

/// A span of flash: `size` bytes starting at `start`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRange {
    pub start: u32,
    pub size: u32,
}

impl FlashRange {
    /// Encoded size: two little-endian `u32`.
    pub const SIZE: usize = 8;

    pub const fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::SIZE {
            return Err(Error::Truncated);
        }
        Ok(Self {
            start: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0; Self::SIZE];
        out[..4].copy_from_slice(&self.start.to_le_bytes());
        out[4..].copy_from_slice(&self.size.to_le_bytes());
        out
    }
}

/// A decoded bootloader request.
///
/// Reserved opcodes ([`Opcode::ErasePage`], [`Opcode::Info`]) and bytes that
/// are not opcodes at all decode to [`Command::Unknown`] so that callers can
/// log and drop them.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    Write(FlashRange),
    Read(FlashRange),
    Md5(FlashRange),
    Jump,
    Unknown(u8),
}

impl Command {
    /// Decode a bootloader payload. Bytes past the arguments are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let (&opcode, args) = payload.split_first().ok_or(Error::Truncated)?;
        let command = match Opcode::try_from(opcode) {
            Ok(Opcode::Version) => Self::Version,
            Ok(Opcode::Write) => Self::Write(FlashRange::parse(args)?),
            Ok(Opcode::Read) => Self::Read(FlashRange::parse(args)?),
            Ok(Opcode::Md5) => Self::Md5(FlashRange::parse(args)?),
            Ok(Opcode::Jump) => Self::Jump,
            Ok(Opcode::ErasePage | Opcode::Info) | Err(_) => Self::Unknown(opcode),
        };
        Ok(command)
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Version => Opcode::Version as u8,
            Self::Write(_) => Opcode::Write as u8,
            Self::Read(_) => Opcode::Read as u8,
            Self::Md5(_) => Opcode::Md5 as u8,
            Self::Jump => Opcode::Jump as u8,
            Self::Unknown(opcode) => *opcode,
        }
    }

    /// Encode the request payload into `buf`, returning its length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let range = match self {
            Self::Write(range) | Self::Read(range) | Self::Md5(range) => Some(range),
            Self::Version | Self::Jump | Self::Unknown(_) => None,
        };
        let len = 1 + range.map_or(0, |_| FlashRange::SIZE);
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = self.opcode();
        if let Some(range) = range {
            buf[1..len].copy_from_slice(&range.to_bytes());
        }
        Ok(len)
    }
}
