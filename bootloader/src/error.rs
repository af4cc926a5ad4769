// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::transport::LinkError;
use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Flash failure, mirrored from [`NorFlashErrorKind`] so it can be logged.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    NotAligned,
    OutOfBounds,
    Other,
}

impl FlashError {
    pub(crate) fn from_driver<E: NorFlashError>(err: E) -> Self {
        match err.kind() {
            NorFlashErrorKind::NotAligned => Self::NotAligned,
            NorFlashErrorKind::OutOfBounds => Self::OutOfBounds,
            _ => Self::Other,
        }
    }
}

/// Why a request stopped before completing.
///
/// None of these are reported to the peer: a failed request simply produces
/// no (further) reply.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Flash(FlashError),
    Link(LinkError),
    /// Malformed request or image header
    Protocol(cpx_protocol::Error),
}

impl From<FlashError> for Error {
    fn from(err: FlashError) -> Self {
        Self::Flash(err)
    }
}

impl From<LinkError> for Error {
    fn from(err: LinkError) -> Self {
        Self::Link(err)
    }
}

impl From<cpx_protocol::Error> for Error {
    fn from(err: cpx_protocol::Error) -> Self {
        Self::Protocol(err)
    }
}

/// Shorthand for `map_err` on flash driver calls.
pub(crate) fn flash<E: NorFlashError>(err: E) -> Error {
    Error::Flash(FlashError::from_driver(err))
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Flash(FlashError::NotAligned) => write!(f, "flash access not aligned"),
            Self::Flash(FlashError::OutOfBounds) => write!(f, "flash access out of bounds"),
            Self::Flash(FlashError::Other) => write!(f, "flash driver error"),
            Self::Link(err) => write!(f, "link error: {err}"),
            Self::Protocol(err) => write!(f, "{err}"),
        }
    }
}
