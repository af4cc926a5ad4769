// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use cpx_protocol::Opcode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame, request or image
    #[error("protocol error: {0}")]
    Protocol(cpx_protocol::Error),

    #[error("frame of {0} bytes does not fit the link")]
    Oversized(usize),

    #[error("unexpected reply to {request:?}: {reply:02x?}")]
    UnexpectedReply { request: Opcode, reply: Vec<u8> },

    #[error("MD5 mismatch: local {local}, device {device}")]
    DigestMismatch { local: String, device: String },

    #[error("image of {0} bytes does not fit the flash address space")]
    ImageTooLarge(usize),
}

impl From<cpx_protocol::Error> for ClientError {
    fn from(err: cpx_protocol::Error) -> Self {
        Self::Protocol(err)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
