// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::{MTU, PAYLOAD_MAX, ROUTING_HEADER_SIZE};
use cpx_protocol::Packet;
use embedded_io::{ErrorKind, Read, ReadExactError, Write};

/// Blocking packet transport.
///
/// One packet in flight per direction: `send` returns once the packet is
/// fully transmitted, `receive` once a full packet has arrived.
pub trait Transport {
    /// Largest payload the link carries in one packet.
    fn payload_capacity(&self) -> usize {
        PAYLOAD_MAX
    }

    fn send(&mut self, packet: &Packet) -> Result<(), LinkError>;

    /// Overwrite `packet` with the next packet from the link.
    fn receive(&mut self, packet: &mut Packet) -> Result<(), LinkError>;
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    Io(ErrorKind),
    /// Link closed in the middle of a frame
    UnexpectedEof,
    /// Frame longer than the MTU, drained and dropped
    Oversized(u16),
    /// Frame too short to hold a routing header
    Malformed,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "i/o error {kind:?}"),
            Self::UnexpectedEof => write!(f, "link closed mid-frame"),
            Self::Oversized(len) => write!(f, "frame of {len} bytes exceeds MTU {MTU}"),
            Self::Malformed => write!(f, "frame shorter than routing header"),
        }
    }
}

fn io<E: embedded_io::Error>(err: E) -> LinkError {
    LinkError::Io(err.kind())
}

fn read_exact<E: embedded_io::Error>(err: ReadExactError<E>) -> LinkError {
    match err {
        ReadExactError::UnexpectedEof => LinkError::UnexpectedEof,
        ReadExactError::Other(err) => io(err),
    }
}

/// Packet framing over a byte link.
///
/// Each frame is the wire length as a little-endian `u16` followed by the
/// routing header and the payload, so the length on the wire is always the
/// payload length plus [`ROUTING_HEADER_SIZE`].
pub struct CpxLink<IO> {
    io: IO,
    frame: [u8; MTU],
}

impl<IO: Read + Write> CpxLink<IO> {
    pub fn new(io: IO) -> Self {
        Self { io, frame: [0; MTU] }
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    /// Throw away `len` bytes of a frame we are not going to use.
    fn drain(&mut self, mut len: usize) -> Result<(), LinkError> {
        while len > 0 {
            let step = len.min(self.frame.len());
            self.io.read_exact(&mut self.frame[..step]).map_err(read_exact)?;
            len -= step;
        }
        Ok(())
    }
}

impl<IO: Read + Write> Transport for CpxLink<IO> {
    fn send(&mut self, packet: &Packet) -> Result<(), LinkError> {
        let len = packet
            .encode(&mut self.frame)
            .map_err(|_| LinkError::Oversized(packet.wire_len() as u16))?;
        self.io.write_all(&(len as u16).to_le_bytes()).map_err(io)?;
        self.io.write_all(&self.frame[..len]).map_err(io)?;
        self.io.flush().map_err(io)
    }

    fn receive(&mut self, packet: &mut Packet) -> Result<(), LinkError> {
        let mut len = [0u8; 2];
        self.io.read_exact(&mut len).map_err(read_exact)?;
        let len = u16::from_le_bytes(len);

        let wire_len = len as usize;
        if wire_len > MTU {
            self.drain(wire_len)?;
            return Err(LinkError::Oversized(len));
        }
        if wire_len < ROUTING_HEADER_SIZE {
            self.drain(wire_len)?;
            return Err(LinkError::Malformed);
        }

        self.io.read_exact(&mut self.frame[..wire_len]).map_err(read_exact)?;
        packet.decode_into(&self.frame[..wire_len]).map_err(|_| LinkError::Malformed)
    }
}
