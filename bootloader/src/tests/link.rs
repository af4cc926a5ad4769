// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::*;
use crate::CpxLink;
use embedded_io::{ErrorKind, ErrorType, Read, Write};

/// In-memory byte link. Reads past the end of `input` report end of stream.
#[derive(Default)]
struct Pipe {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl Pipe {
    fn with_frames(frames: &[&[u8]]) -> Self {
        let mut pipe = Self::default();
        for frame in frames {
            pipe.input.extend((frame.len() as u16).to_le_bytes());
            pipe.input.extend(frame.iter().copied());
        }
        pipe
    }
}

impl ErrorType for Pipe {
    type Error = ErrorKind;
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let len = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[test]
fn send_prefixes_wire_length() {
    let mut link = CpxLink::new(Pipe::default());
    let mut packet = Packet::new(reply_routing());
    packet.set_payload(&[1, 2, 3]).unwrap();
    link.send(&packet).unwrap();

    assert_eq!(link.into_inner().output, [5, 0, 0x43, 0x0F, 1, 2, 3]);
}

#[test]
fn receive_parses_frame() {
    let mut link = CpxLink::new(Pipe::with_frames(&[&[0x34, 0x0F, 0x00][..]]));
    let mut packet = Packet::default();
    link.receive(&mut packet).unwrap();

    assert_eq!(
        packet.routing,
        Routing::new(Target::Gap8, Target::Host, Function::Bootloader)
    );
    assert_eq!(&packet.payload[..], &[0]);
}

#[test]
fn oversized_frame_is_drained() {
    let big = vec![0x55; 1100];
    let mut link = CpxLink::new(Pipe::with_frames(&[&big[..], &[0x34, 0x0F, 0x00][..]]));
    let mut packet = Packet::default();

    assert_eq!(link.receive(&mut packet), Err(LinkError::Oversized(1100)));
    link.receive(&mut packet).unwrap();
    assert_eq!(&packet.payload[..], &[0]);
}

#[test]
fn frame_without_header_is_dropped() {
    let mut link = CpxLink::new(Pipe::with_frames(&[&[0x34][..], &[0x34, 0x0F, 0x00][..]]));
    let mut packet = Packet::default();

    assert_eq!(link.receive(&mut packet), Err(LinkError::Malformed));
    link.receive(&mut packet).unwrap();
    assert_eq!(&packet.payload[..], &[0]);
}

#[test]
fn truncated_frame() {
    let mut pipe = Pipe::default();
    pipe.input.extend([10, 0, 0x34, 0x0F, 0x03]);
    let mut link = CpxLink::new(pipe);

    assert_eq!(
        link.receive(&mut Packet::default()),
        Err(LinkError::UnexpectedEof)
    );
}

#[test]
fn bootloader_over_link() {
    let mut flash = MockFlash::new();
    flash.program(0x40000, b"abc");

    let mut md5 = vec![4];
    md5.extend(cpx_protocol::FlashRange::new(0x40000, 3).to_bytes());
    let version = [0x34, 0x0F, 0];
    let mut hash = vec![0x34, 0x0F];
    hash.extend(md5);

    let link = CpxLink::new(Pipe::with_frames(&[&version[..], &hash[..]]));
    let mut bl = Bootloader::new(flash, link, MockPlatform::new(), Config::default());
    bl.poll().unwrap();
    bl.poll().unwrap();

    let (_, link, _) = bl.into_parts();
    let output = link.into_inner().output;
    assert_eq!(&output[..6], &[4, 0, 0x43, 0x0F, 0, 1]);
    assert_eq!(&output[6..10], &[19, 0, 0x43, 0x0F]);
    assert_eq!(output[10], 4);
    assert_eq!(output.len(), 6 + 2 + 2 + 17);
}
