// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Raw PCM: s8/u8, s16/s24/s32 little- and big-endian, f32 little- and big-endian.
//!
//! PCM has no inter-sample dependency, so unlike the ADPCM family this codec never needs to
//! replay earlier samples to reach `first_sample` — it seeks straight to the requested offset.
//! De-interleaving (if any) is the layout's job; this codec only ever reads a flat run of samples
//! from whichever [`vgmdec_core::stream::StreamChannel`] it's handed.

use std::any::Any;

use vgmdec_core::codecs::ChannelCodec;
use vgmdec_core::errors::Result;
use vgmdec_core::io::StreamReader;
use vgmdec_core::stream::StreamChannel;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PcmFormat {
    S8,
    U8,
    S16Le,
    S16Be,
    S24Le,
    S24Be,
    S32Le,
    S32Be,
    F32Le,
    F32Be,
}

impl PcmFormat {
    pub fn bytes_per_sample(&self) -> u64 {
        match self {
            PcmFormat::S8 | PcmFormat::U8 => 1,
            PcmFormat::S16Le | PcmFormat::S16Be => 2,
            PcmFormat::S24Le | PcmFormat::S24Be => 3,
            PcmFormat::S32Le | PcmFormat::S32Be | PcmFormat::F32Le | PcmFormat::F32Be => 4,
        }
    }

    fn read_sample(&self, reader: &mut StreamReader<'_>) -> Result<i16> {
        Ok(match self {
            PcmFormat::S8 => (reader.read_i8()? as i32 * 256) as i16,
            PcmFormat::U8 => ((reader.read_u8()? as i32 - 128) * 256) as i16,
            PcmFormat::S16Le => reader.read_i16le()?,
            PcmFormat::S16Be => reader.read_i16be()?,
            PcmFormat::S24Le => sign_extend_24(reader.read_u24le()?),
            PcmFormat::S24Be => sign_extend_24(reader.read_u24be()?),
            PcmFormat::S32Le => (reader.read_i32le()? >> 16) as i16,
            PcmFormat::S32Be => (reader.read_i32be()? >> 16) as i16,
            PcmFormat::F32Le => float_to_i16(reader.read_f32le()?),
            PcmFormat::F32Be => float_to_i16(reader.read_f32be()?),
        })
    }
}

/// A 24-bit value packed into the low bits of a `u32`, widened to `i16` by taking its top 16 bits.
fn sign_extend_24(raw: u32) -> i16 {
    let signed = if raw & 0x0080_0000 != 0 { raw as i32 - 0x0100_0000 } else { raw as i32 };
    (signed >> 8) as i16
}

fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

pub struct PcmCodec {
    format: PcmFormat,
}

impl PcmCodec {
    pub fn new(format: PcmFormat) -> Self {
        PcmCodec { format }
    }
}

impl ChannelCodec for PcmCodec {
    fn reset(&mut self) {}

    fn decode_channel(
        &mut self,
        channel: &mut StreamChannel,
        out: &mut [i16],
        _channel_index: usize,
        first_sample: usize,
    ) -> Result<()> {
        let start = channel.offset + first_sample as u64 * self.format.bytes_per_sample();
        let mut reader = StreamReader::new(&mut *channel.file, start);
        for slot in out.iter_mut() {
            *slot = self.format.read_sample(&mut reader)?;
        }
        channel.offset = reader.pos();
        Ok(())
    }

    fn snapshot(&self, _channel_index: usize) -> Box<dyn Any + Send> {
        Box::new(())
    }

    fn restore(&mut self, _channel_index: usize, _snapshot: &(dyn Any + Send)) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgmdec_core::io::MemoryFile;

    fn channel(data: Vec<u8>) -> StreamChannel {
        StreamChannel::new(Box::new(MemoryFile::new(data, "test.pcm")), 0)
    }

    #[test]
    fn s16le_round_trips() {
        let mut ch = channel(vec![0x34, 0x12, 0xCD, 0xAB]);
        let mut codec = PcmCodec::new(PcmFormat::S16Le);
        let mut out = [0i16; 2];
        codec.decode_channel(&mut ch, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0x1234, -0x5433]);
    }

    #[test]
    fn u8_centers_at_128() {
        let mut ch = channel(vec![128, 0, 255]);
        let mut codec = PcmCodec::new(PcmFormat::U8);
        let mut out = [0i16; 3];
        codec.decode_channel(&mut ch, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0, -128 * 256, 127 * 256]);
    }

    #[test]
    fn first_sample_seeks_without_replaying_history() {
        let data: Vec<u8> = (0..20).flat_map(|i: i16| i.to_le_bytes()).collect();
        let mut ch = channel(data);
        let mut codec = PcmCodec::new(PcmFormat::S16Le);
        let mut out = [0i16; 4];
        codec.decode_channel(&mut ch, &mut out, 0, 10).unwrap();
        assert_eq!(out, [10, 11, 12, 13]);
    }

    #[test]
    fn f32_clamps_out_of_range_values() {
        let mut ch = channel(2.0f32.to_le_bytes().to_vec());
        let mut codec = PcmCodec::new(PcmFormat::F32Le);
        let mut out = [0i16; 1];
        codec.decode_channel(&mut ch, &mut out, 0, 0).unwrap();
        assert_eq!(out[0], i16::MAX);
    }
}
