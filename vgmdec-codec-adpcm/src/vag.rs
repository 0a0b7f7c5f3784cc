// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PSX/VAG ADPCM: the PS1/PS2-family codec. 16-byte frames by default (configurable for
//! `VAG_ADPCM_cfg` variants), 28 samples per frame.

use std::any::Any;

use vgmdec_core::errors::Result;
use vgmdec_core::stream::StreamChannel;

use crate::{read_exact, signed_nibbles};

/// `(coefficient_1, coefficient_2)` pairs, scaled by 64. Index selected by the frame's predictor
/// nibble.
const COEFFICIENTS: [(i32, i32); 5] = [(0, 0), (60, 0), (115, -52), (98, -55), (122, -60)];

/// A loop-terminator/silence frame flag. The decoder zero-fills the frame instead of decoding it.
const FLAG_END: u8 = 0x07;

#[derive(Copy, Clone, Default)]
struct History {
    hist1: i32,
    hist2: i32,
}

pub struct VagAdpcmCodec {
    frame_size: u32,
    history: Vec<History>,
}

impl VagAdpcmCodec {
    /// `frame_size` is almost always 16; some titles (`VAG_ADPCM_cfg`) use a non-standard size.
    pub fn new(channel_count: usize, frame_size: u32) -> Self {
        VagAdpcmCodec { frame_size, history: vec![History::default(); channel_count] }
    }

    fn decode_frame(&mut self, channel: &mut StreamChannel, channel_index: usize) -> Result<[i16; 28]> {
        let mut header = [0u8; 2];
        read_exact(channel, &mut header)?;
        let predictor = (header[0] >> 4) as usize;
        let shift = (header[0] & 0x0F).min(12) as u32;
        let flag = header[1];

        let mut data = [0u8; 14];
        read_exact(channel, &mut data)?;

        let hist = &mut self.history[channel_index];
        let mut out = [0i16; 28];

        if flag == FLAG_END {
            hist.hist1 = 0;
            hist.hist2 = 0;
            return Ok(out);
        }

        let (c1, c2) = COEFFICIENTS[predictor.min(4)];
        for (i, &byte) in data.iter().enumerate() {
            let (lo, hi) = signed_nibbles(byte);
            for (j, nibble) in [lo, hi].into_iter().enumerate() {
                let raw = (nibble << 12) >> shift;
                let predicted = (hist.hist1 * c1 + hist.hist2 * c2 + 32) >> 6;
                let sample = (raw + predicted).clamp(i16::MIN as i32, i16::MAX as i32);
                hist.hist2 = hist.hist1;
                hist.hist1 = sample;
                out[i * 2 + j] = sample as i16;
            }
        }
        Ok(out)
    }
}

impl vgmdec_core::codecs::ChannelCodec for VagAdpcmCodec {
    fn reset(&mut self) {
        for h in &mut self.history {
            *h = History::default();
        }
    }

    fn decode_channel(
        &mut self,
        channel: &mut StreamChannel,
        out: &mut [i16],
        channel_index: usize,
        first_sample: usize,
    ) -> Result<()> {
        let mut skip = first_sample;
        let mut produced = 0;
        while produced < out.len() {
            let frame = self.decode_frame(channel, channel_index)?;
            let mut it = frame.into_iter();
            if skip > 0 {
                let n = skip.min(28);
                for _ in 0..n {
                    it.next();
                }
                skip -= n;
            }
            for sample in it {
                if produced == out.len() {
                    break;
                }
                out[produced] = sample;
                produced += 1;
            }
        }
        Ok(())
    }

    fn snapshot(&self, channel_index: usize) -> Box<dyn Any + Send> {
        Box::new(self.history[channel_index])
    }

    fn restore(&mut self, channel_index: usize, snapshot: &(dyn Any + Send)) {
        if let Some(h) = snapshot.downcast_ref::<History>() {
            self.history[channel_index] = *h;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgmdec_core::codecs::ChannelCodec;
    use vgmdec_core::io::MemoryFile;

    fn frame(predictor: u8, shift: u8, flag: u8, nibbles: [i32; 28]) -> Vec<u8> {
        let mut bytes = vec![(predictor << 4) | shift, flag];
        for pair in nibbles.chunks(2) {
            let lo = (pair[0] & 0x0F) as u8;
            let hi = (pair[1] & 0x0F) as u8;
            bytes.push(lo | (hi << 4));
        }
        bytes
    }

    #[test]
    fn silent_frame_with_predictor_zero_shift_zero_is_zero() {
        let data = frame(0, 0, 0, [0; 28]);
        let file = Box::new(MemoryFile::new(data, "test.vag"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = VagAdpcmCodec::new(1, 16);
        let mut out = [0i16; 28];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0i16; 28]);
    }

    #[test]
    fn end_flag_zero_fills_and_resets_history() {
        let data = frame(1, 0, FLAG_END, [7; 28]);
        let file = Box::new(MemoryFile::new(data, "test.vag"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = VagAdpcmCodec::new(1, 16);
        codec.history[0] = History { hist1: 123, hist2: 45 };
        let mut out = [1i16; 28];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0i16; 28]);
        assert_eq!(codec.history[0].hist1, 0);
        assert_eq!(codec.history[0].hist2, 0);
    }

    #[test]
    fn resume_mid_frame_skips_already_decoded_samples() {
        let data = frame(2, 2, 0, [3; 28]);
        let file = Box::new(MemoryFile::new(data.clone(), "test.vag"));
        let mut full_channel = StreamChannel::new(file, 0);
        let mut full_codec = VagAdpcmCodec::new(1, 16);
        let mut full_out = [0i16; 28];
        full_codec.decode_channel(&mut full_channel, &mut full_out, 0, 0).unwrap();

        let file = Box::new(MemoryFile::new(data, "test.vag"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = VagAdpcmCodec::new(1, 16);
        let mut tail = [0i16; 20];
        codec.decode_channel(&mut channel, &mut tail, 0, 8).unwrap();
        assert_eq!(&tail[..], &full_out[8..]);
    }
}
