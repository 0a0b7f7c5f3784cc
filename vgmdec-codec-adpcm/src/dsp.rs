// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nintendo DSP ADPCM (GameCube/Wii). 8-byte blocks: one header byte selecting a coefficient pair
//! and a scale, followed by 7 bytes (14 nibbles) of samples.

use std::any::Any;

use vgmdec_core::errors::Result;
use vgmdec_core::stream::StreamChannel;

use crate::{read_exact, signed_nibbles};

#[derive(Copy, Clone, Default)]
struct History {
    hist1: i32,
    hist2: i32,
}

/// Per-channel 16-coefficient table: 8 `(c1, c2)` pairs, read by the meta from the container's
/// header and handed to the codec at construction.
pub type CoefficientTable = [i16; 16];

pub struct DspAdpcmCodec {
    coefficients: Vec<CoefficientTable>,
    history: Vec<History>,
}

impl DspAdpcmCodec {
    pub fn new(coefficients: Vec<CoefficientTable>) -> Self {
        let history = vec![History::default(); coefficients.len()];
        DspAdpcmCodec { coefficients, history }
    }

    fn decode_block(&mut self, channel: &mut StreamChannel, channel_index: usize) -> Result<[i16; 14]> {
        let mut header = [0u8; 1];
        read_exact(channel, &mut header)?;
        let coef_index = (((header[0] >> 4) & 0x0F) as usize).min(7);
        let scale: i32 = 1 << (header[0] & 0x0F);

        let coefs = &self.coefficients[channel_index];
        let (c1, c2) = (coefs[coef_index * 2] as i32, coefs[coef_index * 2 + 1] as i32);

        let mut data = [0u8; 7];
        read_exact(channel, &mut data)?;

        let hist = &mut self.history[channel_index];
        let mut out = [0i16; 14];
        for (i, &byte) in data.iter().enumerate() {
            let (lo, hi) = signed_nibbles(byte);
            for (j, nibble) in [lo, hi].into_iter().enumerate() {
                let raw = (nibble * scale) << 11;
                let predicted = c1 * hist.hist1 + c2 * hist.hist2;
                let sample = ((raw + predicted) >> 11).clamp(i16::MIN as i32, i16::MAX as i32);
                hist.hist2 = hist.hist1;
                hist.hist1 = sample;
                out[i * 2 + j] = sample as i16;
            }
        }
        Ok(out)
    }
}

impl vgmdec_core::codecs::ChannelCodec for DspAdpcmCodec {
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
            let block = self.decode_block(channel, channel_index)?;
            let mut it = block.into_iter();
            if skip > 0 {
                let n = skip.min(14);
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

    #[test]
    fn silence_block_with_zero_coefficients_stays_silent() {
        let data = vec![0x00, 0, 0, 0, 0, 0, 0, 0];
        let file = Box::new(MemoryFile::new(data, "test.dsp"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = DspAdpcmCodec::new(vec![[0i16; 16]; 1]);
        let mut out = [1i16; 14];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0i16; 14]);
    }

    #[test]
    fn resume_mid_block_matches_full_decode_tail() {
        let data = vec![0x20, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];
        let mut coefs = [0i16; 16];
        coefs[4] = 2048;
        coefs[5] = -512;

        let file = Box::new(MemoryFile::new(data.clone(), "test.dsp"));
        let mut full_channel = StreamChannel::new(file, 0);
        let mut full_codec = DspAdpcmCodec::new(vec![coefs; 1]);
        let mut full_out = [0i16; 14];
        full_codec.decode_channel(&mut full_channel, &mut full_out, 0, 0).unwrap();

        let file = Box::new(MemoryFile::new(data, "test.dsp"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = DspAdpcmCodec::new(vec![coefs; 1]);
        let mut tail = [0i16; 8];
        codec.decode_channel(&mut channel, &mut tail, 0, 6).unwrap();
        assert_eq!(&tail[..], &full_out[6..]);
    }
}
