// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRI ADX: a fixed-point two-pole predictor ADPCM, the fixed sub-stream codec for AAX segments
//! and one of the formats CPK's per-file sniff can land on. Each frame is a big-endian `i16`
//! scale followed by 4-bit samples, high nibble first.
//!
//! The two predictor coefficients are not stored per file; they're derived once from the stream's
//! sample rate and a highpass cutoff frequency carried in the header, via the standard ADX filter
//! design formula (no literal coefficient table is shipped anywhere in the format).

use std::any::Any;

use vgmdec_core::errors::Result;
use vgmdec_core::stream::StreamChannel;

use crate::read_exact;

#[derive(Copy, Clone, Default)]
struct History {
    hist1: i32,
    hist2: i32,
}

pub struct AdxCodec {
    frame_size: u32,
    coef1: i32,
    coef2: i32,
    history: Vec<History>,
}

impl AdxCodec {
    /// `frame_size` is the whole per-channel frame including its 2-byte scale header (18 for
    /// standard ADX). `highpass_cutoff` is the header's cutoff frequency in Hz.
    pub fn new(channel_count: usize, sample_rate: u32, highpass_cutoff: u32, frame_size: u32) -> Self {
        let (coef1, coef2) = adx_coefficients(sample_rate, highpass_cutoff);
        AdxCodec { frame_size, coef1, coef2, history: vec![History::default(); channel_count] }
    }

    fn samples_per_frame(&self) -> usize {
        (self.frame_size.saturating_sub(2) * 2) as usize
    }

    fn decode_frame(&mut self, channel: &mut StreamChannel, channel_index: usize, out: &mut [i16]) -> Result<()> {
        let mut scale_buf = [0u8; 2];
        read_exact(channel, &mut scale_buf)?;
        let scale = i16::from_be_bytes(scale_buf) as i32;

        let mut data = vec![0u8; (self.frame_size - 2) as usize];
        read_exact(channel, &mut data)?;

        let hist = &mut self.history[channel_index];
        let mut produced = 0;
        for &byte in &data {
            for nibble in [(byte >> 4) as i8, (byte & 0x0F) as i8] {
                if produced >= out.len() {
                    break;
                }
                let signed = if nibble >= 8 { nibble - 16 } else { nibble } as i32;
                let predicted = (hist.hist1 * self.coef1 + hist.hist2 * self.coef2) >> 12;
                let sample = (signed * scale + predicted).clamp(i16::MIN as i32, i16::MAX as i32);
                hist.hist2 = hist.hist1;
                hist.hist1 = sample;
                out[produced] = sample as i16;
                produced += 1;
            }
        }
        Ok(())
    }
}

/// Derives ADX's two IIR predictor coefficients (Q12 fixed point) from the highpass cutoff
/// frequency and sample rate carried in the stream header.
fn adx_coefficients(sample_rate: u32, highpass_cutoff: u32) -> (i32, i32) {
    if sample_rate == 0 {
        return (0, 0);
    }
    let a = std::f64::consts::SQRT_2 - (2.0 * std::f64::consts::PI * highpass_cutoff as f64 / sample_rate as f64).cos();
    let b = std::f64::consts::SQRT_2 - 1.0;
    let c = (a - ((a + b) * (a - b)).sqrt()) / b;

    let coef1 = (c * 2.0 * 4096.0).round() as i32;
    let coef2 = (-(c * c) * 4096.0).round() as i32;
    (coef1, coef2)
}

impl vgmdec_core::codecs::ChannelCodec for AdxCodec {
    fn reset(&mut self) {
        for h in &mut self.history {
            *h = History::default();
        }
    }

    fn decode_channel(&mut self, channel: &mut StreamChannel, out: &mut [i16], channel_index: usize, first_sample: usize) -> Result<()> {
        let samples_per_frame = self.samples_per_frame();
        let mut skip = first_sample;
        let mut produced = 0;

        while produced < out.len() {
            let mut frame = vec![0i16; samples_per_frame];
            self.decode_frame(channel, channel_index, &mut frame)?;

            let mut start = 0;
            if skip > 0 {
                start = skip.min(samples_per_frame);
                skip -= start;
            }
            for &sample in &frame[start..] {
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

    fn frame(scale: i16, nibbles: [i8; 32]) -> Vec<u8> {
        let mut bytes = scale.to_be_bytes().to_vec();
        for pair in nibbles.chunks(2) {
            let hi = (pair[0] as u8) & 0x0F;
            let lo = (pair[1] as u8) & 0x0F;
            bytes.push((hi << 4) | lo);
        }
        bytes
    }

    #[test]
    fn zero_scale_or_zero_nibbles_decodes_to_history_only() {
        let data = frame(0, [0; 32]);
        let file = Box::new(MemoryFile::new(data, "test.adx"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = AdxCodec::new(1, 44100, 2200, 18);
        let mut out = [1i16; 32];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0i16; 32]);
    }

    #[test]
    fn resume_mid_frame_skips_already_decoded_samples() {
        let data = frame(100, [3; 32]);
        let file = Box::new(MemoryFile::new(data.clone(), "test.adx"));
        let mut full_channel = StreamChannel::new(file, 0);
        let mut full_codec = AdxCodec::new(1, 44100, 2200, 18);
        let mut full_out = [0i16; 32];
        full_codec.decode_channel(&mut full_channel, &mut full_out, 0, 0).unwrap();

        let file = Box::new(MemoryFile::new(data, "test.adx"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = AdxCodec::new(1, 44100, 2200, 18);
        let mut tail = [0i16; 20];
        codec.decode_channel(&mut channel, &mut tail, 0, 12).unwrap();
        assert_eq!(&tail[..], &full_out[12..]);
    }

    #[test]
    fn coefficients_are_finite_for_a_typical_cutoff() {
        let (c1, c2) = adx_coefficients(44100, 2272);
        assert!(c1 != 0 || c2 != 0);
    }
}
