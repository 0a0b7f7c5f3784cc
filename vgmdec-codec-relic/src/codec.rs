// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Top-level Relic DCT codec: wires the bit-unpacker, dequantizer, and IDCT/overlap-add stages
//! together into a [`ChannelCodec`], one frame producing 512 samples per channel.

use std::any::Any;

use vgmdec_core::errors::Result;
use vgmdec_core::stream::StreamChannel;

use crate::dequant::{build_scales, MAX_SCALES};
use crate::idct::{build_dct_table, build_window_table, decode_frame_base, MAX_SIZE, SIZE_HIGH};
use crate::unpack::{unpack_frame, MAX_FREQ};

const RELIC_BUFFER_SIZE: usize = 0x104;
pub const SAMPLES_PER_FRAME: usize = 512;

/// Maps `codec_rate` to the dequantized-spectrum half-width, per the original's own thresholds.
fn freq_size_for_rate(codec_rate: u32) -> usize {
    if codec_rate < 22050 {
        128
    }
    else if codec_rate == 22050 {
        256
    }
    else {
        512
    }
}

#[derive(Clone)]
struct ChannelState {
    exponents: [u8; MAX_FREQ],
    wave_prv: [f64; MAX_SIZE],
}

impl Default for ChannelState {
    fn default() -> Self {
        ChannelState { exponents: [0; MAX_FREQ], wave_prv: [0.0; MAX_SIZE] }
    }
}

pub struct RelicDctCodec {
    frame_size: usize,
    freq_size: usize,
    dct: [f64; MAX_SIZE],
    window: [f64; MAX_SIZE],
    scales: [f64; MAX_SCALES],
    state: Vec<ChannelState>,
}

impl RelicDctCodec {
    /// `bitrate` is in bits/sec; the per-channel, per-frame byte count is `bitrate / 8`.
    /// `codec_rate` is the stream's sample rate and only selects `freq_size` — the DCT itself
    /// always runs at `SIZE_HIGH`, matching every known stream (see [`crate::idct`]).
    pub fn new(channel_count: usize, bitrate: u32, codec_rate: u32) -> Self {
        RelicDctCodec {
            frame_size: (bitrate / 8) as usize,
            freq_size: freq_size_for_rate(codec_rate),
            dct: build_dct_table(),
            window: build_window_table(),
            scales: build_scales(),
            state: vec![ChannelState::default(); channel_count],
        }
    }

    fn decode_frame(&mut self, channel: &mut StreamChannel, channel_index: usize) -> Result<[i16; SAMPLES_PER_FRAME]> {
        let mut buf = vec![0u8; RELIC_BUFFER_SIZE];
        let n = channel.file.read(&mut buf[..self.frame_size.min(RELIC_BUFFER_SIZE)], channel.offset)?;
        channel.offset += n as u64;
        // Any bytes past what was actually read (short frame_size, or EOF) stay zero, matching
        // the original's own padding so the bit reader never samples uninitialized data.

        let mut freq1 = [0.0f64; MAX_FREQ];
        let mut freq2 = [0.0f64; MAX_FREQ];
        let state = &mut self.state[channel_index];
        let unpacked =
            unpack_frame(&buf, &mut freq1, &mut freq2, &self.scales, &mut state.exponents, self.freq_size);

        // A frame whose bit layout runs past the buffer (truncated stream, bad frame_size) decodes
        // to silence rather than transforming garbage spectra.
        if !unpacked {
            return Ok([0i16; SAMPLES_PER_FRAME]);
        }

        let wave = decode_frame_base(&freq1, &freq2, &mut state.wave_prv, &self.dct, &self.window, SIZE_HIGH, SIZE_HIGH);

        let mut out = [0i16; SAMPLES_PER_FRAME];
        for (dst, &src) in out.iter_mut().zip(wave.iter()) {
            *dst = src.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
        Ok(out)
    }
}

impl vgmdec_core::codecs::ChannelCodec for RelicDctCodec {
    fn reset(&mut self) {
        for s in &mut self.state {
            *s = ChannelState::default();
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
                let n = skip.min(SAMPLES_PER_FRAME);
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
        Box::new(self.state[channel_index].clone())
    }

    fn restore(&mut self, channel_index: usize, snapshot: &(dyn Any + Send)) {
        if let Some(s) = snapshot.downcast_ref::<ChannelState>() {
            self.state[channel_index] = s.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgmdec_core::codecs::ChannelCodec;
    use vgmdec_core::io::MemoryFile;

    #[test]
    fn silent_frames_decode_to_silence() {
        let data = vec![0u8; 0x100 * 3];
        let file = Box::new(MemoryFile::new(data, "test.relic"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = RelicDctCodec::new(1, 0x800, 44100);
        let mut out = [1i16; SAMPLES_PER_FRAME];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0i16; SAMPLES_PER_FRAME]);
    }

    #[test]
    fn resume_mid_frame_skips_already_decoded_samples() {
        let data = vec![0u8; 0x100 * 3];
        let file = Box::new(MemoryFile::new(data.clone(), "test.relic"));
        let mut full_channel = StreamChannel::new(file, 0);
        let mut full_codec = RelicDctCodec::new(1, 0x800, 44100);
        let mut full_out = [0i16; SAMPLES_PER_FRAME];
        full_codec.decode_channel(&mut full_channel, &mut full_out, 0, 0).unwrap();

        let file = Box::new(MemoryFile::new(data, "test.relic"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = RelicDctCodec::new(1, 0x800, 44100);
        let mut tail = [0i16; 100];
        codec.decode_channel(&mut channel, &mut tail, 0, 50).unwrap();
        assert_eq!(&tail[..], &full_out[50..150]);
    }

    #[test]
    fn snapshot_restore_round_trips_channel_state() {
        let data = vec![0u8; 0x100 * 2];
        let file = Box::new(MemoryFile::new(data, "test.relic"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = RelicDctCodec::new(1, 0x800, 44100);
        let mut out = [0i16; SAMPLES_PER_FRAME];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        let snap = codec.snapshot(0);
        codec.reset();
        codec.restore(0, snap.as_ref());
        assert!(codec.state[0].wave_prv.iter().all(|&v| v == 0.0));
    }
}
