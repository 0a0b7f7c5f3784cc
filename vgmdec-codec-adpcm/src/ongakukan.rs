// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ongakukan ADPCM (PS2/PSP): one byte encodes two samples, with a running multiplicative scale
//! instead of a lookup-table step index.

use std::any::Any;

use vgmdec_core::errors::Result;
use vgmdec_core::stream::StreamChannel;

use crate::read_exact;

const FILTER_TABLE: [i32; 16] =
    [233, 549, 453, 375, 310, 233, 233, 233, 233, 233, 233, 233, 310, 375, 453, 549];

#[derive(Copy, Clone)]
struct State {
    base_scale: i32,
    hist0: i32,
    hist1: i32,
}

impl Default for State {
    fn default() -> Self {
        State { base_scale: 16, hist0: 0, hist1: 0 }
    }
}

pub struct OngakukanAdpcmCodec {
    state: Vec<State>,
}

impl OngakukanAdpcmCodec {
    pub fn new(channel_count: usize) -> Self {
        OngakukanAdpcmCodec { state: vec![State::default(); channel_count] }
    }
}

/// Applies the high-nibble update: `hist0 = hist1 + (n-8)*base_scale`, then rescales.
fn step_high(state: &mut State, nibble: u8) -> i16 {
    let n = nibble as i32;
    let sample = state.hist1 + (n - 8) * state.base_scale;
    state.hist0 = sample;
    state.base_scale = (state.base_scale * FILTER_TABLE[nibble as usize]) >> 8;
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Applies the low-nibble update: `hist1 = hist0 + (n-8)*base_scale`, then rescales.
fn step_low(state: &mut State, nibble: u8) -> i16 {
    let n = nibble as i32;
    let sample = state.hist0 + (n - 8) * state.base_scale;
    state.hist1 = sample;
    state.base_scale = (state.base_scale * FILTER_TABLE[nibble as usize]) >> 8;
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

impl vgmdec_core::codecs::ChannelCodec for OngakukanAdpcmCodec {
    fn reset(&mut self) {
        for s in &mut self.state {
            *s = State::default();
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
        let mut byte = [0u8; 1];

        while produced < out.len() {
            read_exact(channel, &mut byte)?;
            let n_high = (byte[0] >> 4) & 0x0F;
            let n_low = byte[0] & 0x0F;
            let state = &mut self.state[channel_index];

            for sample in [step_high(state, n_high), step_low(state, n_low)] {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
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
        Box::new(self.state[channel_index])
    }

    fn restore(&mut self, channel_index: usize, snapshot: &(dyn Any + Send)) {
        if let Some(s) = snapshot.downcast_ref::<State>() {
            self.state[channel_index] = *s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgmdec_core::codecs::ChannelCodec;
    use vgmdec_core::io::MemoryFile;

    #[test]
    fn center_nibble_leaves_history_at_zero() {
        let file = Box::new(MemoryFile::new(vec![0x88], "test.adp"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = OngakukanAdpcmCodec::new(1);
        let mut out = [1i16; 2];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn resume_after_first_sample_matches_full_decode() {
        let data = vec![0x3A, 0xC5];
        let file = Box::new(MemoryFile::new(data.clone(), "test.adp"));
        let mut full_channel = StreamChannel::new(file, 0);
        let mut full_codec = OngakukanAdpcmCodec::new(1);
        let mut full_out = [0i16; 4];
        full_codec.decode_channel(&mut full_channel, &mut full_out, 0, 0).unwrap();

        let file = Box::new(MemoryFile::new(data, "test.adp"));
        let mut channel = StreamChannel::new(file, 0);
        let mut codec = OngakukanAdpcmCodec::new(1);
        let mut tail = [0i16; 2];
        codec.decode_channel(&mut channel, &mut tail, 0, 2).unwrap();
        assert_eq!(&tail[..], &full_out[2..]);
    }
}
