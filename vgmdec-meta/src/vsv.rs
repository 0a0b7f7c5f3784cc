// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VSV: a magic-less PSX ADPCM header used by a handful of PS2-era titles, including a
//! Romancing SaGa variant (`is_rs`) whose loop start needs two extra corrections the original
//! format authors themselves describe as reverse-engineered against known-good soundtrack rips
//! rather than derived from a documented header field. The stream's own first 0x10 bytes are part
//! of the header, not audio, so they must be nulled out before the PSX ADPCM decoder ever sees
//! them or the first frame clicks.

use vgmdec_codec_adpcm::VagAdpcmCodec;
use vgmdec_core::codecs::{CodecId, CodecState};
use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{malformed, Result};
use vgmdec_core::io::{Deblock, IoTransform, StreamFile, Transform};
use vgmdec_core::layout::Layout;
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

const INTERLEAVE: u64 = 0x800;

fn ps_bytes_to_samples(bytes: u64, channels: u32) -> i64 {
    ((bytes / channels as u64) / 16 * 28) as i64
}

/// Nulls everything before `null_offset`, leaving bytes at or past it untouched. Mirrors the
/// original's read-time header blanking: VSV's data region starts at 0x00, immediately under its
/// own header, so without this the decoder's first ADPCM frame would be the header itself.
struct NullHeader {
    null_offset: u64,
}

impl Transform for NullHeader {
    fn transform(&mut self, buf: &mut [u8], offset: u64) {
        if offset >= self.null_offset {
            return;
        }
        let clear = ((self.null_offset - offset) as usize).min(buf.len());
        buf[..clear].fill(0);
    }
}

pub struct VsvMeta;

impl Meta for VsvMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "vsv", extensions: &["vsv", "psh"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        _cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut header = [0u8; 0x10];
        if source.read(&mut header, 0)? < 0x10 {
            return Ok(None);
        }

        // VSV carries no magic; these two bytes are the closest thing to a sniff the original
        // format has (a plausible volume byte, and a byte that's always zero in the wild).
        if header[0x03] > 0x64 || header[0x0a] != 0 {
            return Ok(None);
        }

        let is_rs = u16::from_le_bytes([header[0x00], header[0x01]]) == 0;

        let adjust = u16::from_le_bytes([header[0x04], header[0x05]]) as u64;
        let loop_field = u16::from_le_bytes([header[0x06], header[0x07]]);
        let loop_start_blocks = (loop_field & 0x7fff) as u64;
        let loop_flag = loop_field & 0x8000 != 0;
        let sample_rate = u16::from_le_bytes([header[0x08], header[0x09]]) as u32;
        let flags = header[0x0b];
        let channel_count: u32 = if flags & 1 != 0 { 2 } else { 1 };
        let data_size_blocks = u16::from_le_bytes([header[0x0c], header[0x0d]]) as u64;

        if sample_rate == 0 {
            return malformed("VSV header declares a zero sample rate");
        }

        let mut data_size_bytes = data_size_blocks * INTERLEAVE;
        let loop_start_bytes = loop_start_blocks * INTERLEAVE;

        if !is_rs {
            // adjust's low 11 bits are a discard count past the last full interleave block;
            // adjust & 0xF800 is an unused upper field per the original format notes. Without this
            // correction the tail block's padding reads as extra (wrong) loop and playback data.
            let discard = adjust & 0x07ff;
            let correction = (0x800 - discard) * channel_count as u64;
            data_size_bytes = data_size_bytes.saturating_sub(correction);
        }

        let mut num_samples = ps_bytes_to_samples(data_size_bytes, channel_count);
        let mut loop_start_sample = ps_bytes_to_samples(loop_start_bytes, channel_count);
        let loop_end_sample = num_samples;

        if is_rs {
            // Both corrections below are the original format's own empirically reverse-engineered
            // fudge factors (checked against known-good soundtrack rips, not a documented field);
            // carried over unchanged rather than re-derived.
            loop_start_sample -= ps_bytes_to_samples(channel_count as u64 * INTERLEAVE, channel_count);
            loop_start_sample -= ps_bytes_to_samples(0x200 * channel_count as u64, channel_count);
        }
        if loop_start_sample < 0 {
            loop_start_sample = 0;
        }
        if num_samples < 0 {
            num_samples = 0;
        }

        // Layout::Interleave advances a channel's own block index by `block_size` alone (no
        // channel-count factor), so each channel needs its own fully deinterleaved byte run before
        // it gets there: the header-null transform runs on physical offsets first, and `Deblock`
        // on top of it strips out every other channel's blocks, leaving a flat per-channel stream
        // that starts at logical offset 0.
        let name = source.name().to_string();
        let mut raw_channels: Vec<Box<dyn StreamFile>> = Vec::with_capacity(channel_count as usize);
        raw_channels.push(source);
        for _ in 1..channel_count {
            let sibling = raw_channels[0]
                .open_sibling(&name)?
                .ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("VSV source does not support independent channel handles"))?;
            raw_channels.push(sibling);
        }

        let stride = INTERLEAVE * channel_count as u64;
        let mut channels = Vec::with_capacity(channel_count as usize);
        for (ch, raw) in raw_channels.into_iter().enumerate() {
            let cleaned: Box<dyn StreamFile> = Box::new(IoTransform::new(raw, NullHeader { null_offset: 0x10 }));
            let deblocked = Deblock::new(cleaned, ch as u64 * INTERLEAVE, INTERLEAVE, stride);
            channels.push(StreamChannel::new(Box::new(deblocked), 0));
        }

        let codec = VagAdpcmCodec::new(channel_count as usize, 16);

        let descriptor = StreamDescriptor {
            meta_name: "vsv",
            codec: CodecState::PerChannel(CodecId::VagAdpcm, Box::new(codec)),
            codec_config: CodecConfig::None,
            layout: Layout::Interleave {
                block_size: INTERLEAVE as u32,
                first_block_size: None,
                last_block_size: None,
            },
            channels,
            channel_count,
            sample_rate,
            total_samples: num_samples,
            loop_flag,
            loop_start_sample,
            loop_end_sample,
            interleave_block_size: INTERLEAVE as u32,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: ps_bytes_to_samples(INTERLEAVE, 1),
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples: num_samples,
            play_forever: false,
            play: Default::default(),
            last_loop_output_sample: 0,
            mixer: MixerState::new(channel_count as usize),
            loop_snapshot: None,
            inner_source: None,
        };
        descriptor.validate()?;
        Ok(Some(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(is_rs: bool, adjust: u16, loop_field: u16, rate: u16, flags: u8, data_blocks: u16) -> [u8; 0x10] {
        let mut h = [0u8; 0x10];
        h[0..2].copy_from_slice(&(if is_rs { 0u16 } else { 1u16 }).to_le_bytes());
        h[3] = 0x32;
        h[4..6].copy_from_slice(&adjust.to_le_bytes());
        h[6..8].copy_from_slice(&loop_field.to_le_bytes());
        h[8..10].copy_from_slice(&rate.to_le_bytes());
        h[0x0a] = 0;
        h[0x0b] = flags;
        h[0x0c..0x0e].copy_from_slice(&data_blocks.to_le_bytes());
        h
    }

    #[test]
    fn ps_bytes_to_samples_matches_28_samples_per_16_byte_frame() {
        assert_eq!(ps_bytes_to_samples(32, 2), 28);
    }

    #[test]
    fn rejects_when_sniff_bytes_are_out_of_range() {
        let meta = VsvMeta;
        let mut h = header(false, 0, 0, 44100, 1, 4);
        h[0x03] = 0x65;
        let source = Box::new(vgmdec_core::io::MemoryFile::new(h.to_vec(), "test.vsv"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn null_header_transform_clears_only_bytes_before_the_offset() {
        let mut t = NullHeader { null_offset: 0x10 };
        let mut buf = vec![0xffu8; 0x20];
        t.transform(&mut buf, 0x08);
        assert!(buf[..8].iter().all(|&b| b == 0));
        assert!(buf[8..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn non_rs_stereo_flag_selects_two_channels() {
        let meta = VsvMeta;
        let h = header(false, 0, 0, 44100, 1, 4);
        let mut bytes = h.to_vec();
        bytes.extend(std::iter::repeat(0u8).take(4 * INTERLEAVE as usize));
        let source = Box::new(vgmdec_core::io::MemoryFile::new(bytes, "test.vsv"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.channel_count, 2);
        assert!(!descriptor.loop_flag);
    }
}
