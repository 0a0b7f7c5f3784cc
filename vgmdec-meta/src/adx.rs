// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standalone CRI ADX container: the header `vgmdec_codec_adpcm::AdxCodec` frames are read
//! through, and the format AAX segments and one CPK sniff branch resolve to.
//!
//! No ADX source survives in the retrieval pack beyond its encryption key table
//! (`adx_keys.h`); the header layout below is a documented reconstruction of the well-known
//! public format, the same way the codec crate's coefficient-derivation formula is. See
//! `DESIGN.md`.

use vgmdec_codec_adpcm::AdxCodec;
use vgmdec_core::codecs::{CodecId, CodecState};
use vgmdec_core::config::{compute_play_samples, resolve_loop, PlaybackConfig};
use vgmdec_core::errors::{malformed, Result};
use vgmdec_core::io::StreamFile;
use vgmdec_core::layout::Layout;
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

pub const MAGIC: u16 = 0x8000;

pub struct AdxHeader {
    pub data_offset: u32,
    pub frame_size: u32,
    pub channel_count: u32,
    pub sample_rate: u32,
    pub sample_count: u32,
    pub highpass_cutoff: u32,
    pub version: u8,
    pub loop_flag: bool,
    pub loop_start_sample: u32,
    pub loop_end_sample: u32,
}

fn be16(buf: &[u8], off: usize) -> Result<u16> {
    buf.get(off..off + 2).map(|b| u16::from_be_bytes(b.try_into().unwrap())).ok_or(vgmdec_core::errors::VgmError::MalformedHeader("ADX header truncated"))
}

fn be32(buf: &[u8], off: usize) -> Result<u32> {
    buf.get(off..off + 4).map(|b| u32::from_be_bytes(b.try_into().unwrap())).ok_or(vgmdec_core::errors::VgmError::MalformedHeader("ADX header truncated"))
}

impl AdxHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 0x14 || be16(buf, 0x00)? != MAGIC {
            return malformed("missing ADX 0x8000 signature");
        }
        let copyright_offset = be16(buf, 0x02)? as u32;
        let data_offset = copyright_offset + 4;
        let frame_size = buf[0x05] as u32;
        let channel_count = buf[0x07] as u32;
        let sample_rate = be32(buf, 0x08)?;
        let sample_count = be32(buf, 0x0C)?;
        let highpass_cutoff = be16(buf, 0x10)? as u32;
        let version = buf[0x12];

        if channel_count == 0 || frame_size < 2 {
            return malformed("ADX header declares zero channels or an impossible frame size");
        }

        let mut loop_flag = false;
        let mut loop_start_sample = 0u32;
        let mut loop_end_sample = 0u32;
        if version == 4 && buf.len() >= 0x2C {
            let loop_count = be32(buf, 0x18)?;
            if loop_count > 0 {
                loop_flag = true;
                loop_start_sample = be32(buf, 0x1C)?;
                loop_end_sample = be32(buf, 0x24)?;
            }
        }

        Ok(AdxHeader {
            data_offset,
            frame_size,
            channel_count,
            sample_rate,
            sample_count,
            highpass_cutoff,
            version,
            loop_flag,
            loop_start_sample,
            loop_end_sample,
        })
    }
}

/// Splits one source into `count` independent per-channel handles, each positioned at `base +
/// channel_index * stride`. Channel 0 reuses `source` itself; the rest are opened as self-siblings
/// (`open_sibling` with the source's own name reopens an independent handle at offset 0), since
/// `StreamFile` has no `Clone`.
pub fn split_interleaved_channels(
    source: Box<dyn StreamFile>,
    count: u32,
    base: u64,
    stride: u64,
) -> Result<Vec<StreamChannel>> {
    let name = source.name().to_string();
    let mut siblings = Vec::with_capacity(count.saturating_sub(1) as usize);
    for _ in 1..count {
        let handle = source
            .open_sibling(&name)?
            .ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("source does not support independent channel handles"))?;
        siblings.push(handle);
    }

    let mut channels = Vec::with_capacity(count as usize);
    channels.push(StreamChannel::new(source, base));
    for (i, handle) in siblings.into_iter().enumerate() {
        let ch = i as u64 + 1;
        channels.push(StreamChannel::new(handle, base + ch * stride));
    }
    Ok(channels)
}

pub struct AdxMeta;

impl Meta for AdxMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "adx", extensions: &["adx"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut probe = [0u8; 0x2C];
        let n = source.read(&mut probe, 0)?;
        if n < 0x14 || u16::from_be_bytes([probe[0], probe[1]]) != MAGIC {
            return Ok(None);
        }

        let header = match AdxHeader::parse(&probe) {
            Ok(h) => h,
            Err(_) => return Ok(None),
        };

        let channel_count = header.channel_count;
        let samples_per_frame = (header.frame_size.saturating_sub(2)) * 2;
        let interleave_block_size = header.frame_size;

        let channels =
            split_interleaved_channels(source, channel_count, header.data_offset as u64, header.frame_size as u64)?;

        let (loop_flag, loop_start_sample, loop_end_sample) = resolve_loop(
            cfg,
            header.loop_flag,
            header.loop_start_sample as i64,
            header.loop_end_sample as i64,
            header.sample_count as i64,
        );
        let play_samples = compute_play_samples(
            cfg,
            loop_flag,
            loop_start_sample,
            loop_end_sample,
            header.sample_count as i64,
            header.sample_rate,
        );

        let codec = AdxCodec::new(channel_count as usize, header.sample_rate, header.highpass_cutoff, header.frame_size);

        let descriptor = StreamDescriptor {
            meta_name: "adx",
            codec: CodecState::PerChannel(CodecId::Adx, Box::new(codec)),
            codec_config: CodecConfig::None,
            layout: Layout::Interleave { block_size: interleave_block_size, first_block_size: None, last_block_size: None },
            channels,
            channel_count,
            sample_rate: header.sample_rate,
            total_samples: header.sample_count as i64,
            loop_flag,
            loop_start_sample,
            loop_end_sample,
            interleave_block_size,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: samples_per_frame as i64,
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples,
            play_forever: cfg.play_forever && cfg.allow_play_forever && loop_flag,
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
