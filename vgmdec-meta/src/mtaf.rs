// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MTAF: fixed two-channel IMA ADPCM in 0x100-byte blocks, grouped under a repeating group
//! header that can chain forward over empty groups.
//!
//! The block state machine below is grounded on the retrieval pack's own block-update routine:
//! a persistent block counter starts at the sentinel value 1 ("no group read yet"); whenever it
//! reaches that sentinel the layout reads a group header (a block count at `+0x0C`, doubled; a
//! zero count means the group is empty and carries a forward-skip distance at `+0x04`, chained
//! until a nonzero count is found) and then steps into the first block of the group; otherwise it
//! just decrements the counter and reuses the current block. Every call re-reads each channel's
//! `step_index` (`+0x4 + ch*2`, clamped to `[0, 88]`) and `history1` (`+0x8 + ch*4`) regardless of
//! whether a group header was just read. A debug-only comparison against a fixed file offset in
//! that routine has no effect on decoding and is not replicated here.
//!
//! No MTAF container-header source survives in the retrieval pack (only the block layout does);
//! the outer file header recognized by [`MtafMeta`] is a documented reconstruction of the public
//! layout, the same way the AWB and standalone ADX container headers are. See `DESIGN.md`.

use vgmdec_codec_adpcm::{ImaAdpcmCodec, ImaSnapshot};
use vgmdec_core::codecs::{ChannelCodec, CodecId, CodecState};
use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{malformed, Result};
use vgmdec_core::io::StreamFile;
use vgmdec_core::layout::{BlockLayout, Layout};
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

const CHANNEL_COUNT: usize = 2;
const CHANNEL_BLOCK_SIZE: u32 = 0x80;
const GROUP_HEADER_SIZE: u64 = 0x10;
const BLOCK_DATA_SIZE: u64 = 0x100;
const SAMPLES_PER_BLOCK: u32 = CHANNEL_BLOCK_SIZE * 2;
const MAX_EMPTY_GROUP_CHAIN: u32 = 256;

fn read_u32le(file: &mut dyn StreamFile, offset: u64) -> Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact_at(&mut buf, offset)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u32be(file: &mut dyn StreamFile, offset: u64) -> Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact_at(&mut buf, offset)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_i16le(file: &mut dyn StreamFile, offset: u64) -> Result<i16> {
    let mut buf = [0u8; 2];
    file.read_exact_at(&mut buf, offset)?;
    Ok(i16::from_le_bytes(buf))
}

/// Block-header state machine for MTAF's two-channel IMA ADPCM blocks.
pub struct MtafBlockLayout {
    block_count: u32,
    next_block_offset: u64,
}

impl MtafBlockLayout {
    pub fn new(start_offset: u64) -> Self {
        MtafBlockLayout { block_count: 1, next_block_offset: start_offset }
    }
}

impl BlockLayout for MtafBlockLayout {
    fn block_samples(&self) -> u32 {
        SAMPLES_PER_BLOCK
    }

    fn read_block_header(&mut self, channels: &mut [StreamChannel], codec: &mut CodecState) -> Result<()> {
        let mut block_offset = self.next_block_offset;

        if self.block_count == 1 {
            let mut chain = 0;
            loop {
                let raw = read_u32le(&mut *channels[0].file, block_offset + 0x0c)?;
                let group_blocks = raw * 2;
                if group_blocks == 0 {
                    let skip = read_u32be(&mut *channels[0].file, block_offset + 0x04)?;
                    if skip == 0 {
                        return malformed("MTAF group header chain does not advance");
                    }
                    block_offset += skip as u64;
                    chain += 1;
                    if chain > MAX_EMPTY_GROUP_CHAIN {
                        return malformed("MTAF group header chain did not terminate");
                    }
                    continue;
                }
                self.block_count = group_blocks;
                break;
            }
            block_offset += GROUP_HEADER_SIZE;
        }
        else {
            self.block_count -= 1;
        }

        self.next_block_offset = block_offset + BLOCK_DATA_SIZE + GROUP_HEADER_SIZE;

        for (i, channel) in channels.iter_mut().enumerate() {
            let step_index =
                (read_i16le(&mut *channel.file, block_offset + 0x4 + i as u64 * 2)? as i32).clamp(0, 88);
            let predictor = read_i16le(&mut *channel.file, block_offset + 0x8 + i as u64 * 4)? as i32;

            channel.block_offset = block_offset;
            channel.offset = block_offset + i as u64 * CHANNEL_BLOCK_SIZE as u64 + GROUP_HEADER_SIZE;

            if let CodecState::PerChannel(_, c) = codec {
                c.restore(i, &ImaSnapshot { predictor, step_index });
            }
        }
        Ok(())
    }
}

pub struct MtafMeta;

impl Meta for MtafMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "mtaf", extensions: &["mtaf"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut header = [0u8; 0x20];
        if source.read(&mut header, 0)? < 0x20 || &header[0..4] != b"MTAF" {
            return Ok(None);
        }

        let sample_rate = u32::from_le_bytes(header[0x0c..0x10].try_into().unwrap());
        let total_samples = u32::from_le_bytes(header[0x10..0x14].try_into().unwrap()) as i64;
        let start_offset = u32::from_le_bytes(header[0x14..0x18].try_into().unwrap()) as u64;
        if sample_rate == 0 || total_samples == 0 {
            return malformed("MTAF header declares zero sample rate or sample count");
        }

        let name = source.name().to_string();
        let sibling = source
            .open_sibling(&name)?
            .ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("source does not support independent channel handles"))?;

        let channels = vec![
            StreamChannel::new(source, start_offset),
            StreamChannel::new(sibling, start_offset),
        ];

        let codec = CodecState::PerChannel(CodecId::MtafAdpcm, Box::new(ImaAdpcmCodec::new(CHANNEL_COUNT)));
        let layout = Layout::Blocked(Box::new(MtafBlockLayout::new(start_offset)));

        let descriptor = StreamDescriptor {
            meta_name: "mtaf",
            codec,
            codec_config: CodecConfig::None,
            layout,
            channels,
            channel_count: CHANNEL_COUNT as u32,
            sample_rate,
            total_samples,
            loop_flag: false,
            loop_start_sample: 0,
            loop_end_sample: total_samples,
            interleave_block_size: CHANNEL_BLOCK_SIZE,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: SAMPLES_PER_BLOCK as i64,
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples: total_samples,
            play_forever: false,
            play: Default::default(),
            last_loop_output_sample: 0,
            mixer: MixerState::new(CHANNEL_COUNT),
            loop_snapshot: None,
            inner_source: None,
        };
        descriptor.validate()?;
        let _ = cfg;
        Ok(Some(descriptor))
    }
}
