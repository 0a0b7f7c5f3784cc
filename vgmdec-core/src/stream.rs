// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The stream descriptor: the top-level object a meta produces and the play driver consumes.

use crate::codecs::CodecState;
use crate::errors::{invalid_config, Result};
use crate::io::StreamFile;
use crate::layout::Layout;
use crate::mixer::MixerState;

/// Per-channel traversal state: an owned [`StreamFile`] plus the current and starting byte
/// offsets. Codec-specific history lives inside the codec's own state, indexed by channel.
pub struct StreamChannel {
    pub file: Box<dyn StreamFile>,
    /// Current read offset, advanced as the codec consumes bytes.
    pub offset: u64,
    /// The offset this channel started decoding from (used to recompute block positions).
    pub start_offset: u64,
    /// Current block offset, used by blocked layouts.
    pub block_offset: u64,
}

impl StreamChannel {
    pub fn new(file: Box<dyn StreamFile>, start_offset: u64) -> Self {
        StreamChannel { file, offset: start_offset, start_offset, block_offset: start_offset }
    }
}

/// Tagged, codec-specific configuration carried alongside a [`CodecState`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum CodecConfig {
    None,
    Atrac9 {
        config_data: [u8; 4],
        encoder_delay: u32,
        interleave_skip: u32,
        subsong_skip: u32,
        container: Atrac9Container,
    },
    CeltFsb {
        version: CeltVersion,
    },
    Xma {
        stream_count: u32,
        block_size: u32,
    },
    Relic {
        bitrate: u32,
        codec_rate: u32,
    },
    CircusVq {
        scale_index: u8,
        flags: u8,
    },
    Vag {
        frame_size: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Atrac9Container {
    Raw,
    At9,
    FsbAt9,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CeltVersion {
    V0_6_1,
    V0_11_0,
}

/// Snapshot of a codec's per-channel history, and the per-channel byte offset it was taken at.
/// Captured lazily the first time playback crosses `loop_start_sample`, and restored both on
/// loop-back and on an out-of-order seek.
pub struct LoopSnapshot {
    pub offsets: Vec<u64>,
    pub block_offsets: Vec<u64>,
    /// One entry per channel for [`CodecState::PerChannel`]; exactly one entry (the whole-frame
    /// state) for [`CodecState::WholeFrame`].
    pub codec: Vec<Box<dyn std::any::Any + Send>>,
}

/// Mutable playback cursor for a stream: current sample, loop count, and completion state.
#[derive(Default, Clone, Copy, Debug)]
pub struct PlayState {
    pub current_sample: i64,
    pub loop_count: u32,
    pub done: bool,
}

/// The fully populated descriptor a meta produces: everything the play driver needs to decode a
/// stream, independent of which container it came from.
pub struct StreamDescriptor {
    pub meta_name: &'static str,
    pub codec: CodecState,
    pub codec_config: CodecConfig,
    pub layout: Layout,
    pub channels: Vec<StreamChannel>,
    pub channel_count: u32,
    pub sample_rate: u32,
    pub total_samples: i64,
    pub loop_flag: bool,
    pub loop_start_sample: i64,
    pub loop_end_sample: i64,
    pub interleave_block_size: u32,
    pub interleave_first_block_size: Option<u32>,
    pub interleave_last_block_size: Option<u32>,
    /// How many samples `interleave_block_size` bytes hold, set by the meta/codec pairing that
    /// knows the fixed bytes-per-sample ratio (e.g. VAG ADPCM: 16 bytes per 28 samples). Unused
    /// outside [`crate::layout::Layout::Interleave`].
    pub samples_per_interleave_block: i64,
    pub subsong_index: u32,
    pub subsong_count: u32,
    pub stream_name: String,
    /// Total samples to render, taking loop count / fade / play-forever into account. Computed
    /// once at open from the active [`crate::config::PlaybackConfig`].
    pub play_samples: i64,
    /// Mirrors `PlaybackConfig::play_forever && PlaybackConfig::allow_play_forever` at open time:
    /// when set, the play driver loops back at `loop_end_sample` unconditionally instead of
    /// stopping once `play_samples` worth of loop body has been emitted.
    pub play_forever: bool,
    pub play: PlayState,
    /// Absolute output sample position at which the most recent loop-back occurred; `0` before
    /// the first loop. Used to translate an absolute output position back into a source position
    /// inside the looped region.
    pub last_loop_output_sample: i64,
    pub mixer: MixerState,
    pub loop_snapshot: Option<LoopSnapshot>,
    /// Kept alive for the duration of decoding when a meta wraps the raw container bytes in a
    /// transforming inner source not otherwise reachable from `channels`.
    pub inner_source: Option<Box<dyn StreamFile>>,
}

impl StreamDescriptor {
    /// Validates the invariants from the data model: `0 <= loop_start <= loop_end <= total`, and
    /// loop bounds are only meaningful when `loop_flag` is set.
    pub fn validate(&self) -> Result<()> {
        if self.channels.len() != self.channel_count as usize {
            return invalid_config("channel list length does not match channel_count");
        }
        if self.loop_flag {
            if !(0 <= self.loop_start_sample
                && self.loop_start_sample <= self.loop_end_sample
                && self.loop_end_sample <= self.total_samples)
            {
                return invalid_config("loop_start/loop_end out of range of total_samples");
            }
        }
        Ok(())
    }

    pub fn close(&mut self) {
        for ch in &mut self.channels {
            ch.file.close();
        }
        if let Some(inner) = &mut self.inner_source {
            inner.close();
        }
    }
}

impl Drop for StreamDescriptor {
    fn drop(&mut self) {
        self.close();
    }
}
