// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codec identification and the two decode entry-point shapes every codec implements.
//!
//! Codec state is never exposed through a raw pointer or downcast: every codec implements one of
//! [`ChannelCodec`] or [`FrameCodec`], and the decoder holds it as a boxed trait object tagged by
//! [`CodecState`]. The layout driver dispatches on that tag alone.

use crate::errors::Result;
use crate::stream::StreamChannel;

/// Identifies which codec family produced a [`CodecState`]. Kept distinct from the Rust type
/// system's own dispatch so metas can describe a codec before one is actually instantiated (e.g.
/// to decide whether the current build supports it at all).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    PcmS16Le,
    PcmS16Be,
    PcmS24Le,
    PcmS24Be,
    PcmS32Le,
    PcmS32Be,
    PcmF32Le,
    PcmF32Be,
    PcmU8,
    PcmS8,
    VagAdpcm,
    ImaAdpcm,
    MtafAdpcm,
    DspAdpcm,
    OngakukanAdpcm,
    RelicDct,
    CircusVq,
    Atrac3Plus,
    Atrac9,
    CeltFsb,
    Vorbis,
    Opus,
    Xma,
    Microtalk,
    Acm,
    Adx,
}

impl CodecId {
    pub fn name(&self) -> &'static str {
        match self {
            CodecId::PcmS16Le => "pcm_s16le",
            CodecId::PcmS16Be => "pcm_s16be",
            CodecId::PcmS24Le => "pcm_s24le",
            CodecId::PcmS24Be => "pcm_s24be",
            CodecId::PcmS32Le => "pcm_s32le",
            CodecId::PcmS32Be => "pcm_s32be",
            CodecId::PcmF32Le => "pcm_f32le",
            CodecId::PcmF32Be => "pcm_f32be",
            CodecId::PcmU8 => "pcm_u8",
            CodecId::PcmS8 => "pcm_s8",
            CodecId::VagAdpcm => "vag_adpcm",
            CodecId::ImaAdpcm => "ima_adpcm",
            CodecId::MtafAdpcm => "mtaf_adpcm",
            CodecId::DspAdpcm => "dsp_adpcm",
            CodecId::OngakukanAdpcm => "ongakukan_adpcm",
            CodecId::RelicDct => "relic_dct",
            CodecId::CircusVq => "circus_vq",
            CodecId::Atrac3Plus => "atrac3plus",
            CodecId::Atrac9 => "atrac9",
            CodecId::CeltFsb => "celt_fsb",
            CodecId::Vorbis => "vorbis",
            CodecId::Opus => "opus",
            CodecId::Xma => "xma",
            CodecId::Microtalk => "microtalk",
            CodecId::Acm => "acm",
            CodecId::Adx => "adx",
        }
    }
}

/// Decodes one channel at a time. The codec owns any per-channel history (predictors, step
/// indices, filter state) internally, indexed by `channel_index`.
pub trait ChannelCodec: Send {
    /// Resets internal history for every channel, e.g. after a seek or loop restart.
    fn reset(&mut self);

    /// Decodes `out.len()` samples for `channel_index`, skipping `first_sample` already-decoded
    /// samples at the head of the frame/block `channel.offset` currently points at (this is how a
    /// layout resumes mid-block after a seek or loop without having to track byte-granular
    /// positions itself). Advances `channel.offset` past the bytes consumed.
    fn decode_channel(
        &mut self,
        channel: &mut StreamChannel,
        out: &mut [i16],
        channel_index: usize,
        first_sample: usize,
    ) -> Result<()>;

    /// Captures a restorable snapshot of this codec's state for `channel_index` (used by loop and
    /// seek handling).
    fn snapshot(&self, channel_index: usize) -> Box<dyn std::any::Any + Send>;

    /// Restores a snapshot previously returned by [`ChannelCodec::snapshot`].
    fn restore(&mut self, channel_index: usize, snapshot: &(dyn std::any::Any + Send));
}

/// Decodes every channel of a frame at once. Used by transform codecs whose bitstream
/// interleaves channels within a single frame (ATRAC9, CELT-FSB, Vorbis, Opus, XMA, Relic DCT,
/// Circus VQ).
pub trait FrameCodec: Send {
    fn reset(&mut self);

    /// Decodes `out.len() / channels.len()` samples per channel into `out`, interleaved as
    /// `out[frame * channels.len() + channel]`. Reads from `channels[0]`'s file unless the codec
    /// is inherently per-channel deinterleaved (in which case it reads each channel's own file).
    fn decode_frame(&mut self, channels: &mut [StreamChannel], out: &mut [i16]) -> Result<()>;

    fn snapshot(&self) -> Box<dyn std::any::Any + Send>;

    fn restore(&mut self, snapshot: &(dyn std::any::Any + Send));
}

/// The boxed, tagged codec handle owned by a stream descriptor.
pub enum CodecState {
    PerChannel(CodecId, Box<dyn ChannelCodec>),
    WholeFrame(CodecId, Box<dyn FrameCodec>),
}

impl CodecState {
    pub fn id(&self) -> CodecId {
        match self {
            CodecState::PerChannel(id, _) => *id,
            CodecState::WholeFrame(id, _) => *id,
        }
    }

    pub fn reset(&mut self) {
        match self {
            CodecState::PerChannel(_, c) => c.reset(),
            CodecState::WholeFrame(_, c) => c.reset(),
        }
    }
}
