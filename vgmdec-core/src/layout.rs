// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layouts: traversal policies over encoded data. A layout decides where on disk the next
//! decodable slice begins; the codec decides how to turn those bytes into samples.

use crate::codecs::CodecState;
use crate::errors::Result;
use crate::stream::StreamChannel;

/// Parses one format-defined block header and updates every channel's offset (and any per-block
/// codec fields, via the codec's own state) before the block's samples are decoded.
pub trait BlockLayout: Send {
    /// Number of samples a single block holds, across all channels.
    fn block_samples(&self) -> u32;

    /// Reads the header of the block starting at each channel's `block_offset` and repositions
    /// `channel.offset` to the start of that channel's payload within the block. Formats whose
    /// block header carries per-channel codec state (a step index, a running predictor) push it
    /// into `codec` via `ChannelCodec::restore` before returning.
    fn read_block_header(&mut self, channels: &mut [StreamChannel], codec: &mut CodecState) -> Result<()>;
}

/// One self-contained sub-stream within a segmented (AAX-style) layout.
pub struct Segment {
    pub num_samples: i64,
    pub codec: CodecState,
    pub channels: Vec<StreamChannel>,
}

pub struct SegmentedLayout {
    pub segments: Vec<Segment>,
    pub loop_segment: usize,
    pub current_segment: usize,
    pub sample_in_segment: i64,
}

/// A traversal policy over encoded data.
pub enum Layout {
    /// The codec is called once per `play` with the full channel count; it is responsible for its
    /// own framing and interleave (used by whole-frame transform codecs).
    None,
    /// Fixed-size channel blocks placed sequentially on disk.
    Interleave {
        block_size: u32,
        first_block_size: Option<u32>,
        last_block_size: Option<u32>,
    },
    /// A repeating format-defined block header updates channel state before every block.
    Blocked(Box<dyn BlockLayout>),
    /// Concatenation of fully self-contained sub-streams, each with its own codec state.
    Segmented(SegmentedLayout),
}

impl Layout {
    /// Returns the byte offset of the start of the block covering `current_sample`, and the
    /// samples remaining in that block, for the `interleave` layout. Channel 0 may have a
    /// different first-block size; the final block may be shorter than `block_size`.
    pub fn interleave_block_for(
        block_size: u32,
        first_block_size: Option<u32>,
        last_block_size: Option<u32>,
        channel_index: usize,
        current_sample: i64,
        samples_per_block: i64,
        total_blocks: i64,
        start_ch: u64,
    ) -> (u64, i64) {
        let this_block_size = if channel_index == 0 {
            first_block_size.unwrap_or(block_size)
        }
        else {
            block_size
        };

        let block_index = current_sample / samples_per_block;
        let is_last = block_index + 1 >= total_blocks;
        let effective_size =
            if is_last { last_block_size.unwrap_or(this_block_size) } else { this_block_size };

        let block_start = start_ch + (block_index as u64) * (block_size as u64);
        let samples_into_block = current_sample % samples_per_block;
        let _ = effective_size;
        (block_start, samples_per_block - samples_into_block)
    }
}
