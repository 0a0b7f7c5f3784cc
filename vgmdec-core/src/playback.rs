// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The play driver: walks a [`StreamDescriptor`]'s layout, calls into its codec, loops when
//! asked to, and runs the result through the mixer.

use crate::codecs::CodecState;
use crate::errors::{internal, internal_err, Result};
use crate::layout::Layout;
use crate::stream::{LoopSnapshot, PlayState, StreamDescriptor};

/// Decodes up to `requested` samples (per channel) into `out`, appending interleaved PCM16.
/// Returns the number of samples actually produced, which is less than `requested` only when the
/// stream has reached `play_samples`.
pub fn render(stream: &mut StreamDescriptor, requested: usize, out: &mut Vec<i16>) -> Result<usize> {
    let mut produced = 0usize;
    let mut scratch: Vec<i16> = Vec::new();

    while produced < requested && !stream.play.done {
        let remaining_request = (requested - produced) as i64;
        let remaining_play = stream.play_samples - stream.play.current_sample;
        if remaining_play <= 0 {
            stream.play.done = true;
            break;
        }

        // Bounded in *source* space: after the first loop-back `play.current_sample` keeps
        // climbing past `loop_end_sample` while the underlying source position keeps re-entering
        // the loop body, so the guard has to compare against `source_sample`, not
        // `play.current_sample`.
        let loop_remaining = if stream.loop_flag && source_sample(stream) < stream.loop_end_sample {
            stream.loop_end_sample - source_sample(stream)
        }
        else {
            i64::MAX
        };

        // A decode call that runs past `loop_start_sample` without stopping there would skip the
        // exact point `maybe_capture_loop_snapshot` needs to land on, so cap the first such call
        // at the boundary instead of letting it overshoot.
        let pre_loop_remaining = if stream.loop_flag
            && stream.loop_snapshot.is_none()
            && stream.play.current_sample < stream.loop_start_sample
        {
            stream.loop_start_sample - stream.play.current_sample
        }
        else {
            i64::MAX
        };

        let layout_remaining = layout_slice_remaining(stream);

        let samples_to_do = remaining_request
            .min(remaining_play)
            .min(loop_remaining)
            .min(pre_loop_remaining)
            .min(layout_remaining)
            .max(1);
        let samples_to_do = samples_to_do as usize;

        let channel_count = stream.channel_count as usize;
        scratch.clear();
        scratch.resize(samples_to_do * channel_count, 0);

        decode_slice(stream, samples_to_do, &mut scratch)?;

        maybe_capture_loop_snapshot(stream);

        let frame_start = stream.play.current_sample;
        let out_channels = stream.mixer.apply(&mut scratch, samples_to_do, frame_start);
        debug_assert_eq!(out_channels, stream.mixer.current_channels);

        out.extend_from_slice(&scratch);
        produced += samples_to_do;
        stream.play.current_sample += samples_to_do as i64;

        if stream.loop_flag && source_sample(stream) >= stream.loop_end_sample {
            handle_loop_boundary(stream)?;
        }
    }

    Ok(produced)
}

/// Rewinds every channel and the codec state to the position they held right after `open`, and
/// clears loop/play bookkeeping. This is `reset(stream)` from §6.1; [`seek`] is built on top of
/// it since there is otherwise no way to reposition a codec except by decoding from the start.
pub fn reset(stream: &mut StreamDescriptor) {
    for channel in stream.channels.iter_mut() {
        channel.offset = channel.start_offset;
        channel.block_offset = channel.start_offset;
    }
    stream.codec.reset();

    if let Layout::Segmented(seg) = &mut stream.layout {
        seg.current_segment = 0;
        seg.sample_in_segment = 0;
        for segment in seg.segments.iter_mut() {
            for channel in segment.channels.iter_mut() {
                channel.offset = channel.start_offset;
                channel.block_offset = channel.start_offset;
            }
            segment.codec.reset();
        }
    }

    stream.play = PlayState::default();
    stream.last_loop_output_sample = 0;
    stream.loop_snapshot = None;
}

/// Repositions playback at `sample_index`, clamped into `[0, play_samples]` per §6.1's "`seek`
/// clamps" rule. Neither `ChannelCodec` nor `FrameCodec` exposes an arbitrary-offset seek (only
/// `reset`), the same constraint the original ATRAC9/CELT-FSB/ATRAC3+ decoders work under —
/// `seek_atrac9` resets the codec and lets the next decode discard samples up to the target
/// rather than jumping there directly. This does the equivalent at the driver level: rewind to
/// the open-time position, then decode forward through [`render`] in chunks, discarding the
/// output, until `sample_index` samples have been produced. Driving it through the exact same
/// function `play`/`fill` use is what makes seeking land on identical internal state to having
/// played there directly, which is the §8.1 seek-idempotence property.
pub fn seek(stream: &mut StreamDescriptor, sample_index: i64) -> Result<()> {
    let target = sample_index.clamp(0, stream.play_samples.max(0));
    reset(stream);

    let mut discard: Vec<i16> = Vec::new();
    let mut remaining = target;
    while remaining > 0 {
        let chunk = remaining.min(4096) as usize;
        discard.clear();
        let produced = render(stream, chunk, &mut discard)?;
        if produced == 0 {
            break;
        }
        remaining -= produced as i64;
    }
    Ok(())
}

/// The position within the underlying encoded data, which differs from `play.current_sample`
/// after at least one loop iteration (the output position keeps climbing; the source position
/// wraps back to `loop_start_sample`).
fn source_sample(stream: &StreamDescriptor) -> i64 {
    if stream.play.loop_count == 0 {
        stream.play.current_sample
    }
    else {
        stream.loop_start_sample + (stream.play.current_sample - stream.last_loop_output_sample)
    }
}

fn handle_loop_boundary(stream: &mut StreamDescriptor) -> Result<()> {
    let loop_body = stream.loop_end_sample - stream.loop_start_sample;
    let another_loop_fits = stream.play.current_sample + loop_body <= stream.play_samples;

    if !stream.play_forever && !another_loop_fits {
        // This was the final pass through the loop body: let playback fall through past
        // `loop_end_sample` toward `total_samples`/the fade tail rather than wrapping again.
        return Ok(());
    }

    stream.play.loop_count += 1;
    stream.last_loop_output_sample = stream.play.current_sample;

    let snapshot =
        stream.loop_snapshot.take().ok_or_else(|| {
            internal_err("loop boundary reached before a snapshot was captured")
        })?;
    restore_loop_snapshot(stream, &snapshot);
    stream.loop_snapshot = Some(snapshot);
    Ok(())
}

fn restore_loop_snapshot(stream: &mut StreamDescriptor, snapshot: &LoopSnapshot) {
    for (ch, (&offset, &block_offset)) in
        snapshot.offsets.iter().zip(snapshot.block_offsets.iter()).enumerate()
    {
        if let Some(channel) = stream.channels.get_mut(ch) {
            channel.offset = offset;
            channel.block_offset = block_offset;
        }
    }
    match &mut stream.codec {
        CodecState::PerChannel(_, codec) => {
            for (ch, snap) in snapshot.codec.iter().enumerate() {
                codec.restore(ch, snap.as_ref());
            }
        }
        CodecState::WholeFrame(_, codec) => {
            if let Some(snap) = snapshot.codec.first() {
                codec.restore(snap.as_ref());
            }
        }
    }
}

fn maybe_capture_loop_snapshot(stream: &mut StreamDescriptor) {
    if !stream.loop_flag || stream.loop_snapshot.is_some() {
        return;
    }
    if stream.play.current_sample < stream.loop_start_sample {
        return;
    }

    let offsets = stream.channels.iter().map(|c| c.offset).collect();
    let block_offsets = stream.channels.iter().map(|c| c.block_offset).collect();
    let codec = match &stream.codec {
        CodecState::PerChannel(_, codec) => {
            (0..stream.channels.len()).map(|ch| codec.snapshot(ch)).collect()
        }
        CodecState::WholeFrame(_, codec) => vec![codec.snapshot()],
    };
    stream.loop_snapshot = Some(LoopSnapshot { offsets, block_offsets, codec });
}

/// How many samples remain in the current layout slice (interleave block, blocked-layout block,
/// or segment) before the layout needs to reposition channels. `Layout::None` imposes no limit of
/// its own.
fn layout_slice_remaining(stream: &StreamDescriptor) -> i64 {
    match &stream.layout {
        Layout::None => i64::MAX,
        Layout::Interleave { .. } => {
            let samples_per_block = stream.samples_per_interleave_block;
            let into_block = source_sample(stream).rem_euclid(samples_per_block.max(1));
            samples_per_block - into_block
        }
        Layout::Blocked(b) => {
            let block_samples = b.block_samples() as i64;
            let into_block = source_sample(stream).rem_euclid(block_samples.max(1));
            block_samples - into_block
        }
        Layout::Segmented(seg) => {
            seg.segments.get(seg.current_segment).map(|s| s.num_samples).unwrap_or(i64::MAX)
                - seg.sample_in_segment
        }
    }
}

fn decode_slice(stream: &mut StreamDescriptor, samples: usize, out: &mut [i16]) -> Result<()> {
    match &stream.layout {
        Layout::None => decode_whole_frame(stream, samples, out),
        Layout::Interleave { block_size, first_block_size, last_block_size } => {
            decode_interleaved(stream, *block_size, *first_block_size, *last_block_size, samples, out)
        }
        Layout::Blocked(_) => decode_blocked(stream, samples, out),
        Layout::Segmented(_) => decode_segmented(stream, samples, out),
    }
}

fn decode_whole_frame(stream: &mut StreamDescriptor, samples: usize, out: &mut [i16]) -> Result<()> {
    match &mut stream.codec {
        CodecState::WholeFrame(_, codec) => codec.decode_frame(&mut stream.channels, out),
        CodecState::PerChannel(_, codec) => {
            let channel_count = stream.channels.len();
            for (idx, channel) in stream.channels.iter_mut().enumerate() {
                let mut ch_buf = vec![0i16; samples];
                codec.decode_channel(channel, &mut ch_buf, idx, 0)?;
                for (f, sample) in ch_buf.into_iter().enumerate() {
                    out[f * channel_count + idx] = sample;
                }
            }
            Ok(())
        }
    }
}

fn decode_interleaved(
    stream: &mut StreamDescriptor,
    block_size: u32,
    first_block_size: Option<u32>,
    last_block_size: Option<u32>,
    samples: usize,
    out: &mut [i16],
) -> Result<()> {
    let samples_per_block = stream.samples_per_interleave_block;
    let channel_count = stream.channels.len();
    let total_blocks = if samples_per_block > 0 {
        (stream.total_samples + samples_per_block - 1) / samples_per_block
    }
    else {
        1
    };
    let src = source_sample(stream);
    let first_sample_in_block = src.rem_euclid(samples_per_block.max(1)) as usize;

    let codec = match &mut stream.codec {
        CodecState::PerChannel(_, codec) => codec,
        CodecState::WholeFrame(_, _) => {
            return internal("interleave layout requires a per-channel codec");
        }
    };

    for (idx, channel) in stream.channels.iter_mut().enumerate() {
        let (block_start, _) = Layout::interleave_block_for(
            block_size,
            first_block_size,
            last_block_size,
            idx,
            src,
            samples_per_block.max(1),
            total_blocks,
            channel.start_offset,
        );
        channel.offset = block_start;

        let mut ch_buf = vec![0i16; samples];
        codec.decode_channel(channel, &mut ch_buf, idx, first_sample_in_block)?;
        for (f, sample) in ch_buf.into_iter().enumerate() {
            out[f * channel_count + idx] = sample;
        }
    }
    Ok(())
}

fn decode_blocked(stream: &mut StreamDescriptor, samples: usize, out: &mut [i16]) -> Result<()> {
    let src = source_sample(stream);
    let block_samples = match &stream.layout {
        Layout::Blocked(b) => b.block_samples() as i64,
        _ => unreachable!(),
    };
    let first_sample_in_block = src.rem_euclid(block_samples.max(1)) as usize;
    if first_sample_in_block == 0 {
        if let Layout::Blocked(b) = &mut stream.layout {
            b.read_block_header(&mut stream.channels, &mut stream.codec)?;
        }
    }

    let channel_count = stream.channels.len();
    match &mut stream.codec {
        CodecState::PerChannel(_, codec) => {
            for (idx, channel) in stream.channels.iter_mut().enumerate() {
                let mut ch_buf = vec![0i16; samples];
                codec.decode_channel(channel, &mut ch_buf, idx, first_sample_in_block)?;
                for (f, sample) in ch_buf.into_iter().enumerate() {
                    out[f * channel_count + idx] = sample;
                }
            }
        }
        CodecState::WholeFrame(_, codec) => codec.decode_frame(&mut stream.channels, out)?,
    }
    Ok(())
}

fn decode_segmented(stream: &mut StreamDescriptor, samples: usize, out: &mut [i16]) -> Result<()> {
    let seg = match &mut stream.layout {
        Layout::Segmented(s) => s,
        _ => unreachable!(),
    };
    let segment = seg
        .segments
        .get_mut(seg.current_segment)
        .ok_or_else(|| internal_err("segmented layout ran past its last segment"))?;

    match &mut segment.codec {
        CodecState::WholeFrame(_, codec) => codec.decode_frame(&mut segment.channels, out)?,
        CodecState::PerChannel(_, codec) => {
            let channel_count = segment.channels.len();
            for (idx, channel) in segment.channels.iter_mut().enumerate() {
                let mut ch_buf = vec![0i16; samples];
                codec.decode_channel(channel, &mut ch_buf, idx, 0)?;
                for (f, sample) in ch_buf.into_iter().enumerate() {
                    out[f * channel_count + idx] = sample;
                }
            }
        }
    }

    seg.sample_in_segment += samples as i64;
    if seg.sample_in_segment >= segment.num_samples && seg.current_segment + 1 < seg.segments.len() {
        seg.current_segment += 1;
        seg.sample_in_segment = 0;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::{CodecId, ChannelCodec};
    use crate::io::MemoryFile;
    use crate::mixer::MixerState;
    use crate::stream::{CodecConfig, PlayState, StreamChannel};
    use std::any::Any;

    /// A codec with no real bitstream: each byte of source data *is* the sample value, so a
    /// test can read a rendered sequence straight back and know exactly which source offset
    /// produced it.
    struct BytesAsSamples;

    impl ChannelCodec for BytesAsSamples {
        fn reset(&mut self) {}

        fn decode_channel(
            &mut self,
            channel: &mut StreamChannel,
            out: &mut [i16],
            _channel_index: usize,
            first_sample: usize,
        ) -> Result<()> {
            let mut buf = vec![0u8; out.len()];
            let mut reader = crate::io::StreamReader::new(
                &mut *channel.file,
                channel.offset + first_sample as u64,
            );
            reader.read_buf_exact(&mut buf)?;
            channel.offset = reader.pos();
            for (dst, &b) in out.iter_mut().zip(buf.iter()) {
                *dst = b as i16;
            }
            Ok(())
        }

        fn snapshot(&self, _channel_index: usize) -> Box<dyn Any + Send> {
            Box::new(())
        }

        fn restore(&mut self, _channel_index: usize, _snapshot: &(dyn Any + Send)) {}
    }

    fn make_stream(data: Vec<u8>, loop_start: i64, loop_end: i64, play_samples: i64) -> StreamDescriptor {
        let total_samples = data.len() as i64;
        let file = Box::new(MemoryFile::new(data, "test.raw"));
        StreamDescriptor {
            meta_name: "test",
            codec: CodecState::PerChannel(CodecId::PcmS16Le, Box::new(BytesAsSamples)),
            codec_config: CodecConfig::None,
            layout: Layout::None,
            channels: vec![StreamChannel::new(file, 0)],
            channel_count: 1,
            sample_rate: 8000,
            total_samples,
            loop_flag: loop_start != loop_end,
            loop_start_sample: loop_start,
            loop_end_sample: loop_end,
            interleave_block_size: 0,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: 0,
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples,
            play_forever: false,
            play: PlayState::default(),
            last_loop_output_sample: 0,
            mixer: MixerState::new(1),
            loop_snapshot: None,
            inner_source: None,
        }
    }

    #[test]
    fn no_loop_renders_source_bytes_in_order() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = make_stream(data, 0, 0, 20);
        let mut out = Vec::new();
        let produced = render(&mut stream, 20, &mut out).unwrap();
        assert_eq!(produced, 20);
        let expected: Vec<i16> = (0..20).map(|b: u8| b as i16).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn render_stops_exactly_at_play_samples() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = make_stream(data, 0, 0, 12);
        let mut out = Vec::new();
        let produced = render(&mut stream, 20, &mut out).unwrap();
        assert_eq!(produced, 12);
        assert!(stream.play.done);
    }

    #[test]
    fn loop_boundary_replays_the_loop_body_then_stops_at_budget() {
        let data: Vec<u8> = (0..20).collect();
        // loop body [5, 15): one extra pass fits exactly inside a 25-sample budget.
        let mut stream = make_stream(data, 5, 15, 25);
        let mut out = Vec::new();
        let produced = render(&mut stream, 25, &mut out).unwrap();
        assert_eq!(produced, 25);

        let mut expected: Vec<i16> = (0..15).map(|b: u8| b as i16).collect();
        expected.extend((5..15).map(|b: u8| b as i16));
        assert_eq!(out, expected);
        assert_eq!(stream.play.loop_count, 1);
    }

    #[test]
    fn small_fill_increments_still_cross_the_loop_start_correctly() {
        // Same stream as above, but pulled 3 samples at a time like a real `fill` caller would,
        // to make sure the snapshot is captured at the exact loop-start boundary regardless of
        // how the caller chunks its requests.
        let data: Vec<u8> = (0..20).collect();
        let mut stream = make_stream(data, 5, 15, 25);
        let mut out = Vec::new();
        while !stream.play.done && out.len() < 25 {
            render(&mut stream, 3, &mut out).unwrap();
        }

        let mut expected: Vec<i16> = (0..15).map(|b: u8| b as i16).collect();
        expected.extend((5..15).map(|b: u8| b as i16));
        assert_eq!(out, expected);
    }

    #[test]
    fn play_forever_keeps_looping_past_one_body_length() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = make_stream(data, 5, 15, 40);
        stream.play_forever = true;
        let mut out = Vec::new();
        let produced = render(&mut stream, 40, &mut out).unwrap();
        assert_eq!(produced, 40);
        assert!(stream.play.loop_count >= 2);
    }

    #[test]
    fn seek_then_play_matches_tail_of_a_direct_play() {
        let data: Vec<u8> = (0..20).collect();

        let mut seeked = make_stream(data.clone(), 0, 0, 20);
        seek(&mut seeked, 7).unwrap();
        let mut tail = Vec::new();
        render(&mut seeked, 5, &mut tail).unwrap();

        let mut direct = make_stream(data, 0, 0, 20);
        let mut whole = Vec::new();
        render(&mut direct, 12, &mut whole).unwrap();

        assert_eq!(tail, &whole[7..12]);
    }

    #[test]
    fn seek_past_loop_start_reproduces_loop_bookkeeping() {
        let data: Vec<u8> = (0..20).collect();

        // loop body [5, 15): seeking to 18 crosses the loop boundary once, exactly like playing
        // there directly would.
        let mut seeked = make_stream(data.clone(), 5, 15, 25);
        seek(&mut seeked, 18).unwrap();

        let mut direct = make_stream(data, 5, 15, 25);
        let mut out = Vec::new();
        render(&mut direct, 18, &mut out).unwrap();

        assert_eq!(seeked.play.current_sample, direct.play.current_sample);
        assert_eq!(seeked.play.loop_count, direct.play.loop_count);
        assert_eq!(seeked.last_loop_output_sample, direct.last_loop_output_sample);

        let mut from_seek = Vec::new();
        render(&mut seeked, 7, &mut from_seek).unwrap();
        let mut from_direct = Vec::new();
        render(&mut direct, 7, &mut from_direct).unwrap();
        assert_eq!(from_seek, from_direct);
    }

    #[test]
    fn seek_clamps_to_play_samples() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = make_stream(data, 0, 0, 12);
        seek(&mut stream, 999).unwrap();
        assert_eq!(stream.play.current_sample, 12);
        assert!(stream.play.done);
    }

    #[test]
    fn seek_to_zero_is_equivalent_to_reset() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = make_stream(data, 5, 15, 25);
        render(&mut stream, 10, &mut Vec::new()).unwrap();
        seek(&mut stream, 0).unwrap();
        assert_eq!(stream.play.current_sample, 0);
        assert_eq!(stream.play.loop_count, 0);
        assert!(stream.loop_snapshot.is_none());
        assert_eq!(stream.channels[0].offset, stream.channels[0].start_offset);
    }
}
