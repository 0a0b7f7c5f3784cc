// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XAVS: a Reflections audio+video container (PS2 *Stuntman*). The file is a flat chunk stream
//! starting at 0x18; video chunks (`0x56`) and padding (`0x21`) are interleaved with each
//! subsong's own audio chunks (`0x41`/`0x61`/`0x62`/`0x63`, selected by `chunk_id & 0x0F`).
//! Picking a subsong means walking the whole chunk chain once and keeping only the chunks that
//! belong to it; [`XavsAudioTrack`] does that walk eagerly at open time and presents the result as
//! one contiguous logical stream. The PCM within that stream is block-interleaved rather than
//! sample-interleaved across the two channels, which [`vgmdec_core::io::Deblock`] handles once the
//! track is reduced to a single flat byte run.

use vgmdec_codec_pcm::{PcmCodec, PcmFormat};
use vgmdec_core::codecs::{CodecId, CodecState};
use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{internal, malformed, Result};
use vgmdec_core::io::{Deblock, StreamFile};
use vgmdec_core::layout::Layout;
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

const CHUNK_START: u64 = 0x18;
const CHANNEL_COUNT: u32 = 2;

fn read_chunk_header(source: &mut dyn StreamFile, offset: u64) -> Result<Option<(u8, u64)>> {
    let mut buf = [0u8; 4];
    let n = source.read(&mut buf, offset)?;
    if n < 4 {
        return Ok(None);
    }
    let combined = u32::from_le_bytes(buf);
    Ok(Some(((combined & 0xff) as u8, (combined >> 8) as u64)))
}

/// Scans from `CHUNK_START` for the first audio-format chunk (`0x4?` = no video / 48kHz,
/// `0x6?` = with video / 24kHz) and returns `(sample_rate, interleave_block_size)`.
fn detect_format(source: &mut dyn StreamFile) -> Result<(u32, u32)> {
    let mut offset = CHUNK_START;
    loop {
        let (id, size) = match read_chunk_header(source, offset)? {
            Some(v) => v,
            None => return malformed("XAVS has no audio-format chunk before end of file"),
        };
        if id & 0xf0 == 0x40 {
            return Ok((48_000, 0x200));
        }
        if id & 0xf0 == 0x60 {
            return Ok((24_000, 0x100));
        }
        match id {
            0x56 => offset += 4 + size,
            0x21 => offset += 4,
            _ => return malformed("XAVS has an unrecognized chunk before any audio-format chunk"),
        }
    }
}

/// One subsong's audio chunks concatenated into a single flat byte run, in source order. Built
/// eagerly (one walk of the chunk chain) rather than re-walked per read.
struct XavsAudioTrack {
    inner: Box<dyn StreamFile>,
    name: String,
    /// `(physical data offset, chunk data size)` pairs, and the logical offset each starts at.
    segments: Vec<(u64, u64, u64)>,
    logical_size: u64,
}

impl XavsAudioTrack {
    fn build(mut inner: Box<dyn StreamFile>, stream_number: u32) -> Result<Self> {
        let name = inner.name().to_string();
        let mut segments = Vec::new();
        let mut logical_size = 0u64;
        let mut offset = CHUNK_START;
        loop {
            let (id, size) = match read_chunk_header(&mut *inner, offset)? {
                Some(v) => v,
                None => break,
            };
            match id {
                0x41 | 0x61 | 0x62 | 0x63 => {
                    if stream_number + 1 == (id & 0x0f) as u32 {
                        segments.push((offset + 4, size, logical_size));
                        logical_size += size;
                    }
                    offset += 4 + size;
                }
                0x56 => offset += 4 + size,
                0x21 | 0x5f => offset += 4,
                _ => offset += 4,
            }
        }
        Ok(XavsAudioTrack { inner, name, segments, logical_size })
    }

    fn segment_for(&self, logical_offset: u64) -> Option<(u64, u64, u64)> {
        self.segments
            .iter()
            .find(|&&(_, size, start)| logical_offset >= start && logical_offset < start + size)
            .copied()
    }
}

impl StreamFile for XavsAudioTrack {
    fn read(&mut self, dst: &mut [u8], offset: u64) -> Result<usize> {
        let mut total = 0;
        while total < dst.len() {
            let logical = offset + total as u64;
            let (physical, size, start) = match self.segment_for(logical) {
                Some(v) => v,
                None => break,
            };
            let within = logical - start;
            let to_read = ((size - within) as usize).min(dst.len() - total);
            let n = self.inner.read(&mut dst[total..total + to_read], physical + within)?;
            total += n;
            if n < to_read {
                break;
            }
        }
        Ok(total)
    }

    fn size(&self) -> Option<u64> {
        Some(self.logical_size)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open_sibling(&self, name: &str) -> Result<Option<Box<dyn StreamFile>>> {
        self.inner.open_sibling(name)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

pub struct XavsMeta;

impl Meta for XavsMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "xavs", extensions: &["xav"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        subsong: Option<u32>,
        _cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut magic = [0u8; 4];
        if source.read(&mut magic, 0)? < 4 || &magic != b"XAVS" {
            return Ok(None);
        }

        let mut subsong_count_buf = [0u8; 2];
        source.read_exact_at(&mut subsong_count_buf, 0x0c)?;
        let total_subsongs = u16::from_le_bytes(subsong_count_buf) as u32;
        if total_subsongs == 0 {
            return malformed("XAVS header declares zero subsongs");
        }

        let target = subsong.unwrap_or(1);
        if target == 0 || target > total_subsongs {
            return malformed("XAVS subsong index out of range");
        }

        let (sample_rate, interleave) = detect_format(&mut *source)?;

        let name = source.name().to_string();
        let second = source
            .open_sibling(&name)?
            .ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("XAVS source does not support independent channel handles"))?;

        let track_a = XavsAudioTrack::build(source, target - 1)?;
        let track_b = XavsAudioTrack::build(second, target - 1)?;
        let logical_size = track_a.logical_size;

        let stride = interleave as u64 * CHANNEL_COUNT as u64;
        let channels = vec![
            StreamChannel::new(Box::new(Deblock::new(track_a, 0, interleave as u64, stride)), 0),
            StreamChannel::new(
                Box::new(Deblock::new(track_b, interleave as u64, interleave as u64, stride)),
                0,
            ),
        ];

        let bytes_per_channel = logical_size / CHANNEL_COUNT as u64;
        let total_samples = (bytes_per_channel / 2) as i64;
        if total_samples <= 0 {
            return internal("XAVS subsong resolved to zero audio samples");
        }
        let samples_per_interleave_block = (interleave / 2) as i64;

        let codec = PcmCodec::new(PcmFormat::S16Le);

        let descriptor = StreamDescriptor {
            meta_name: "xavs",
            codec: CodecState::PerChannel(CodecId::PcmS16Le, Box::new(codec)),
            codec_config: CodecConfig::None,
            layout: Layout::Interleave { block_size: interleave, first_block_size: None, last_block_size: None },
            channels,
            channel_count: CHANNEL_COUNT,
            sample_rate,
            total_samples,
            loop_flag: false,
            loop_start_sample: 0,
            loop_end_sample: total_samples,
            interleave_block_size: interleave,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block,
            subsong_index: target,
            subsong_count: total_subsongs,
            stream_name: String::new(),
            play_samples: total_samples,
            play_forever: false,
            play: Default::default(),
            last_loop_output_sample: 0,
            mixer: MixerState::new(CHANNEL_COUNT as usize),
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
    use vgmdec_core::io::MemoryFile;

    fn chunk(id: u8, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let combined = (id as u32) | ((data.len() as u32) << 8);
        out.extend_from_slice(&combined.to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn minimal_file(audio_chunk_id: u8, channel_count: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x18];
        bytes[0..4].copy_from_slice(b"XAVS");
        bytes[0x0c..0x0e].copy_from_slice(&1u16.to_le_bytes());

        // One 0x200-byte audio chunk, block-interleaved 16-bit stereo (0x200 bytes per channel).
        let block_size = 0x200usize;
        let mut audio = vec![0u8; block_size * channel_count];
        for (i, b) in audio.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        bytes.extend(chunk(audio_chunk_id, &audio));
        bytes
    }

    #[test]
    fn meta_returns_none_without_the_xavs_magic() {
        let meta = XavsMeta;
        let source = Box::new(MemoryFile::new(vec![0u8; 64], "test.bin"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn detects_no_video_audio_format_as_48khz() {
        let bytes = minimal_file(0x41, 2);
        let mut source: Box<dyn StreamFile> = Box::new(MemoryFile::new(bytes, "test.xav"));
        let (rate, interleave) = detect_format(&mut *source).unwrap();
        assert_eq!(rate, 48_000);
        assert_eq!(interleave, 0x200);
    }

    #[test]
    fn audio_track_collects_only_matching_subsong_chunks() {
        let mut bytes = vec![0u8; 0x18];
        bytes[0..4].copy_from_slice(b"XAVS");
        bytes.extend(chunk(0x62, &[1, 2, 3, 4])); // subsong 2
        bytes.extend(chunk(0x56, &[9, 9])); // video, skipped
        bytes.extend(chunk(0x63, &[5, 6])); // subsong 3, skipped for target 2
        bytes.extend(chunk(0x62, &[7, 8])); // subsong 2 again

        let source: Box<dyn StreamFile> = Box::new(MemoryFile::new(bytes, "test.xav"));
        let mut track = XavsAudioTrack::build(source, 1).unwrap();
        assert_eq!(track.size(), Some(6));
        let mut out = [0u8; 6];
        let n = track.read(&mut out, 0).unwrap();
        assert_eq!(n, 6);
        assert_eq!(out, [1, 2, 3, 4, 7, 8]);
    }
}
