// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BGW and SPW: two closely related "BGMStream" headers. BGW carries a codec tag and picks
//! between VAG ADPCM and encrypted ATRAC3; SPW is always VAG ADPCM with every field but the loop
//! point and channel count fixed. Both compute sample counts directly from header fields rather
//! than converting a byte count, and both size their interleave block from `block_align` rather
//! than storing it outright.

use vgmdec_codec_adpcm::VagAdpcmCodec;
use vgmdec_codec_ext::atrac3plus::Atrac3PlusCodec;
use vgmdec_core::codecs::{CodecId, CodecState};
use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{malformed, Result};
use vgmdec_core::io::{Deblock, IoTransform, StreamFile, Transform};
use vgmdec_core::layout::Layout;
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

const BGW_MAGIC: &[u8; 12] = b"BGMStream\0\0\0";
const SPW_MAGIC: &[u8; 8] = b"SeWave\0\0";

/// Bytes per channel per ATRAC3 frame in the BGW container.
const BGW_ATRAC3_FRAME_SIZE: usize = 0xc0;

/// Fixed constant XORed into each channel's first 4 key bytes, derived from the stream's own first
/// block rather than from plaintext data (there is none to read before the key exists).
const BGW_ATRAC3_KEY_CONSTANT: u32 = 0xa002_4e9f;

/// Derives the repeating XOR key from a stream's own first `frame_size * channels` bytes: copy the
/// ciphertext of that first block, then for each channel's `frame_size`-byte slice, XOR its
/// leading 4 bytes (read as a big-endian u32) against a fixed constant and write the result back
/// in place. The key then decrypts the whole stream, including that first block, by repeating XOR.
fn bgw_atrac3_key(first_block: &[u8], channels: u32, frame_size: usize) -> Vec<u8> {
    let mut key = first_block.to_vec();
    for ch in 0..channels as usize {
        let base = ch * frame_size;
        if base + 4 > key.len() {
            break;
        }
        let v = u32::from_be_bytes(key[base..base + 4].try_into().unwrap());
        let v = v ^ BGW_ATRAC3_KEY_CONSTANT;
        key[base..base + 4].copy_from_slice(&v.to_be_bytes());
    }
    key
}

/// Repeating-XORs every byte read against `key`, indexed relative to the stream's own
/// `start_offset` rather than the absolute file offset.
struct BgwAtrac3Decrypt {
    key: Vec<u8>,
    start_offset: u64,
}

impl Transform for BgwAtrac3Decrypt {
    fn transform(&mut self, buf: &mut [u8], offset: u64) {
        if self.key.is_empty() {
            return;
        }
        let rel = offset.saturating_sub(self.start_offset);
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= self.key[((rel + i as u64) % self.key.len() as u64) as usize];
        }
    }
}

enum BgwCodec {
    VagAdpcm,
    Atrac3,
}

struct BgwHeader {
    codec: BgwCodec,
    sample_rate: u32,
    blocksize: u32,
    block_align: u32,
    loop_start: i64,
    start_offset: u64,
    channel_count: u32,
}

fn parse_bgw(buf: &[u8], file_size: u64) -> Result<Option<BgwHeader>> {
    if buf.len() < 0x30 || &buf[0..12] != BGW_MAGIC {
        return Ok(None);
    }

    let filesize = u32::from_le_bytes(buf[0x10..0x14].try_into().unwrap()) as u64;
    if filesize != file_size {
        return Ok(None);
    }

    let codec_tag = u32::from_le_bytes(buf[0x0c..0x10].try_into().unwrap());
    let codec = match codec_tag {
        0 => BgwCodec::VagAdpcm,
        3 => BgwCodec::Atrac3,
        _ => return Ok(None),
    };

    let blocksize = u32::from_le_bytes(buf[0x18..0x1c].try_into().unwrap());
    let loop_start = i32::from_le_bytes(buf[0x1c..0x20].try_into().unwrap()) as i64;
    // Deliberately obfuscated in the source data: the real sample rate is the wrapping sum of two
    // header words rather than either one directly.
    let a = u32::from_le_bytes(buf[0x20..0x24].try_into().unwrap());
    let b = u32::from_le_bytes(buf[0x24..0x28].try_into().unwrap());
    let sample_rate = a.wrapping_add(b);
    let start_offset = u32::from_le_bytes(buf[0x28..0x2c].try_into().unwrap()) as u64;
    let channel_count = buf[0x2e] as u32;
    let block_align = buf[0x2f] as u32;

    Ok(Some(BgwHeader { codec, sample_rate, blocksize, block_align, loop_start, start_offset, channel_count }))
}

struct SpwHeader {
    sample_count_field: u32,
    loop_start: i64,
    start_offset: u64,
    channel_count: u32,
}

fn parse_spw(buf: &[u8], file_size: u64) -> Result<Option<SpwHeader>> {
    if buf.len() < 0x2c || &buf[0..8] != SPW_MAGIC {
        return Ok(None);
    }

    let filesize = u32::from_le_bytes(buf[0x08..0x0c].try_into().unwrap()) as u64;
    if filesize != file_size {
        return Ok(None);
    }

    let sample_count_field = u32::from_le_bytes(buf[0x14..0x18].try_into().unwrap());
    let loop_start = i32::from_le_bytes(buf[0x18..0x1c].try_into().unwrap()) as i64;
    let start_offset = u32::from_le_bytes(buf[0x24..0x28].try_into().unwrap()) as u64;
    let channel_count = buf[0x2a] as u32;

    Ok(Some(SpwHeader { sample_count_field, loop_start, start_offset, channel_count }))
}

/// Splits `source` into `channel_count` independent, fully deinterleaved byte streams starting at
/// `start_offset`, each advancing `interleave_block_size` bytes at a time. `Layout::Interleave`
/// has no channel-count factor of its own, so every channel needs its own flat view before the
/// layout ever sees it — same pattern as `ivb.rs`/`vsv.rs`/`xavs.rs`/`ps2_enth.rs`.
fn deinterleaved_channels(
    source: Box<dyn StreamFile>,
    channel_count: u32,
    start_offset: u64,
    interleave_block_size: u64,
) -> Result<Vec<StreamChannel>> {
    let stride = interleave_block_size * channel_count as u64;
    let name = source.name().to_string();

    let mut handles = Vec::with_capacity(channel_count as usize);
    for _ in 1..channel_count {
        let sibling = source
            .open_sibling(&name)?
            .ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("source does not support independent channel handles"))?;
        handles.push(sibling);
    }
    handles.insert(0, source);

    let channels = handles
        .into_iter()
        .enumerate()
        .map(|(ch, handle)| {
            let stream_start = start_offset + ch as u64 * interleave_block_size;
            let deblocked = Deblock::new(handle, stream_start, interleave_block_size, stride);
            StreamChannel::new(Box::new(deblocked), 0)
        })
        .collect();
    Ok(channels)
}

pub struct BgwMeta;

impl Meta for BgwMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "bgw", extensions: &["bgw"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        _cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut buf = [0u8; 0x30];
        let n = source.read(&mut buf, 0)?;
        let file_size = source.size().ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("BGW source has no known size"))?;
        let header = match parse_bgw(&buf[..n], file_size) {
            Ok(Some(h)) => h,
            Ok(None) => return Ok(None),
            Err(e) => return Err(e),
        };

        if header.channel_count == 0 {
            return malformed("BGW header declares zero channels");
        }
        if header.sample_rate == 0 {
            return malformed("BGW header declares a zero sample rate");
        }

        let loop_flag = header.loop_start > 0;
        let total_samples = (header.blocksize as i64) * (header.block_align as i64);
        if total_samples <= 0 {
            return malformed("BGW header resolves to zero audio samples");
        }
        let loop_start_sample = if loop_flag { (header.loop_start - 1) * header.block_align as i64 } else { 0 };

        let (codec, codec_config, layout, channels, interleave_block_size) = match header.codec {
            BgwCodec::VagAdpcm => {
                // "Half, even if channels = 1" per the source header's own comment.
                let interleave_block_size = (header.block_align as u64 / 2) + 1;
                let channels =
                    deinterleaved_channels(source, header.channel_count, header.start_offset, interleave_block_size)?;
                (
                    CodecState::PerChannel(CodecId::VagAdpcm, Box::new(VagAdpcmCodec::new(header.channel_count as usize, 16))),
                    CodecConfig::None,
                    Layout::Interleave {
                        block_size: interleave_block_size as u32,
                        first_block_size: None,
                        last_block_size: None,
                    },
                    channels,
                    interleave_block_size as u32,
                )
            }
            BgwCodec::Atrac3 => {
                // ATRAC3 interleaves every channel inside each block itself; the codec reads the
                // whole block from a single logical channel, same as XMA/SSCF. The stream is
                // encrypted against a key derived from its own first block, so that block has to
                // be read (still encrypted) before the key exists to decrypt anything with.
                let block_align = BGW_ATRAC3_FRAME_SIZE as u32 * header.channel_count.max(1);
                let mut first_block = vec![0u8; block_align as usize];
                source.read_exact_at(&mut first_block, header.start_offset)?;
                let key = bgw_atrac3_key(&first_block, header.channel_count, BGW_ATRAC3_FRAME_SIZE);

                let decrypted: Box<dyn StreamFile> =
                    Box::new(IoTransform::new(source, BgwAtrac3Decrypt { key, start_offset: header.start_offset }));
                let channel = StreamChannel::new(decrypted, header.start_offset);

                let codec = Atrac3PlusCodec::new(header.channel_count, block_align, None)?;
                (
                    CodecState::WholeFrame(CodecId::Atrac3Plus, Box::new(codec)),
                    CodecConfig::None,
                    Layout::None,
                    vec![channel],
                    0,
                )
            }
        };

        let descriptor = StreamDescriptor {
            meta_name: "bgw",
            codec,
            codec_config,
            layout,
            channels,
            channel_count: header.channel_count,
            sample_rate: header.sample_rate,
            total_samples,
            loop_flag,
            loop_start_sample,
            loop_end_sample: total_samples,
            interleave_block_size,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: 0,
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples: total_samples,
            play_forever: false,
            play: Default::default(),
            last_loop_output_sample: 0,
            mixer: MixerState::new(header.channel_count as usize),
            loop_snapshot: None,
            inner_source: None,
        };
        descriptor.validate()?;
        Ok(Some(descriptor))
    }
}

pub struct SpwMeta;

impl Meta for SpwMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "spw", extensions: &["spw"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        _cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut buf = [0u8; 0x2c];
        let n = source.read(&mut buf, 0)?;
        let file_size = source.size().ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("SPW source has no known size"))?;
        let header = match parse_spw(&buf[..n], file_size) {
            Ok(Some(h)) => h,
            Ok(None) => return Ok(None),
            Err(e) => return Err(e),
        };

        if header.channel_count == 0 {
            return malformed("SPW header declares zero channels");
        }

        const SAMPLE_RATE: u32 = 44100;
        const INTERLEAVE_BLOCK_SIZE: u64 = 9;

        let loop_flag = header.loop_start > 0;
        let total_samples = header.sample_count_field as i64 * 16;
        if total_samples <= 0 {
            return malformed("SPW header resolves to zero audio samples");
        }
        let loop_start_sample = if loop_flag { (header.loop_start - 1) * 16 } else { 0 };

        let channels = deinterleaved_channels(source, header.channel_count, header.start_offset, INTERLEAVE_BLOCK_SIZE)?;
        let codec = VagAdpcmCodec::new(header.channel_count as usize, 16);

        let descriptor = StreamDescriptor {
            meta_name: "spw",
            codec: CodecState::PerChannel(CodecId::VagAdpcm, Box::new(codec)),
            codec_config: CodecConfig::None,
            layout: Layout::Interleave {
                block_size: INTERLEAVE_BLOCK_SIZE as u32,
                first_block_size: None,
                last_block_size: None,
            },
            channels,
            channel_count: header.channel_count,
            sample_rate: SAMPLE_RATE,
            total_samples,
            loop_flag,
            loop_start_sample,
            loop_end_sample: total_samples,
            interleave_block_size: INTERLEAVE_BLOCK_SIZE as u32,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: 0,
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples: total_samples,
            play_forever: false,
            play: Default::default(),
            last_loop_output_sample: 0,
            mixer: MixerState::new(header.channel_count as usize),
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

    fn bgw_file(codec: u32, sample_rate_a: u32, sample_rate_b: u32, blocksize: u32, block_align: u8, channel_count: u8, loop_start: i32, start_offset: u32, data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x30];
        bytes[0..12].copy_from_slice(BGW_MAGIC);
        bytes[0x0c..0x10].copy_from_slice(&codec.to_le_bytes());
        bytes[0x18..0x1c].copy_from_slice(&blocksize.to_le_bytes());
        bytes[0x1c..0x20].copy_from_slice(&loop_start.to_le_bytes());
        bytes[0x20..0x24].copy_from_slice(&sample_rate_a.to_le_bytes());
        bytes[0x24..0x28].copy_from_slice(&sample_rate_b.to_le_bytes());
        bytes[0x28..0x2c].copy_from_slice(&start_offset.to_le_bytes());
        bytes[0x2e] = channel_count;
        bytes[0x2f] = block_align;
        bytes.extend_from_slice(data);
        let filesize = bytes.len() as u32;
        bytes[0x10..0x14].copy_from_slice(&filesize.to_le_bytes());
        bytes
    }

    fn spw_file(sample_count_field: u32, loop_start: i32, channel_count: u8, start_offset: u32, data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x2c];
        bytes[0..8].copy_from_slice(SPW_MAGIC);
        bytes[0x14..0x18].copy_from_slice(&sample_count_field.to_le_bytes());
        bytes[0x18..0x1c].copy_from_slice(&loop_start.to_le_bytes());
        bytes[0x24..0x28].copy_from_slice(&start_offset.to_le_bytes());
        bytes[0x2a] = channel_count;
        bytes.extend_from_slice(data);
        let filesize = bytes.len() as u32;
        bytes[0x08..0x0c].copy_from_slice(&filesize.to_le_bytes());
        bytes
    }

    #[test]
    fn meta_returns_none_without_the_bgw_magic() {
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(vec![0u8; 0x30], "test.bgw"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn rejects_filesize_mismatch() {
        let mut bytes = bgw_file(0, 0, 44100, 1, 18, 2, 0, 0x30, &vec![0u8; 32]);
        let len = bytes.len() as u32;
        bytes[0x10..0x14].copy_from_slice(&(len + 1).to_le_bytes());
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.bgw"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn vag_adpcm_variant_opens_with_half_block_align_plus_one_interleave() {
        let bytes = bgw_file(0, 0, 44100, 2, 18, 2, 0, 0x30, &vec![0u8; 36]);
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.bgw"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.channel_count, 2);
        assert_eq!(descriptor.interleave_block_size, 10);
        assert_eq!(descriptor.total_samples, 2 * 18);
        assert!(!descriptor.loop_flag);
    }

    #[test]
    fn sample_rate_is_the_wrapping_sum_of_two_header_words() {
        let bytes = bgw_file(0, u32::MAX, 2, 1, 18, 1, 0, 0x30, &vec![0u8; 9]);
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.bgw"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.sample_rate, 1);
    }

    #[test]
    fn loop_start_resolves_to_blocks_before_the_header_value() {
        let bytes = bgw_file(0, 0, 44100, 4, 18, 1, 2, 0x30, &vec![0u8; 72]);
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.bgw"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert!(descriptor.loop_flag);
        assert_eq!(descriptor.loop_start_sample, 18);
    }

    #[test]
    fn pcm_codec_tag_is_not_recognized() {
        let bytes = bgw_file(1, 0, 44100, 1, 18, 2, 0, 0x30, &vec![0u8; 36]);
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.bgw"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn atrac3_variant_opens_as_a_whole_frame_codec() {
        let bytes = bgw_file(3, 0, 44100, 10, 0xc0, 2, 0, 0x30, &vec![0u8; 10 * 0xc0]);
        let meta = BgwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.bgw"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.codec.id(), CodecId::Atrac3Plus);
        assert_eq!(descriptor.channels.len(), 1);
    }

    #[test]
    fn spw_opens_with_fixed_sample_rate_and_interleave() {
        let bytes = spw_file(100, 0, 2, 0x2c, &vec![0u8; 18 * 9]);
        let meta = SpwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.spw"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.sample_rate, 44100);
        assert_eq!(descriptor.interleave_block_size, 9);
        assert_eq!(descriptor.total_samples, 1600);
        assert!(!descriptor.loop_flag);
    }

    #[test]
    fn atrac3_key_xors_only_the_first_four_bytes_of_each_channel_slice() {
        let mut first_block = vec![0xaau8; BGW_ATRAC3_FRAME_SIZE * 2];
        first_block[0..4].copy_from_slice(&0u32.to_be_bytes());
        first_block[BGW_ATRAC3_FRAME_SIZE..BGW_ATRAC3_FRAME_SIZE + 4].copy_from_slice(&0u32.to_be_bytes());
        let key = bgw_atrac3_key(&first_block, 2, BGW_ATRAC3_FRAME_SIZE);
        assert_eq!(&key[0..4], &BGW_ATRAC3_KEY_CONSTANT.to_be_bytes());
        assert_eq!(&key[BGW_ATRAC3_FRAME_SIZE..BGW_ATRAC3_FRAME_SIZE + 4], &BGW_ATRAC3_KEY_CONSTANT.to_be_bytes());
        assert_eq!(key[4], 0xaa);
    }

    #[test]
    fn atrac3_decrypt_transform_is_its_own_inverse() {
        let key = vec![0x5au8; BGW_ATRAC3_FRAME_SIZE];
        let mut t = BgwAtrac3Decrypt { key, start_offset: 0x30 };
        let original = vec![0x11u8; BGW_ATRAC3_FRAME_SIZE];
        let mut buf = original.clone();
        t.transform(&mut buf, 0x30);
        t.transform(&mut buf, 0x30);
        assert_eq!(buf, original);
    }

    #[test]
    fn spw_loop_start_resolves_to_16_sample_blocks_before_header_value() {
        let bytes = spw_file(100, 3, 1, 0x2c, &vec![0u8; 9 * 100]);
        let meta = SpwMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.spw"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert!(descriptor.loop_flag);
        assert_eq!(descriptor.loop_start_sample, 32);
    }
}
