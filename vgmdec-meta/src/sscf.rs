// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SSCF: Square Enix's older `.scd` variant with its payload XOR-encrypted against a keystream
//! derived from a per-file 32-bit id. Once decrypted, the payload is an ordinary RIFF/WAVE
//! container whose `fmt ` chunk is a Microsoft XMA2WAVEFORMATEX — this meta decrypts, walks the
//! RIFF chunks, and hands the `data` chunk's bytes to [`XmaCodec`] as a whole-frame stream.

use vgmdec_codec_ext::xma::XmaCodec;
use vgmdec_core::codecs::CodecState;
use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{malformed, Result};
use vgmdec_core::io::{Clamp, FakeName, IoTransform, StreamFile, Transform};
use vgmdec_core::layout::Layout;
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

const KEY_LEN: usize = 0x800;
const STREAM_OFFSET: u64 = 0x80;

/// Repeating-XORs the stream against a 0x800-byte keystream, expanded once from the file's own
/// 32-bit id via a xorshift-style recurrence. Mirrors the original's read-time `sscf_io_read`.
struct SscfDecrypt {
    key: [u8; KEY_LEN],
}

impl SscfDecrypt {
    fn new(file_xorkey: u32) -> Self {
        let mut xorkey = file_xorkey.rotate_right(21);
        let mut key = [0u8; KEY_LEN];
        let mut i = 0;
        while i < KEY_LEN {
            key[i..i + 4].copy_from_slice(&xorkey.to_le_bytes());
            xorkey = xorkey.wrapping_add(xorkey.rotate_left(3));
            i += 4;
        }
        SscfDecrypt { key }
    }
}

impl Transform for SscfDecrypt {
    fn transform(&mut self, buf: &mut [u8], offset: u64) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= self.key[((offset + i as u64) % KEY_LEN as u64) as usize];
        }
    }
}

/// A Microsoft `XMA2WAVEFORMATEX` as found in the RIFF `fmt ` chunk: an 18-byte `WAVEFORMATEX`
/// (`wFormatTag`, `nChannels`, `nSamplesPerSec`, ...) followed by the XMA2-specific extension
/// (`NumStreams`, `ChannelMask`, `SamplesEncoded`, ..., `LoopBegin`, `LoopLength`, ...). This
/// layout is the public Microsoft SDK structure, not something grounded in the corpus.
struct Xma2Format {
    channels: u32,
    sample_rate: u32,
    stream_count: u32,
    block_count: u32,
    samples_encoded: u32,
    loop_begin: u32,
    loop_length: u32,
}

fn parse_riff(decrypted: &mut dyn StreamFile, size: u64) -> Result<(Xma2Format, u64, u64)> {
    let mut header = [0u8; 12];
    decrypted.read_exact_at(&mut header, 0)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return malformed("SSCF payload is not a RIFF/WAVE container");
    }

    let mut fmt: Option<Xma2Format> = None;
    let mut data_range: Option<(u64, u64)> = None;

    let mut offset = 12u64;
    while offset + 8 <= size {
        let mut chunk_header = [0u8; 8];
        decrypted.read_exact_at(&mut chunk_header, offset)?;
        let chunk_id = &chunk_header[0..4];
        let chunk_size = u32::from_le_bytes(chunk_header[4..8].try_into().unwrap()) as u64;
        let chunk_data_offset = offset + 8;

        if chunk_id == b"fmt " {
            let mut fmt_buf = vec![0u8; chunk_size as usize];
            decrypted.read_exact_at(&mut fmt_buf, chunk_data_offset)?;
            if fmt_buf.len() < 0x36 {
                return malformed("SSCF fmt chunk is too short for XMA2WAVEFORMATEX");
            }
            let format_tag = u16::from_le_bytes(fmt_buf[0..2].try_into().unwrap());
            if format_tag != 0x0165 {
                return malformed("SSCF fmt chunk is not WAVE_FORMAT_XMA2");
            }
            let channels = u16::from_le_bytes(fmt_buf[2..4].try_into().unwrap()) as u32;
            let sample_rate = u32::from_le_bytes(fmt_buf[4..8].try_into().unwrap());
            let stream_count = u32::from_le_bytes(fmt_buf[0x12..0x16].try_into().unwrap());
            let samples_encoded = u32::from_le_bytes(fmt_buf[0x1a..0x1e].try_into().unwrap());
            let loop_begin = u32::from_le_bytes(fmt_buf[0x2a..0x2e].try_into().unwrap());
            let loop_length = u32::from_le_bytes(fmt_buf[0x2e..0x32].try_into().unwrap());
            let block_count = u16::from_le_bytes(fmt_buf[0x34..0x36].try_into().unwrap()) as u32;
            fmt = Some(Xma2Format { channels, sample_rate, stream_count, block_count, samples_encoded, loop_begin, loop_length });
        } else if chunk_id == b"data" {
            data_range = Some((chunk_data_offset, chunk_size));
        }

        offset = chunk_data_offset + chunk_size + (chunk_size & 1);
    }

    let fmt = fmt.ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("SSCF payload has no fmt chunk"))?;
    let (data_offset, data_size) = data_range.ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("SSCF payload has no data chunk"))?;
    Ok((fmt, data_offset, data_size))
}

pub struct SscfMeta;

impl Meta for SscfMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "sscf", extensions: &["scd"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        _cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut magic = [0u8; 4];
        if source.read(&mut magic, 0)? < 4 || &magic != b"SSCF" {
            return Ok(None);
        }

        let mut xorkey_buf = [0u8; 4];
        source.read_exact_at(&mut xorkey_buf, 0x14)?;
        let xorkey = u32::from_le_bytes(xorkey_buf);

        let total_size = source.size().ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("SSCF source has no known size"))?;
        if total_size <= STREAM_OFFSET {
            return malformed("SSCF file is smaller than its own fixed header");
        }

        let mut decrypted: Box<dyn StreamFile> = Box::new(IoTransform::new(source, SscfDecrypt::new(xorkey)));

        let mut riff_size_buf = [0u8; 4];
        decrypted.read_exact_at(&mut riff_size_buf, STREAM_OFFSET + 4)?;
        let riff_size = u32::from_le_bytes(riff_size_buf) as u64 + 8;
        let payload_size = riff_size.min(total_size - STREAM_OFFSET);

        let mut clamped: Box<dyn StreamFile> = Box::new(Clamp::new(decrypted, STREAM_OFFSET, payload_size));
        let (fmt, data_offset, data_size) = parse_riff(&mut *clamped, payload_size)?;

        if fmt.channels == 0 {
            return malformed("SSCF fmt chunk declares zero channels");
        }
        if fmt.sample_rate == 0 {
            return malformed("SSCF fmt chunk declares a zero sample rate");
        }

        let name = clamped.name().to_string();
        let audio: Box<dyn StreamFile> = Box::new(FakeName::new(Clamp::new(clamped, data_offset, data_size), format!("{name}.xma")));

        let channels = vec![StreamChannel::new(audio, 0)];

        let total_samples = fmt.samples_encoded as i64;
        let loop_flag = fmt.loop_length != 0;
        let loop_start_sample = fmt.loop_begin as i64;
        let loop_end_sample = loop_start_sample + fmt.loop_length as i64;

        let codec = XmaCodec::new(fmt.channels, fmt.sample_rate, fmt.stream_count.max(1), None)?;

        let descriptor = StreamDescriptor {
            meta_name: "sscf",
            codec: CodecState::WholeFrame(vgmdec_core::codecs::CodecId::Xma, Box::new(codec)),
            codec_config: CodecConfig::Xma { stream_count: fmt.stream_count.max(1), block_size: (fmt.block_count * 0x800).max(0x800) },
            layout: Layout::None,
            channels,
            channel_count: fmt.channels,
            sample_rate: fmt.sample_rate,
            total_samples,
            loop_flag,
            loop_start_sample,
            loop_end_sample: if loop_flag { loop_end_sample } else { total_samples },
            interleave_block_size: 0,
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
            mixer: MixerState::new(fmt.channels as usize),
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

    fn riff_wave_xma2(channels: u16, sample_rate: u32, samples_encoded: u32, stream_count: u32, data: &[u8]) -> Vec<u8> {
        let mut fmt = vec![0u8; 0x36];
        fmt[0..2].copy_from_slice(&0x0165u16.to_le_bytes());
        fmt[2..4].copy_from_slice(&channels.to_le_bytes());
        fmt[4..8].copy_from_slice(&sample_rate.to_le_bytes());
        fmt[0x12..0x16].copy_from_slice(&stream_count.to_le_bytes());
        fmt[0x1a..0x1e].copy_from_slice(&samples_encoded.to_le_bytes());

        let mut riff = Vec::new();
        riff.extend_from_slice(b"WAVE");
        riff.extend_from_slice(b"fmt ");
        riff.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        riff.extend_from_slice(&fmt);
        riff.extend_from_slice(b"data");
        riff.extend_from_slice(&(data.len() as u32).to_le_bytes());
        riff.extend_from_slice(data);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(riff.len() as u32).to_le_bytes());
        out.extend_from_slice(&riff);
        out
    }

    fn sscf_file(xorkey: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x80];
        bytes[0..4].copy_from_slice(b"SSCF");
        bytes[0x14..0x18].copy_from_slice(&xorkey.to_le_bytes());

        let key = SscfDecrypt::new(xorkey).key;
        let mut encrypted = payload.to_vec();
        for (i, b) in encrypted.iter_mut().enumerate() {
            *b ^= key[i % KEY_LEN];
        }
        bytes.extend(encrypted);
        bytes
    }

    #[test]
    fn meta_returns_none_without_the_sscf_magic() {
        let meta = SscfMeta;
        let source = Box::new(MemoryFile::new(vec![0u8; 0x80], "test.scd"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn decrypt_key_stream_is_deterministic_from_the_file_id() {
        let a = SscfDecrypt::new(0x1234_5678).key;
        let b = SscfDecrypt::new(0x1234_5678).key;
        assert_eq!(a, b);
        let c = SscfDecrypt::new(0x0000_0001).key;
        assert_ne!(a, c);
    }

    #[test]
    fn opens_a_round_tripped_xma2_payload() {
        let payload = riff_wave_xma2(2, 44100, 2048, 1, &[0u8; 0x800]);
        let bytes = sscf_file(0xdead_beef, &payload);
        let source = Box::new(MemoryFile::new(bytes, "test.scd"));
        let meta = SscfMeta;
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.channel_count, 2);
        assert_eq!(descriptor.sample_rate, 44100);
        assert_eq!(descriptor.total_samples, 2048);
    }
}
