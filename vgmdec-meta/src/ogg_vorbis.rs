// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ogg Vorbis, plus three ways middleware has scrambled it: RPG Maker MV/MZ's first-page header
//! swap, the fixed-key XOR/nibble-swap scheme a handful of other ports (NIS, L2SD) reuse with
//! different keys, and Minecraft's pre-1.6.1 filename-keyed stream cipher. [`RpgmvOggFile`] undoes
//! the first, [`XorNibbleOgg`] the second, [`Mc161OggFile`] the third.
//!
//! Recognition reads the whole (decrypted) stream once, both to hand `lewton` the identification
//! and comment headers for channel count, sample rate, and loop points, and to find the last
//! page's granule position for the total sample count — the same two passes a real Ogg/Vorbis
//! demuxer makes over an unfamiliar file.

use std::io::Cursor;

use lewton::inside_ogg::OggStreamReader;

use vgmdec_codec_ext::vorbis::{scan_loop_comments, VorbisCodec, VorbisContainer};
use vgmdec_core::codecs::{CodecId, CodecState};
use vgmdec_core::config::{compute_play_samples, resolve_loop, PlaybackConfig};
use vgmdec_core::errors::{malformed, Result, VgmError};
use vgmdec_core::io::{IoTransform, StreamFile, Transform};
use vgmdec_core::layout::Layout;
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamChannel, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

/// RPG Maker MV/MZ's encrypted `.rpgmvo`/`.ogg_` scrambles the first 0x10 bytes of the file (the
/// start of the embedded Ogg stream's first page) with a fixed substitute header, except for the
/// two stream-serial bytes, which are copied live from the next, unscrambled page at a fixed
/// absolute offset — every page in the stream shares one serial, so the clear copy on a later page
/// tells us what the first page's serial must have been.
const RPGMV_HEADER: [u8; 16] =
    [0x4F, 0x67, 0x67, 0x53, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
const RPGMV_SERIAL_LO_OFFSET: u64 = 0x0e;
const RPGMV_SERIAL_HI_OFFSET: u64 = 0x0f;
const RPGMV_SERIAL_LO_SOURCE: u64 = 0x58;
const RPGMV_SERIAL_HI_SOURCE: u64 = 0x59;
const RPGMV_DATA_START: u64 = 0x10;

/// Exposes the Ogg stream embedded at absolute offset [`RPGMV_DATA_START`] in an RPGMV/RPGMZ file,
/// with the scrambled first-page header reconstructed on the fly.
///
/// This can't be a [`Transform`]: reconstructing the two serial bytes needs a read from a
/// different absolute offset than the one being transformed, which a transform's pure
/// `(offset, len) -> bytes` contract doesn't allow.
struct RpgmvOggFile<T> {
    inner: T,
}

impl<T: StreamFile> RpgmvOggFile<T> {
    fn new(inner: T) -> Self {
        RpgmvOggFile { inner }
    }

    fn patch_byte(&mut self, dst: &mut [u8], offset: u64, n: usize, rel: u64, live_source: u64) -> Result<()> {
        if offset <= rel && rel < offset + n as u64 {
            let mut byte = [0u8; 1];
            self.inner.read(&mut byte, live_source)?;
            dst[(rel - offset) as usize] = byte[0];
        }
        Ok(())
    }
}

impl<T: StreamFile> StreamFile for RpgmvOggFile<T> {
    fn read(&mut self, dst: &mut [u8], offset: u64) -> Result<usize> {
        let n = self.inner.read(dst, RPGMV_DATA_START + offset)?;
        for (i, byte) in dst[..n].iter_mut().enumerate() {
            let rel = offset + i as u64;
            if rel < RPGMV_HEADER.len() as u64 {
                *byte = RPGMV_HEADER[rel as usize];
            }
        }
        self.patch_byte(dst, offset, n, RPGMV_SERIAL_LO_OFFSET, RPGMV_SERIAL_LO_SOURCE)?;
        self.patch_byte(dst, offset, n, RPGMV_SERIAL_HI_OFFSET, RPGMV_SERIAL_HI_SOURCE)?;
        Ok(n)
    }

    fn size(&self) -> Option<u64> {
        self.inner.size().map(|s| s.saturating_sub(RPGMV_DATA_START))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open_sibling(&self, name: &str) -> Result<Option<Box<dyn StreamFile>>> {
        self.inner.open_sibling(name)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Fixed-key XOR, optional nibble swap, and optional "OggS" magic reconstruction over the file's
/// first 4 bytes: the shape several encrypted Ogg/Vorbis ports (NIS, L2SD) reduce to. An empty key
/// with no nibble swap leaves bytes past the header untouched, for header-swap-only schemes.
struct XorNibbleOgg {
    key: Vec<u8>,
    nibble_swap: bool,
    header_swap: bool,
}

impl Transform for XorNibbleOgg {
    fn transform(&mut self, buf: &mut [u8], offset: u64) {
        const MAGIC: [u8; 4] = *b"OggS";
        for (i, byte) in buf.iter_mut().enumerate() {
            let abs = offset + i as u64;
            if self.header_swap && abs < 4 {
                *byte = MAGIC[abs as usize];
                continue;
            }
            if self.key.is_empty() && !self.nibble_swap {
                break;
            }
            if !self.key.is_empty() {
                *byte ^= self.key[(abs as usize) % self.key.len()];
            }
            if self.nibble_swap {
                *byte = (*byte << 4) | (*byte >> 4);
            }
        }
    }
}

/// Minecraft (pre-1.6.1)'s encrypted music: Java's `String.hashCode()` over the file's own name
/// seeds a stream cipher that XORs each byte against the high byte of a 32-bit running state, the
/// state itself advanced by the *decrypted* byte. Unlike every other wrapper in this module, the
/// cipher is sequential: decrypting byte N needs the state left behind by byte N-1, so seeking
/// backward (or reading for the first time) means replaying from offset 0 rather than touching any
/// absolute offset directly. That dependency on read order is why this has to be a [`StreamFile`]
/// with its own mutable state rather than a [`Transform`], whose contract promises a pure function
/// of `(offset, len)` alone.
struct Mc161OggFile<T> {
    inner: T,
    base_key: i32,
    curr_key: i32,
    curr_offset: u64,
}

/// The chunk size the original skip-decrypts in when catching up to a forward seek, discarding the
/// decrypted bytes; any size works for correctness, this one just matches what's actually read.
const MC161_CHUNK: usize = 0x800;

fn java_hashcode(name: &str) -> i32 {
    let mut hash: i32 = 0;
    for &b in name.as_bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(b as i32);
    }
    hash
}

impl<T: StreamFile> Mc161OggFile<T> {
    fn new(inner: T, name: &str) -> Self {
        let base_key = java_hashcode(name);
        Mc161OggFile { inner, base_key, curr_key: base_key, curr_offset: 0 }
    }

    fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        let mut hash = self.curr_key;
        for byte in buf.iter_mut() {
            let plain = *byte ^ ((hash >> 8) as u8);
            hash = hash.wrapping_mul(498_729_871).wrapping_add(85731i32.wrapping_mul(plain as i8 as i32));
            *byte = plain;
        }
        self.curr_key = hash;
    }

    fn advance_to(&mut self, offset: u64) -> Result<()> {
        if offset < self.curr_offset || offset == 0 {
            self.curr_key = self.base_key;
            self.curr_offset = 0;
        }
        while self.curr_offset < offset {
            let step = (offset - self.curr_offset).min(MC161_CHUNK as u64) as usize;
            let mut scratch = vec![0u8; step];
            let n = self.inner.read(&mut scratch, self.curr_offset)?;
            self.decrypt_in_place(&mut scratch[..n]);
            self.curr_offset += n as u64;
            if n < step {
                break;
            }
        }
        Ok(())
    }
}

impl<T: StreamFile> StreamFile for Mc161OggFile<T> {
    fn read(&mut self, dst: &mut [u8], offset: u64) -> Result<usize> {
        self.advance_to(offset)?;
        let n = self.inner.read(dst, offset)?;
        self.decrypt_in_place(&mut dst[..n]);
        self.curr_offset = offset + n as u64;
        Ok(n)
    }

    fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open_sibling(&self, name: &str) -> Result<Option<Box<dyn StreamFile>>> {
        self.inner.open_sibling(name)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Scans for the last `"OggS"` page header in a full-file buffer and returns its granule position,
/// which for Vorbis is the total sample count at that page's end.
fn last_ogg_granule(data: &[u8]) -> Option<i64> {
    let mut best = None;
    let mut i = 0;
    while i + 14 <= data.len() {
        if &data[i..i + 4] == b"OggS" {
            best = Some(i64::from_le_bytes(
                data[i + 6..i + 14].try_into().expect("14-byte window sliced to an 8-byte array"),
            ));
        }
        i += 1;
    }
    best
}

fn read_all(source: &mut dyn StreamFile) -> Result<Vec<u8>> {
    let mut all = Vec::new();
    let mut buf = [0u8; 8192];
    let mut pos = 0u64;
    loop {
        let n = source.read(&mut buf, pos)?;
        if n == 0 {
            break;
        }
        pos += n as u64;
        all.extend_from_slice(&buf[..n]);
    }
    Ok(all)
}

pub struct OggVorbisMeta;

impl Meta for OggVorbisMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "ogg_vorbis", extensions: &["ogg", "logg", "rpgmvo", "ogg_"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        subsong: Option<u32>,
        cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        if subsong.unwrap_or(1) != 1 {
            return Ok(None);
        }

        let mut magic = [0u8; 8];
        let n = source.read(&mut magic, 0)?;

        let stream: Box<dyn StreamFile> = if n >= 4 && &magic[..4] == b"OggS" {
            source
        }
        else if n >= 8 && &magic[..8] == b"RPGMV\0\0\0" {
            Box::new(RpgmvOggFile::new(source))
        }
        else if n >= 4 && u32::from_be_bytes(magic[..4].try_into().unwrap()) == 0x0486_86c5 {
            Box::new(IoTransform::new(source, XorNibbleOgg { key: vec![0xf0], nibble_swap: true, header_swap: false }))
        }
        else {
            // No fixed magic survives Minecraft's scheme: the key comes from the filename, not the
            // content, so the only sniff available is decrypting the first page header and checking
            // whether it comes out as a real one.
            let name = source.name().to_string();
            let mut candidate = Mc161OggFile::new(source, &name);
            let mut probe = [0u8; 4];
            if candidate.read(&mut probe, 0)? == 4 && &probe == b"OggS" {
                Box::new(candidate)
            }
            else {
                return Ok(None);
            }
        };

        let mut stream = stream;
        let all = read_all(stream.as_mut())?;

        let reader = OggStreamReader::new(Cursor::new(all.clone()))
            .map_err(|_| VgmError::MalformedHeader("not a valid Ogg/Vorbis stream"))?;
        let channel_count = reader.ident_hdr.audio_channels as u32;
        let sample_rate = reader.ident_hdr.audio_sample_rate;
        let loops = scan_loop_comments(&reader.comment_hdr.comment_list, sample_rate);
        drop(reader);

        if channel_count == 0 {
            return malformed("Ogg/Vorbis identification header declares zero channels");
        }

        let total_samples = last_ogg_granule(&all).unwrap_or(0).max(0);
        let (meta_loop_flag, meta_loop_start, meta_loop_end) = match loops {
            Some(lp) => (true, lp.start as i64, lp.end.unwrap_or(total_samples as u64) as i64),
            None => (false, 0, 0),
        };
        let (loop_flag, loop_start_sample, loop_end_sample) =
            resolve_loop(cfg, meta_loop_flag, meta_loop_start, meta_loop_end, total_samples);
        let play_samples = compute_play_samples(cfg, loop_flag, loop_start_sample, loop_end_sample, total_samples, sample_rate);

        let codec = VorbisCodec::new(VorbisContainer::Ogg, channel_count);

        let descriptor = StreamDescriptor {
            meta_name: "ogg_vorbis",
            codec: CodecState::WholeFrame(CodecId::Vorbis, Box::new(codec)),
            codec_config: CodecConfig::None,
            layout: Layout::None,
            channels: vec![StreamChannel::new(stream, 0)],
            channel_count,
            sample_rate,
            total_samples,
            loop_flag,
            loop_start_sample,
            loop_end_sample,
            interleave_block_size: 0,
            interleave_first_block_size: None,
            interleave_last_block_size: None,
            samples_per_interleave_block: 0,
            subsong_index: 1,
            subsong_count: 1,
            stream_name: String::new(),
            play_samples,
            play_forever: cfg.play_forever && cfg.allow_play_forever,
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
    use vgmdec_core::io::MemoryFile;

    #[test]
    fn unrecognized_magic_returns_none() {
        let meta = OggVorbisMeta;
        let source = Box::new(MemoryFile::new(vec![0u8; 32], "test.bin"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }

    #[test]
    fn plain_oggs_magic_is_recognized_but_this_stream_is_not_valid_vorbis() {
        let mut bytes = vec![0u8; 32];
        bytes[0..4].copy_from_slice(b"OggS");
        let meta = OggVorbisMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.ogg"));
        let result = meta.try_open(source, None, &PlaybackConfig::default());
        assert!(matches!(result, Err(VgmError::MalformedHeader(_))));
    }

    #[test]
    fn rpgmv_magic_is_recognized_but_this_stream_is_not_valid_vorbis() {
        let mut bytes = vec![0u8; 0x60];
        bytes[0..8].copy_from_slice(b"RPGMV\0\0\0");
        let meta = OggVorbisMeta;
        let source = Box::new(MemoryFile::new(bytes, "test.rpgmvo"));
        let result = meta.try_open(source, None, &PlaybackConfig::default());
        assert!(matches!(result, Err(VgmError::MalformedHeader(_))));
    }

    #[test]
    fn rpgmv_wrapper_reconstructs_header_and_copies_live_serial_bytes() {
        let mut bytes = vec![0u8; 0x60];
        // Scrambled first page: garbage through 0x1F.
        for b in &mut bytes[RPGMV_DATA_START as usize..RPGMV_DATA_START as usize + 0x10] {
            *b = 0xAA;
        }
        bytes[0x58] = 0x77;
        bytes[0x59] = 0x88;

        let mut wrapper = RpgmvOggFile::new(MemoryFile::new(bytes, "test.rpgmvo"));
        let mut out = [0u8; 16];
        let n = wrapper.read(&mut out, 0).unwrap();
        assert_eq!(n, 16);
        assert_eq!(&out[..14], &RPGMV_HEADER[..14]);
        assert_eq!(out[14], 0x77);
        assert_eq!(out[15], 0x88);
    }

    #[test]
    fn rpgmv_wrapper_reconstructs_header_across_split_reads() {
        let mut bytes = vec![0u8; 0x60];
        bytes[0x58] = 0x11;
        bytes[0x59] = 0x22;

        let mut wrapper = RpgmvOggFile::new(MemoryFile::new(bytes, "test.rpgmvo"));
        let mut first = [0u8; 10];
        let mut second = [0u8; 6];
        wrapper.read(&mut first, 0).unwrap();
        wrapper.read(&mut second, 10).unwrap();

        let mut combined = Vec::new();
        combined.extend_from_slice(&first);
        combined.extend_from_slice(&second);
        assert_eq!(&combined[..14], &RPGMV_HEADER[..14]);
        assert_eq!(combined[14], 0x11);
        assert_eq!(combined[15], 0x22);
    }

    #[test]
    fn xor_nibble_transform_header_swap_only_leaves_payload_untouched() {
        let mut t = XorNibbleOgg { key: Vec::new(), nibble_swap: false, header_swap: true };
        let mut buf = [0xAAu8, 0xBB, 0xCC, 0xDD, 0x12, 0x34];
        t.transform(&mut buf, 0);
        assert_eq!(&buf[..4], b"OggS");
        assert_eq!(&buf[4..], &[0x12, 0x34]);
    }

    #[test]
    fn xor_nibble_transform_applies_key_then_swaps_nibbles() {
        // 0x12 ^ 0xF0 = 0xE2; nibble-swapping 0xE2 gives 0x2E.
        let mut t = XorNibbleOgg { key: vec![0xF0], nibble_swap: true, header_swap: false };
        let mut buf = [0x12u8];
        t.transform(&mut buf, 0);
        assert_eq!(buf[0], 0x2E);
    }

    // The cipher XORs against a keystream byte and is its own inverse, so running the same
    // decrypt step over known plaintext produces the matching ciphertext fixture.
    fn mc161_encrypt(name: &str, plain: &[u8]) -> Vec<u8> {
        let mut state = Mc161OggFile::new(MemoryFile::new(Vec::new(), "unused"), name);
        let mut buf = plain.to_vec();
        state.decrypt_in_place(&mut buf);
        buf
    }

    #[test]
    fn mc161_wrapper_decrypts_using_filename_seeded_keystream() {
        let plain = b"OggS and then some more bytes after the capture pattern";
        let cipher = mc161_encrypt("1.ogg", plain);
        let mut wrapper = Mc161OggFile::new(MemoryFile::new(cipher, "1.ogg"), "1.ogg");
        let mut out = vec![0u8; plain.len()];
        let n = wrapper.read(&mut out, 0).unwrap();
        assert_eq!(n, plain.len());
        assert_eq!(&out, plain);
    }

    #[test]
    fn mc161_wrapper_reads_correctly_after_seeking_backward() {
        let plain = b"0123456789ABCDEF_more_bytes_to_cross_chunk_boundaries_padding_padding_";
        let cipher = mc161_encrypt("song.ogg", plain);
        let mut wrapper = Mc161OggFile::new(MemoryFile::new(cipher, "song.ogg"), "song.ogg");

        let mut tail = [0u8; 8];
        wrapper.read(&mut tail, 20).unwrap();
        assert_eq!(&tail, &plain[20..28]);

        let mut head = [0u8; 8];
        wrapper.read(&mut head, 0).unwrap();
        assert_eq!(&head, &plain[0..8]);
    }

    #[test]
    fn mc161_magic_is_recognized_but_this_stream_is_not_valid_vorbis() {
        let mut plain = vec![0u8; 32];
        plain[0..4].copy_from_slice(b"OggS");
        let cipher = mc161_encrypt("track.dat", &plain);
        let meta = OggVorbisMeta;
        let source = Box::new(MemoryFile::new(cipher, "track.dat"));
        let result = meta.try_open(source, None, &PlaybackConfig::default());
        assert!(matches!(result, Err(VgmError::MalformedHeader(_))));
    }

    #[test]
    fn last_granule_finds_the_final_page_even_with_earlier_pages_present() {
        let mut data = Vec::new();
        data.extend_from_slice(b"OggS");
        data.extend_from_slice(&[0, 2]);
        data.extend_from_slice(&100i64.to_le_bytes());
        data.extend_from_slice(&[0u8; 50]);
        data.extend_from_slice(b"OggS");
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&9999i64.to_le_bytes());
        assert_eq!(last_ogg_granule(&data), Some(9999));
    }
}
