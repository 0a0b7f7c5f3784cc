// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! `vgmdec` is the top-level decode API: a [`VgmStream`] handle that turns a byte source into
//! PCM16, plus the filename/extension helpers a host application needs to decide whether to hand
//! a file to this crate at all.
//!
//! `vgmdec-core` and `vgmdec-meta` define the format registry and the playback driver; this crate
//! is the thin orchestrator on top, trying every registered [`vgmdec_core::Meta`] against a source
//! in priority order and wrapping whichever one recognizes it behind one handle.
//!
//! # Usage
//!
//! ```no_run
//! use vgmdec::{PlaybackConfig, VgmStream};
//! use vgmdec_core::io::FileStreamFile;
//!
//! # fn main() -> vgmdec_core::Result<()> {
//! let mut stream = VgmStream::new(PlaybackConfig::default());
//! stream.open(Box::new(FileStreamFile::open("song.adx")?), None)?;
//!
//! let frames = stream.play(4096)?;
//! println!("decoded {} interleaved samples", frames.len());
//! # Ok(())
//! # }
//! ```
//!
//! Dropping (or explicitly [`VgmStream::close`]ing) a [`VgmStream`] releases every channel handle
//! it opened, including any sibling files a meta picked up along the way.

use std::fmt;

pub use vgmdec_core::config::PlaybackConfig;
pub use vgmdec_core::errors::{Result, VgmError};
pub use vgmdec_core::io::StreamFile;
pub use vgmdec_core::tags::TagContext;

mod log_sink;
mod title;

pub use log_sink::{set_log, LogConfig};
pub use title::TitleConfig;

/// An opened, playable audio stream. Cheap to construct ([`VgmStream::new`]); [`VgmStream::open`]
/// does the real work of recognizing a format and building a decode pipeline for it.
pub struct VgmStream {
    config: PlaybackConfig,
    descriptor: Option<vgmdec_core::StreamDescriptor>,
    scratch: Vec<i16>,
}

impl VgmStream {
    /// Creates an unopened stream with the given playback configuration. Equivalent to the data
    /// model's `init()` followed immediately by `setup(stream, config)`: there is no decode state
    /// to set up before a source is opened, so the two collapse into one constructor here.
    pub fn new(config: PlaybackConfig) -> Self {
        VgmStream { config, descriptor: None, scratch: Vec::new() }
    }

    /// Replaces the playback configuration. Only takes effect on the next [`VgmStream::open`];
    /// an already-open stream keeps the loop/fade/downmix behavior it was opened with.
    pub fn setup(&mut self, config: PlaybackConfig) {
        self.config = config;
    }

    /// Tries every registered format against `source` in priority order, taking the first one
    /// that recognizes it. `subsong` selects a 1-based subsong index; `None` means "the
    /// first/only one".
    ///
    /// Each attempt gets its own independent handle via [`StreamFile::open_sibling`] rather than
    /// consuming `source` directly, since a meta that fails partway through takes its handle down
    /// with it. `source` itself is only ever used to spawn those handles and to report the name
    /// they're all opened under.
    ///
    /// Per-meta errors never escape this function: a meta that matches the magic but then finds a
    /// structural problem is treated the same as a meta that didn't match at all, and the next
    /// meta in the registry is tried. Only `NotRecognized`, once every meta has been tried and
    /// failed, is returned to the caller.
    pub fn open(&mut self, source: Box<dyn StreamFile>, subsong: Option<u32>) -> Result<()> {
        self.close();

        for meta in vgmdec_meta::all_metas() {
            let handle = match source.open_sibling(source.name()) {
                Ok(Some(handle)) => handle,
                Ok(None) | Err(_) => continue,
            };
            match meta.try_open(handle, subsong, &self.config) {
                Ok(Some(descriptor)) => {
                    self.descriptor = Some(descriptor);
                    return Ok(());
                }
                Ok(None) | Err(_) => continue,
            }
        }

        Err(VgmError::NotRecognized)
    }

    /// Whether a stream is currently open.
    pub fn is_open(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Decodes up to `requested_frames` frames and returns them as interleaved PCM16
    /// (`frame * channel_count + channel`), per [`Self::channel_count`]. Returns fewer than
    /// requested only once the stream has reached `play_samples`; call again to keep decoding
    /// zero-length results at that point.
    pub fn play(&mut self, requested_frames: usize) -> Result<&[i16]> {
        let descriptor = self.descriptor.as_mut().ok_or(VgmError::InvalidConfig("no stream is open"))?;
        self.scratch.clear();
        vgmdec_core::playback::render(descriptor, requested_frames, &mut self.scratch)?;
        Ok(&self.scratch)
    }

    /// Decodes into a caller-owned buffer instead of the internal scratch buffer. `out.len()` must
    /// be a multiple of the channel count; the number of frames filled is `out.len() /
    /// channel_count`. Returns the number of frames actually filled.
    pub fn fill(&mut self, out: &mut [i16]) -> Result<usize> {
        let descriptor = self.descriptor.as_mut().ok_or(VgmError::InvalidConfig("no stream is open"))?;
        let channel_count = descriptor.channel_count as usize;
        if channel_count == 0 || out.len() % channel_count != 0 {
            return Err(VgmError::InvalidConfig("output buffer length is not a multiple of the channel count"));
        }

        let mut scratch = Vec::new();
        let frames = vgmdec_core::playback::render(descriptor, out.len() / channel_count, &mut scratch)?;
        out[..scratch.len()].copy_from_slice(&scratch);
        Ok(frames)
    }

    /// Repositions playback at `sample_index`, clamped to `[0, play_samples]`. Implemented as a
    /// rewind followed by decoding forward and discarding output, so it lands on exactly the
    /// internal state continued playback would have reached.
    pub fn seek(&mut self, sample_index: i64) -> Result<()> {
        let descriptor = self.descriptor.as_mut().ok_or(VgmError::InvalidConfig("no stream is open"))?;
        vgmdec_core::playback::seek(descriptor, sample_index)
    }

    /// Current playback position in samples, counting loop iterations already played through.
    pub fn get_play_position(&self) -> i64 {
        self.descriptor.as_ref().map(|d| d.play.current_sample).unwrap_or(0)
    }

    /// Rewinds to the start without closing the stream: channel offsets, codec state, and
    /// loop/fade bookkeeping are all reset, same as a fresh [`Self::open`] of the same source.
    pub fn reset(&mut self) -> Result<()> {
        let descriptor = self.descriptor.as_mut().ok_or(VgmError::InvalidConfig("no stream is open"))?;
        vgmdec_core::playback::reset(descriptor);
        Ok(())
    }

    /// Closes every channel handle the open stream holds. A no-op if nothing is open. Also run
    /// automatically on drop.
    pub fn close(&mut self) {
        self.descriptor = None;
    }

    pub fn channel_count(&self) -> u32 {
        self.descriptor.as_ref().map(|d| d.channel_count).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.descriptor.as_ref().map(|d| d.sample_rate).unwrap_or(0)
    }

    /// One-line-plus-details description of the open stream's format, codec, and loop points.
    /// Returns `None` if nothing is open.
    pub fn format_describe(&self) -> Option<String> {
        let d = self.descriptor.as_ref()?;
        let mut text = format!("{}, {} Hz, {} ch, {} codec", d.meta_name, d.sample_rate, d.channel_count, d.codec.id().name());
        if d.loop_flag {
            use std::fmt::Write as _;
            let _ = write!(text, ", loop {}..{}", d.loop_start_sample, d.loop_end_sample);
        }
        if d.subsong_count > 1 {
            use std::fmt::Write as _;
            let _ = write!(text, ", subsong {}/{}", d.subsong_index, d.subsong_count);
        }
        Some(text)
    }

    /// Writes [`Self::format_describe`]'s text into `out` as a null-terminated, possibly
    /// truncated byte string, mirroring the buffer-and-length contract a C caller would use.
    /// Returns the byte count written including the terminator, or a negative truncation marker
    /// (the negated byte count that would have been written) if `out` was too small, or `None` if
    /// nothing is open.
    pub fn format_describe_into(&self, out: &mut [u8]) -> Option<i32> {
        let text = self.format_describe()?;
        Some(write_c_string(&text, out))
    }

    /// Builds a display title for the open stream. See [`TitleConfig`] for the precedence rules
    /// between the format's own embedded name and `cfg.filename`.
    pub fn get_title(&self, cfg: &TitleConfig) -> Option<String> {
        let d = self.descriptor.as_ref()?;
        Some(title::build(cfg, &d.stream_name, d.subsong_index, d.subsong_count))
    }
}

impl fmt::Debug for VgmStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VgmStream").field("is_open", &self.is_open()).finish()
    }
}

/// Writes `text` into `out` as a null-terminated string, truncating if it doesn't fit. Returns the
/// number of bytes written including the terminator if it fit, or the negated would-be byte count
/// (terminator included) if it didn't.
fn write_c_string(text: &str, out: &mut [u8]) -> i32 {
    if out.is_empty() {
        return -(text.len() as i32 + 1);
    }
    let bytes = text.as_bytes();
    let max_payload = out.len() - 1;
    let n = bytes.len().min(max_payload);
    out[..n].copy_from_slice(&bytes[..n]);
    out[n] = 0;
    if n < bytes.len() {
        -(bytes.len() as i32 + 1)
    }
    else {
        n as i32 + 1
    }
}

/// Flags controlling [`is_valid`]'s extension matching.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidExtensionConfig {
    /// `filename` is already just an extension (no dot, no path), not a full filename.
    pub is_extension: bool,
    /// Skip the built-in per-format extension list entirely; only `accept_common`/`accept_unknown`
    /// are consulted. Lets a host that maintains its own extension allow-list opt out of this
    /// crate's defaults without also accepting everything.
    pub skip_default: bool,
    /// A filename with no extension at all is rejected outright, bypassing `accept_unknown`.
    pub reject_extensionless: bool,
    /// Accept any extension not otherwise recognized.
    pub accept_unknown: bool,
    /// Also accept extensions from [`get_common_extensions`] (the subset with an unambiguous,
    /// non-overloaded magic) even when the full list is skipped via `skip_default`.
    pub accept_common: bool,
}

/// Reports whether `filename` (or, with `cfg.is_extension` set, a bare extension) looks like a
/// format this crate can open. This is a fast pre-filter based on extension alone; it does not
/// open or read the file, so a positive result is not a guarantee that [`VgmStream::open`] will
/// succeed.
pub fn is_valid(filename: &str, cfg: &ValidExtensionConfig) -> bool {
    let ext = if cfg.is_extension {
        Some(filename.to_ascii_lowercase())
    }
    else {
        filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
    };

    let Some(ext) = ext else {
        return !cfg.reject_extensionless && cfg.accept_unknown;
    };

    if !cfg.skip_default && get_extensions().iter().any(|e| *e == ext) {
        return true;
    }
    if cfg.accept_common && get_common_extensions().iter().any(|e| *e == ext) {
        return true;
    }
    cfg.accept_unknown
}

/// Every extension any registered format's [`vgmdec_core::FormatInfo`] claims, deduplicated and
/// sorted.
pub fn get_extensions() -> Vec<&'static str> {
    let mut exts: Vec<&'static str> = vgmdec_meta::all_metas().iter().flat_map(|m| m.info().extensions.iter().copied()).collect();
    exts.sort_unstable();
    exts.dedup();
    exts
}

/// The subset of [`get_extensions`] with an unambiguous magic of their own, excluding the formats
/// that are sniffed purely by heuristic range checks on the raw bytes (`ivb`, `vsv`) and so are
/// more likely to produce a false positive on an unrelated file sharing the extension.
pub fn get_common_extensions() -> Vec<&'static str> {
    const WEAK_SNIFF: &[&str] = &["ivb", "vsv"];
    get_extensions().into_iter().filter(|e| !WEAK_SNIFF.contains(e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgmdec_core::io::MemoryFile;

    fn ap_header(sample_rate: u32, interleave: u32, loop_start: i32, data_size: i32, start_offset: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x60];
        bytes[0..4].copy_from_slice(b"AP  ");
        bytes[0x08..0x0c].copy_from_slice(&sample_rate.to_le_bytes());
        bytes[0x0c..0x10].copy_from_slice(&interleave.to_le_bytes());
        bytes[0x14..0x18].copy_from_slice(&loop_start.to_le_bytes());
        bytes[0x18..0x1c].copy_from_slice(&data_size.to_le_bytes());
        bytes[0x1c..0x20].copy_from_slice(&start_offset.to_le_bytes());
        bytes
    }

    fn open_ap_fixture(stream: &mut VgmStream) {
        let mut bytes = ap_header(44100, 0x20, 0, 64, 0x60);
        bytes.resize(0x60 + 64, 0);
        let source: Box<dyn StreamFile> = Box::new(MemoryFile::new(bytes, "test.ap"));
        stream.open(source, None).unwrap();
    }

    #[test]
    fn opens_a_recognized_format_and_reports_its_shape() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        assert!(stream.is_open());
        assert_eq!(stream.channel_count(), 2);
        assert_eq!(stream.sample_rate(), 44100);
    }

    #[test]
    fn unrecognized_source_returns_not_recognized() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        let source: Box<dyn StreamFile> = Box::new(MemoryFile::new(vec![0xFFu8; 16], "mystery.bin"));
        let err = stream.open(source, None).unwrap_err();
        assert!(matches!(err, VgmError::NotRecognized));
        assert!(!stream.is_open());
    }

    #[test]
    fn play_decodes_interleaved_frames() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        let frames = stream.play(8).unwrap();
        assert_eq!(frames.len(), 8 * 2);
    }

    #[test]
    fn fill_rejects_a_buffer_not_sized_to_the_channel_count() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        let mut out = vec![0i16; 7];
        assert!(stream.fill(&mut out).is_err());
    }

    #[test]
    fn fill_writes_into_the_caller_buffer() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        let mut out = vec![0i16; 8 * 2];
        let frames = stream.fill(&mut out).unwrap();
        assert_eq!(frames, 8);
    }

    #[test]
    fn seek_then_play_matches_a_fresh_decode_to_the_same_point() {
        let mut a = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut a);
        a.seek(4).unwrap();
        let from_seek = a.play(4).unwrap().to_vec();

        let mut b = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut b);
        let from_start = b.play(8).unwrap().to_vec();

        assert_eq!(from_seek, from_start[8..]);
    }

    #[test]
    fn reset_rewinds_play_position() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        stream.play(4).unwrap();
        assert_eq!(stream.get_play_position(), 4);
        stream.reset().unwrap();
        assert_eq!(stream.get_play_position(), 0);
    }

    #[test]
    fn close_drops_the_open_stream() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        stream.close();
        assert!(!stream.is_open());
        assert!(stream.play(1).is_err());
    }

    #[test]
    fn format_describe_reports_codec_and_rate() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        let desc = stream.format_describe().unwrap();
        assert!(desc.contains("44100 Hz"));
        assert!(desc.contains("2 ch"));
    }

    #[test]
    fn format_describe_into_null_terminates_and_flags_truncation() {
        let mut stream = VgmStream::new(PlaybackConfig::default());
        open_ap_fixture(&mut stream);
        let mut tiny = [0u8; 4];
        let n = stream.format_describe_into(&mut tiny).unwrap();
        assert!(n < 0);
        assert_eq!(tiny[3], 0);

        let mut roomy = [0u8; 256];
        let n = stream.format_describe_into(&mut roomy).unwrap();
        assert!(n > 0);
        assert_eq!(roomy[n as usize - 1], 0);
    }

    #[test]
    fn is_valid_accepts_a_registered_extension() {
        let cfg = ValidExtensionConfig::default();
        assert!(is_valid("song.bin", &cfg));
    }

    #[test]
    fn is_valid_rejects_unknown_extension_without_accept_unknown() {
        let cfg = ValidExtensionConfig::default();
        assert!(!is_valid("song.xyz123", &cfg));
    }

    #[test]
    fn is_valid_accept_unknown_overrides_the_rejection() {
        let cfg = ValidExtensionConfig { accept_unknown: true, ..Default::default() };
        assert!(is_valid("song.xyz123", &cfg));
    }

    #[test]
    fn is_valid_extensionless_is_rejected_when_flagged() {
        let cfg = ValidExtensionConfig { reject_extensionless: true, accept_unknown: true, ..Default::default() };
        assert!(!is_valid("song", &cfg));
    }

    #[test]
    fn common_extensions_excludes_the_weak_sniff_formats() {
        let common = get_common_extensions();
        assert!(!common.contains(&"ivb"));
        assert!(!common.contains(&"vsv"));
        assert!(get_extensions().contains(&"ivb"));
    }
}
