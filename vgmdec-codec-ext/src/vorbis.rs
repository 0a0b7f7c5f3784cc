// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Xiph Vorbis, via `lewton`. Two container shapes show up in game rips: ordinary Ogg/Vorbis, and
//! "headerless" raw packet streams (Wwise WEM, Unity FSB, and friends) where the three setup
//! packets are either carried out-of-band in the format's own header or sit at the front of the
//! packet stream with no Ogg wrapper at all. [`VorbisContainer`] picks between lewton's two entry
//! points accordingly.
//!
//! [`scan_loop_comments`] mines the Vorbis comment header for the wide variety of ad-hoc loop
//! tags game middleware has used over the years.

use std::any::Any;
use std::io::Cursor;

use lewton::audio::read_audio_packet;
use lewton::header::{read_header_comment, read_header_ident, read_header_setup, CommentHeader, IdentHeader, SetupHeader};
use lewton::inside_ogg::OggStreamReader;

use vgmdec_core::codecs::FrameCodec;
use vgmdec_core::errors::{internal, Result, VgmError};
use vgmdec_core::stream::StreamChannel;

/// Loop points recovered from a comment header, in samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoopPoints {
    pub start: u64,
    pub end: Option<u64>,
}

/// Which comment key pairs a loop start may show up under; the matching end key, if any, is
/// looked up positionally (both lists line up index for index).
const LOOP_START_KEYS: &[&str] = &[
    "LOOPSTART",
    "LOOP_START",
    "LoopStart",
    "LOOP_BEGIN",
    "LOOPPOINT",
    "um3.stream.looppoint.start",
    "XIPH_CUE_LOOPSTART",
];
const LOOP_END_KEYS: &[&str] = &["LOOPEND", "LOOP_END", "LoopEnd", "LOOPLENGTH", "XIPH_CUE_LOOPEND"];

fn find_comment<'a>(comments: &'a [(String, String)], key: &str) -> Option<&'a str> {
    comments.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
}

/// Scans a Vorbis comment list for any of the loop metadata conventions seen in the wild and
/// returns the first one that parses. `sample_rate` is needed for the millisecond-denominated
/// variants (`LOOPMS`, `loopTime`).
pub fn scan_loop_comments(comments: &[(String, String)], sample_rate: u32) -> Option<LoopPoints> {
    for &start_key in LOOP_START_KEYS {
        if let Some(raw) = find_comment(comments, start_key) {
            if let Ok(start) = raw.trim().parse::<u64>() {
                let end = LOOP_END_KEYS.iter().find_map(|k| find_comment(comments, k)).and_then(|v| v.trim().parse::<u64>().ok());
                return Some(LoopPoints { start, end });
            }
        }
    }

    if let Some(raw) = find_comment(comments, "LOOPMS") {
        if let Ok(ms) = raw.trim().parse::<u64>() {
            let start = ms * sample_rate as u64 / 1000;
            return Some(LoopPoints { start, end: None });
        }
    }

    if let Some(raw) = find_comment(comments, "LOOP") {
        if let Some((s, e)) = raw.split_once(',') {
            if let (Ok(start), Ok(end)) = (s.trim().parse::<u64>(), e.trim().parse::<u64>()) {
                return Some(LoopPoints { start, end: Some(end) });
            }
        }
    }

    for key in ["lp", "LOOPDEFS"] {
        if let Some(raw) = find_comment(comments, key) {
            if let Some((s, e)) = raw.split_once(',') {
                if let (Ok(start), Ok(end)) = (s.trim().parse::<u64>(), e.trim().parse::<u64>()) {
                    return Some(LoopPoints { start, end: Some(end) });
                }
            }
        }
    }

    // title=-lpsN / album=-lpeN: the loop bounds are tacked onto the end of otherwise unrelated tags.
    let lps = find_comment(comments, "title").and_then(|v| v.rsplit_once("-lps")).and_then(|(_, n)| n.trim().parse::<u64>().ok());
    let lpe = find_comment(comments, "album").and_then(|v| v.rsplit_once("-lpe")).and_then(|(_, n)| n.trim().parse::<u64>().ok());
    if let Some(start) = lps {
        return Some(LoopPoints { start, end: lpe });
    }

    if let Some(raw) = find_comment(comments, "loopTime") {
        if let Ok(ms) = raw.trim().parse::<u64>() {
            let start = ms * sample_rate as u64 / 1000;
            return Some(LoopPoints { start, end: None });
        }
    }

    // MarkerNum=0002 + two M=7F... hex cue markers: the first marker is loop start, the second end.
    if find_comment(comments, "MarkerNum").map(|v| v.trim()) == Some("0002") {
        let markers: Vec<u64> = comments
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("M"))
            .filter_map(|(_, v)| v.strip_prefix("7F").and_then(|hex| u64::from_str_radix(hex.trim(), 16).ok()))
            .collect();
        if markers.len() >= 2 {
            return Some(LoopPoints { start: markers[0], end: Some(markers[1]) });
        }
    }

    None
}

/// Capcom SNGW and Hatsune Miku Project DIVA files disable lewton's (and libvorbis's) standard
/// channel mapping reorder; detected from the encoder comment tag.
pub fn wants_channel_reorder_disabled(comments: &[(String, String)]) -> bool {
    find_comment(comments, "ENCODER").map(|v| v.ends_with("ogg_vorbis_encode/")).unwrap_or(false)
}

pub enum VorbisContainer {
    Ogg,
    /// Raw, unwrapped packet stream; `setup_packet` is a pre-built setup header when the format
    /// stores one out of band (e.g. in its own file header) rather than in-stream.
    RawPackets { setup_packet: Option<Vec<u8>> },
}

enum Reader {
    Ogg(OggStreamReader<Cursor<Vec<u8>>>),
    Raw { ident: IdentHeader, comment: CommentHeader, setup: SetupHeader, pre_state: lewton::audio::PreviousWindowRight },
}

pub struct VorbisCodec {
    container: VorbisContainer,
    reader: Option<Reader>,
    raw_packets: std::collections::VecDeque<Vec<u8>>,
    pending: Vec<i16>,
    pending_pos: usize,
    channels: u32,
}

impl VorbisCodec {
    pub fn new(container: VorbisContainer, channels: u32) -> Self {
        VorbisCodec { container, reader: None, raw_packets: std::collections::VecDeque::new(), pending: Vec::new(), pending_pos: 0, channels }
    }

    pub fn loop_points(&self) -> Option<LoopPoints> {
        match self.reader.as_ref()? {
            Reader::Ogg(r) => scan_loop_comments(&r.comment_hdr.comment_list, r.ident_hdr.audio_sample_rate),
            Reader::Raw { comment, ident, .. } => scan_loop_comments(&comment.comment_list, ident.audio_sample_rate),
        }
    }

    fn ensure_reader(&mut self, channel: &mut StreamChannel) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let mut all = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = channel.file.read(&mut buf, channel.offset)?;
            if n == 0 {
                break;
            }
            channel.offset += n as u64;
            all.extend_from_slice(&buf[..n]);
        }

        match &self.container {
            VorbisContainer::Ogg => {
                let reader = OggStreamReader::new(Cursor::new(all))
                    .map_err(|_| VgmError::MalformedHeader("not a valid Ogg/Vorbis stream"))?;
                self.reader = Some(Reader::Ogg(reader));
            }
            VorbisContainer::RawPackets { setup_packet } => {
                let mut packets = split_length_prefixed_packets(&all);
                let ident_bytes = packets.next().ok_or(VgmError::MalformedHeader("missing Vorbis ident packet"))?;
                let comment_bytes = packets.next().ok_or(VgmError::MalformedHeader("missing Vorbis comment packet"))?;
                let setup_bytes: Vec<u8> = match setup_packet {
                    Some(bytes) => bytes.clone(),
                    None => packets.next().ok_or(VgmError::MalformedHeader("missing Vorbis setup packet"))?,
                };

                let ident = read_header_ident(&ident_bytes).map_err(|_| VgmError::MalformedHeader("malformed Vorbis ident header"))?;
                let comment = read_header_comment(&comment_bytes).map_err(|_| VgmError::MalformedHeader("malformed Vorbis comment header"))?;
                let setup = read_header_setup(&setup_bytes, ident.audio_channels, (ident.blocksize_0, ident.blocksize_1))
                    .map_err(|_| VgmError::MalformedHeader("malformed Vorbis setup header"))?;

                self.reader = Some(Reader::Raw { ident, comment, setup, pre_state: lewton::audio::PreviousWindowRight::new() });
                self.raw_packets = packets.collect();
            }
        }

        Ok(())
    }
}

/// lewton hands back per-channel planar samples; mixers and downstream stages want interleaved.
fn interleave(per_channel: &[Vec<i16>]) -> Vec<i16> {
    if per_channel.is_empty() {
        return Vec::new();
    }
    let frames = per_channel[0].len();
    let mut out = Vec::with_capacity(frames * per_channel.len());
    for i in 0..frames {
        for ch in per_channel {
            out.push(ch[i]);
        }
    }
    out
}

/// Splits a stream of `u16le`-length-prefixed packets (the common headerless-Vorbis framing).
fn split_length_prefixed_packets(data: &[u8]) -> impl Iterator<Item = Vec<u8>> + '_ {
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        if pos + 2 > data.len() {
            return None;
        }
        let len = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;
        if pos + len > data.len() {
            return None;
        }
        let packet = data[pos..pos + len].to_vec();
        pos += len;
        Some(packet)
    })
}

impl FrameCodec for VorbisCodec {
    fn reset(&mut self) {
        self.reader = None;
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn decode_frame(&mut self, channels: &mut [StreamChannel], out: &mut [i16]) -> Result<()> {
        self.ensure_reader(&mut channels[0])?;
        let stride = self.channels.max(1) as usize;

        let mut done = 0usize;
        while done < out.len() {
            if self.pending_pos < self.pending.len() {
                let n = (out.len() - done).min(self.pending.len() - self.pending_pos);
                out[done..done + n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                done += n;
                self.pending_pos += n;
                continue;
            }

            self.pending.clear();
            self.pending_pos = 0;

            match self.reader.as_mut().expect("ensure_reader populated it") {
                Reader::Ogg(r) => match r.read_dec_packet_itl() {
                    Ok(Some(samples)) => self.pending = samples,
                    Ok(None) => {
                        out[done..].fill(0);
                        return Ok(());
                    }
                    Err(_) => return internal("Vorbis packet decode failed"),
                },
                Reader::Raw { ident, setup, pre_state, .. } => {
                    let Some(packet) = self.raw_packets.pop_front() else {
                        out[done..].fill(0);
                        return Ok(());
                    };
                    match read_audio_packet(ident, setup, &packet, pre_state) {
                        Ok(per_channel) => self.pending = interleave(&per_channel),
                        Err(_) => return internal("Vorbis packet decode failed"),
                    }
                }
            }

            if self.pending.is_empty() || self.pending.len() % stride != 0 {
                out[done..].fill(0);
                return Ok(());
            }
        }

        Ok(())
    }

    fn snapshot(&self) -> Box<dyn Any + Send> {
        Box::new((self.pending.clone(), self.pending_pos))
    }

    fn restore(&mut self, snapshot: &(dyn Any + Send)) {
        if let Some((pending, pos)) = snapshot.downcast_ref::<(Vec<i16>, usize)>() {
            self.pending = pending.clone();
            self.pending_pos = *pos;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_plain_loopstart_and_loopend() {
        let comments = vec![("LOOPSTART".to_string(), "12345".to_string()), ("LOOPEND".to_string(), "99999".to_string())];
        let loops = scan_loop_comments(&comments, 44100).unwrap();
        assert_eq!(loops.start, 12345);
        assert_eq!(loops.end, Some(99999));
    }

    #[test]
    fn converts_loopms_to_samples() {
        let comments = vec![("LOOPMS".to_string(), "1000".to_string())];
        let loops = scan_loop_comments(&comments, 48000).unwrap();
        assert_eq!(loops.start, 48000);
        assert_eq!(loops.end, None);
    }

    #[test]
    fn parses_title_lps_album_lpe_pair() {
        let comments = vec![("title".to_string(), "Song Name-lps4410".to_string()), ("album".to_string(), "Album Name-lpe88200".to_string())];
        let loops = scan_loop_comments(&comments, 44100).unwrap();
        assert_eq!(loops.start, 4410);
        assert_eq!(loops.end, Some(88200));
    }

    #[test]
    fn detects_markernum_hex_cue_pair() {
        let comments = vec![
            ("MarkerNum".to_string(), "0002".to_string()),
            ("M".to_string(), "7F00001000".to_string()),
            ("M".to_string(), "7F00002000".to_string()),
        ];
        let loops = scan_loop_comments(&comments, 44100).unwrap();
        assert_eq!(loops.start, 0x1000);
        assert_eq!(loops.end, Some(0x2000));
    }

    #[test]
    fn no_loop_tags_returns_none() {
        let comments = vec![("TITLE".to_string(), "untitled".to_string())];
        assert!(scan_loop_comments(&comments, 44100).is_none());
    }

    #[test]
    fn detects_sngw_style_channel_reorder_disable() {
        let comments = vec![("ENCODER".to_string(), "Cavia/ogg_vorbis_encode/".to_string())];
        assert!(wants_channel_reorder_disabled(&comments));
    }

    #[test]
    fn splits_length_prefixed_packets() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[0xAA, 0xBB]);
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3]);
        let packets: Vec<_> = split_length_prefixed_packets(&data).collect();
        assert_eq!(packets, vec![vec![0xAA, 0xBB], vec![1, 2, 3]]);
    }
}
