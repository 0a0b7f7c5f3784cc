// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AAX: a CRI `@UTF` segment list over a concatenation of self-contained ADX sub-streams, played
//! back through [`vgmdec_core::layout::Layout::Segmented`]. Typically two segments (intro +
//! looping body), but the table format doesn't cap the count.

use vgmdec_codec_adpcm::AdxCodec;
use vgmdec_core::codecs::{CodecId, CodecState};
use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{malformed, Result};
use vgmdec_core::io::{MemoryFile, StreamFile};
use vgmdec_core::layout::{Layout, Segment, SegmentedLayout};
use vgmdec_core::mixer::MixerState;
use vgmdec_core::stream::{CodecConfig, StreamDescriptor};
use vgmdec_core::{FormatInfo, Meta};

use crate::adx::{self, AdxHeader};
use crate::utf::UtfTable;

pub struct AaxMeta;

impl Meta for AaxMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "aax", extensions: &["aax"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        _subsong: Option<u32>,
        _cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut magic = [0u8; 4];
        if source.read(&mut magic, 0)? < 4 || &magic != b"@UTF" {
            return Ok(None);
        }

        let size = source.size().ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("AAX source has no known size"))?;
        let mut buf = vec![0u8; size as usize];
        source.read_exact_at(&mut buf, 0)?;

        let table = match UtfTable::open(buf.clone()) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        if table.name != "AAX" {
            return Ok(None);
        }

        let segment_count = table.row_count();
        if segment_count == 0 {
            return malformed("AAX table has no segments");
        }

        let mut segments = Vec::with_capacity(segment_count);
        let mut channel_count = 0u32;
        let mut sample_rate = 0u32;
        let mut loop_segment = 0usize;

        for row in 0..segment_count {
            let name = table.query_string(row, "name").unwrap_or_default();
            if !name.starts_with("AAX\0") && !name.is_empty() {
                // Non-conforming rows are skipped rather than failing the whole table: some AAX
                // variants carry extra metadata rows alongside the segment list.
                continue;
            }

            let (data_off, data_size) = table.query_data(row, "data")?;
            let is_loop_segment = table.query_u32(row, "loop").unwrap_or(0) != 0;

            let segment_bytes = buf[data_off..data_off + data_size].to_vec();
            let mut probe = [0u8; 0x2C];
            let n = segment_bytes.len().min(probe.len());
            probe[..n].copy_from_slice(&segment_bytes[..n]);
            if u16::from_be_bytes([probe[0], probe[1]]) != adx::MAGIC {
                return malformed("AAX segment is not a self-contained ADX stream");
            }
            let header = AdxHeader::parse(&probe)?;

            channel_count = header.channel_count;
            sample_rate = header.sample_rate;
            if is_loop_segment {
                loop_segment = segments.len();
            }

            let segment_source: Box<dyn StreamFile> = Box::new(MemoryFile::new(segment_bytes, "segment.adx"));
            let channels = adx::split_interleaved_channels(
                segment_source,
                header.channel_count,
                header.data_offset as u64,
                header.frame_size as u64,
            )?;
            let codec = AdxCodec::new(header.channel_count as usize, header.sample_rate, header.highpass_cutoff, header.frame_size);

            segments.push(Segment {
                num_samples: header.sample_count as i64,
                codec: CodecState::PerChannel(CodecId::Adx, Box::new(codec)),
                channels,
            });
        }

        if segments.is_empty() {
            return malformed("AAX table has no recognizable ADX segments");
        }

        let total_samples: i64 = segments.iter().map(|s| s.num_samples).sum();
        let loop_flag = segments.len() > 1;
        let loop_start_sample: i64 = segments[..loop_segment].iter().map(|s| s.num_samples).sum();

        let layout = Layout::Segmented(SegmentedLayout {
            segments,
            loop_segment,
            current_segment: 0,
            sample_in_segment: 0,
        });

        // The segmented layout owns each segment's own `CodecState`; the descriptor's top-level
        // codec field is unused by the driver in this mode but still needs a concrete value, so it
        // mirrors the first segment's codec identity.
        let placeholder_codec = CodecState::PerChannel(CodecId::Adx, Box::new(AdxCodec::new(channel_count as usize, sample_rate, 0, 18)));

        let descriptor = StreamDescriptor {
            meta_name: "aax",
            codec: placeholder_codec,
            codec_config: CodecConfig::None,
            layout,
            channels: Vec::new(),
            channel_count,
            sample_rate,
            total_samples,
            loop_flag,
            loop_start_sample,
            loop_end_sample: total_samples,
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
            mixer: MixerState::new(channel_count as usize),
            loop_snapshot: None,
            inner_source: None,
        };
        Ok(Some(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adx_segment(samples: u32) -> Vec<u8> {
        let mut h = vec![0u8; 0x20];
        h[0..2].copy_from_slice(&adx::MAGIC.to_be_bytes());
        h[2..4].copy_from_slice(&20u16.to_be_bytes());
        h[5] = 18; // frame_size
        h[7] = 1; // channel_count
        h[8..12].copy_from_slice(&22050u32.to_be_bytes());
        h[12..16].copy_from_slice(&samples.to_be_bytes());
        h[16..18].copy_from_slice(&2272u16.to_be_bytes());
        h[18] = 3;
        h.resize(24 + 18 * 4, 0);
        h
    }

    fn utf_bytes(table_name: &str, name_off: usize, strings: Vec<u8>, schema: Vec<u8>, row_width: usize, rows_data: Vec<u8>, rows: u32, data: Vec<u8>) -> Vec<u8> {
        let header_len = 26 + schema.len();
        let rows_offset = header_len as u32;
        let strings_offset = rows_offset + row_width as u32 * rows;
        let data_offset = strings_offset + strings.len() as u32;

        let mut body = Vec::new();
        body.push(1);
        body.push(0);
        body.extend_from_slice(&rows_offset.to_be_bytes());
        body.extend_from_slice(&strings_offset.to_be_bytes());
        body.extend_from_slice(&data_offset.to_be_bytes());
        body.extend_from_slice(&(name_off as u32).to_be_bytes());
        body.extend_from_slice(&((schema.len() / 5) as u16).to_be_bytes());
        body.extend_from_slice(&(row_width as u16).to_be_bytes());
        body.extend_from_slice(&rows.to_be_bytes());
        body.extend_from_slice(&schema);
        body.extend_from_slice(&rows_data);
        body.extend_from_slice(&strings);
        body.extend_from_slice(&data);

        let mut table = Vec::new();
        table.extend_from_slice(b"@UTF");
        table.extend_from_slice(&(body.len() as u32).to_be_bytes());
        table.extend_from_slice(&body);
        let _ = table_name;
        table
    }

    #[test]
    fn opens_a_two_segment_table_and_sums_total_samples() {
        let seg0 = adx_segment(1000);
        let seg1 = adx_segment(2000);

        let mut strings = Vec::new();
        strings.extend_from_slice(b"\0");
        let table_name_off = strings.len();
        strings.extend_from_slice(b"AAX\0");
        let col_name_off = strings.len();
        strings.extend_from_slice(b"name\0");
        let col_data_off = strings.len();
        strings.extend_from_slice(b"data\0");
        let col_loop_off = strings.len();
        strings.extend_from_slice(b"loop\0");
        let seg_name_off = strings.len();
        strings.extend_from_slice(b"AAX\0\0");

        let mut data = Vec::new();
        let data0_off = data.len();
        data.extend_from_slice(&seg0);
        let data1_off = data.len();
        data.extend_from_slice(&seg1);

        let mut schema = Vec::new();
        schema.push(0x30 | 0x0A); // name: per-row string
        schema.extend_from_slice(&(col_name_off as u32).to_be_bytes());
        schema.push(0x30 | 0x0B); // data: per-row data
        schema.extend_from_slice(&(col_data_off as u32).to_be_bytes());
        schema.push(0x30 | 0x05); // loop: per-row u32
        schema.extend_from_slice(&(col_loop_off as u32).to_be_bytes());

        let row_width = 4 + 8 + 4;
        let mut rows = Vec::new();
        // row 0 (intro)
        rows.extend_from_slice(&(seg_name_off as u32).to_be_bytes());
        rows.extend_from_slice(&(data0_off as u32).to_be_bytes());
        rows.extend_from_slice(&(seg0.len() as u32).to_be_bytes());
        rows.extend_from_slice(&0u32.to_be_bytes());
        // row 1 (loop body)
        rows.extend_from_slice(&(seg_name_off as u32).to_be_bytes());
        rows.extend_from_slice(&(data1_off as u32).to_be_bytes());
        rows.extend_from_slice(&(seg1.len() as u32).to_be_bytes());
        rows.extend_from_slice(&1u32.to_be_bytes());

        let table = utf_bytes("AAX", table_name_off, strings, schema, row_width, rows, 2, data);

        let meta = AaxMeta;
        let source: Box<dyn StreamFile> = Box::new(MemoryFile::new(table, "test.aax"));
        let descriptor = meta.try_open(source, None, &PlaybackConfig::default()).unwrap().unwrap();
        assert_eq!(descriptor.total_samples, 3000);
        assert!(descriptor.loop_flag);
        assert_eq!(descriptor.loop_start_sample, 1000);
        match &descriptor.layout {
            Layout::Segmented(seg) => {
                assert_eq!(seg.segments.len(), 2);
                assert_eq!(seg.loop_segment, 1);
            }
            _ => panic!("expected a segmented layout"),
        }
    }

    #[test]
    fn rejects_a_source_without_the_utf_magic() {
        let meta = AaxMeta;
        let source: Box<dyn StreamFile> = Box::new(MemoryFile::new(vec![0u8; 32], "test.aax"));
        assert!(meta.try_open(source, None, &PlaybackConfig::default()).unwrap().is_none());
    }
}
