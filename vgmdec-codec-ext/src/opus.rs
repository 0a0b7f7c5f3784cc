// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opus, via `audiopus` (a safe wrapper over libopus, so none of the `unsafe_code = forbid`
//! concerns that block a raw FFI binding apply here).
//!
//! Wwise stores Opus as bare, length-prefixed packets with no Ogg wrapper. [`wwise_packet_sample_count`]
//! reads the packet's TOC byte per RFC 6716 so the mixer knows how many samples a packet decodes
//! to without asking the decoder. [`OpusCodec`] rebuilds each packet into a real OggS page
//! (segment table, granule position, and a genuine CRC32 computed with the Tremor lookup table
//! `ww2ogg` uses) before handing the payload to the decoder, the same page shape a real Ogg/Opus
//! demuxer would produce from a `.wem`/`.ogg` Wwise rip.

use std::any::Any;

use audiopus::coder::Decoder as OpusDecoder;
use audiopus::{Channels, SampleRate};

use vgmdec_core::codecs::FrameCodec;
use vgmdec_core::errors::{internal_err, malformed, Result, VgmError};
use vgmdec_core::stream::StreamChannel;

const RFC6716_FRAME_SAMPLES_48K: [u32; 4] = [480, 960, 1920, 2880];

/// Wwise's own embedded Opus stream always claims this fixed OggS serial number (`ww2ogg`'s
/// choice); there is never more than one logical stream multiplexed into the page sequence, so
/// nothing downstream distinguishes pages by serial.
const WWISE_OPUS_SERIAL: u32 = 0x7667;

/// Tremor (`libvorbisidec`)'s byte-at-a-time CRC32 table, reused by `ww2ogg` for Ogg page
/// checksums. Not the zlib/IEEE 802.3 polynomial table despite matching bit width.
#[rustfmt::skip]
const CRC_LOOKUP: [u32; 256] = [
    0x00000000, 0x04c11db7, 0x09823b6e, 0x0d4326d9, 0x130476dc, 0x17c56b6b, 0x1a864db2, 0x1e475005,
    0x2608edb8, 0x22c9f00f, 0x2f8ad6d6, 0x2b4bcb61, 0x350c9b64, 0x31cd86d3, 0x3c8ea00a, 0x384fbdbd,
    0x4c11db70, 0x48d0c6c7, 0x4593e01e, 0x4152fda9, 0x5f15adac, 0x5bd4b01b, 0x569796c2, 0x52568b75,
    0x6a1936c8, 0x6ed82b7f, 0x639b0da6, 0x675a1011, 0x791d4014, 0x7ddc5da3, 0x709f7b7a, 0x745e66cd,
    0x9823b6e0, 0x9ce2ab57, 0x91a18d8e, 0x95609039, 0x8b27c03c, 0x8fe6dd8b, 0x82a5fb52, 0x8664e6e5,
    0xbe2b5b58, 0xbaea46ef, 0xb7a96036, 0xb3687d81, 0xad2f2d84, 0xa9ee3033, 0xa4ad16ea, 0xa06c0b5d,
    0xd4326d90, 0xd0f37027, 0xddb056fe, 0xd9714b49, 0xc7361b4c, 0xc3f706fb, 0xceb42022, 0xca753d95,
    0xf23a8028, 0xf6fb9d9f, 0xfbb8bb46, 0xff79a6f1, 0xe13ef6f4, 0xe5ffeb43, 0xe8bccd9a, 0xec7dd02d,
    0x34867077, 0x30476dc0, 0x3d044b19, 0x39c556ae, 0x278206ab, 0x23431b1c, 0x2e003dc5, 0x2ac12072,
    0x128e9dcf, 0x164f8078, 0x1b0ca6a1, 0x1fcdbb16, 0x018aeb13, 0x054bf6a4, 0x0808d07d, 0x0cc9cdca,
    0x7897ab07, 0x7c56b6b0, 0x71159069, 0x75d48dde, 0x6b93dddb, 0x6f52c06c, 0x6211e6b5, 0x66d0fb02,
    0x5e9f46bf, 0x5a5e5b08, 0x571d7dd1, 0x53dc6066, 0x4d9b3063, 0x495a2dd4, 0x44190b0d, 0x40d816ba,
    0xaca5c697, 0xa864db20, 0xa527fdf9, 0xa1e6e04e, 0xbfa1b04b, 0xbb60adfc, 0xb6238b25, 0xb2e29692,
    0x8aad2b2f, 0x8e6c3698, 0x832f1041, 0x87ee0df6, 0x99a95df3, 0x9d684044, 0x902b669d, 0x94ea7b2a,
    0xe0b41de7, 0xe4750050, 0xe9362689, 0xedf73b3e, 0xf3b06b3b, 0xf771768c, 0xfa325055, 0xfef34de2,
    0xc6bcf05f, 0xc27dede8, 0xcf3ecb31, 0xcbffd686, 0xd5b88683, 0xd1799b34, 0xdc3abded, 0xd8fba05a,
    0x690ce0ee, 0x6dcdfd59, 0x608edb80, 0x644fc637, 0x7a089632, 0x7ec98b85, 0x738aad5c, 0x774bb0eb,
    0x4f040d56, 0x4bc510e1, 0x46863638, 0x42472b8f, 0x5c007b8a, 0x58c1663d, 0x558240e4, 0x51435d53,
    0x251d3b9e, 0x21dc2629, 0x2c9f00f0, 0x285e1d47, 0x36194d42, 0x32d850f5, 0x3f9b762c, 0x3b5a6b9b,
    0x0315d626, 0x07d4cb91, 0x0a97ed48, 0x0e56f0ff, 0x1011a0fa, 0x14d0bd4d, 0x19939b94, 0x1d528623,
    0xf12f560e, 0xf5ee4bb9, 0xf8ad6d60, 0xfc6c70d7, 0xe22b20d2, 0xe6ea3d65, 0xeba91bbc, 0xef68060b,
    0xd727bbb6, 0xd3e6a601, 0xdea580d8, 0xda649d6f, 0xc423cd6a, 0xc0e2d0dd, 0xcda1f604, 0xc960ebb3,
    0xbd3e8d7e, 0xb9ff90c9, 0xb4bcb610, 0xb07daba7, 0xae3afba2, 0xaafbe615, 0xa7b8c0cc, 0xa379dd7b,
    0x9b3660c6, 0x9ff77d71, 0x92b45ba8, 0x9675461f, 0x8832161a, 0x8cf30bad, 0x81b02d74, 0x857130c3,
    0x5d8a9099, 0x594b8d2e, 0x5408abf7, 0x50c9b640, 0x4e8ee645, 0x4a4ffbf2, 0x470cdd2b, 0x43cdc09c,
    0x7b827d21, 0x7f436096, 0x7200464f, 0x76c15bf8, 0x68860bfd, 0x6c47164a, 0x61043093, 0x65c52d24,
    0x119b4be9, 0x155a565e, 0x18197087, 0x1cd86d30, 0x029f3d35, 0x065e2082, 0x0b1d065b, 0x0fdc1bec,
    0x3793a651, 0x3352bbe6, 0x3e119d3f, 0x3ad08088, 0x2497d08d, 0x2056cd3a, 0x2d15ebe3, 0x29d4f654,
    0xc5a92679, 0xc1683bce, 0xcc2b1d17, 0xc8ea00a0, 0xd6ad50a5, 0xd26c4d12, 0xdf2f6bcb, 0xdbee767c,
    0xe3a1cbc1, 0xe760d676, 0xea23f0af, 0xeee2ed18, 0xf0a5bd1d, 0xf464a0aa, 0xf9278673, 0xfde69bc4,
    0x89b8fd09, 0x8d79e0be, 0x803ac667, 0x84fbdbd0, 0x9abc8bd5, 0x9e7d9662, 0x933eb0bb, 0x97ffad0c,
    0xafb010b1, 0xab710d06, 0xa6322bdf, 0xa2f33668, 0xbcb4666d, 0xb8757bda, 0xb5365d03, 0xb1f740b4,
];

fn oggs_checksum(data: &[u8]) -> u32 {
    let mut crc_reg: u32 = 0;
    for &byte in data {
        crc_reg = (crc_reg << 8) ^ CRC_LOOKUP[(((crc_reg >> 24) as u8) ^ byte) as usize];
    }
    crc_reg
}

/// Builds a complete OggS page wrapping `payload` (one Opus packet): capture pattern, version,
/// header type flags (BOS only on `sequence == 0`), 64-bit granule, the fixed Wwise stream
/// serial, page sequence, a lacing/segment table, the payload itself, then the real CRC32 over
/// the whole page with the checksum field held at zero during the pass.
fn make_oggs_page(payload: &[u8], sequence: u32, granule: u64) -> Vec<u8> {
    let header_type_flag: u8 = if sequence == 0 { 2 } else { 0 };
    let segment_count = payload.len() / 0xFF + 1;

    let mut page = Vec::with_capacity(0x1B + segment_count + payload.len());
    page.extend_from_slice(b"OggS");
    page.push(0);
    page.push(header_type_flag);
    page.extend_from_slice(&(granule as u32).to_le_bytes());
    page.extend_from_slice(&((granule >> 32) as u32).to_le_bytes());
    page.extend_from_slice(&WWISE_OPUS_SERIAL.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&0u32.to_le_bytes());
    page.push(segment_count as u8);

    let mut lacing_done = 0usize;
    while lacing_done < payload.len() {
        let bytes = (payload.len() - lacing_done).min(0xFF);
        page.push(bytes as u8);
        lacing_done += bytes;
        if lacing_done == payload.len() && bytes == 0xFF {
            page.push(0);
        }
    }

    page.extend_from_slice(payload);

    let checksum = oggs_checksum(&page);
    page[0x16..0x1A].copy_from_slice(&checksum.to_le_bytes());
    page
}

/// Recovers the payload span from a page built by [`make_oggs_page`], the way a real Ogg demuxer
/// reads a page back apart: the segment table's length is carried at byte `0x1A`, and the payload
/// immediately follows it.
fn oggs_page_payload(page: &[u8]) -> &[u8] {
    let segment_count = page[0x1A] as usize;
    &page[0x1B + segment_count..]
}

/// Decodes an Opus packet's TOC byte (RFC 6716 §3.1) into the sample count its frames add up to,
/// at the packet's native sample rate (always 48kHz internally; callers resample as needed).
pub fn wwise_packet_sample_count(toc: u8) -> u32 {
    let config = toc >> 3;
    let frame_count_code = toc & 0x3;

    let samples_per_frame = if config < 12 {
        RFC6716_FRAME_SAMPLES_48K[(config & 0x3) as usize]
    } else if config < 16 {
        480 << (config - 12) / 4
    } else {
        120 << (config - 16) / 4
    };

    let frame_count = match frame_count_code {
        0 => 1,
        1 | 2 => 2,
        _ => return samples_per_frame, // code 3: frame count is in a second byte we don't have here.
    };

    samples_per_frame * frame_count
}

pub struct OpusCodec {
    decoder: OpusDecoder,
    channels: u32,
    pending: Vec<i16>,
    pending_pos: usize,
    /// OggS page sequence number of the next packet; page 0 carries the BOS flag.
    sequence: u32,
    /// Running granule position (total samples produced so far), carried into each page's
    /// granule field the way a real Wwise-to-Ogg pass tracks `samples_done`.
    granule: u64,
}

impl OpusCodec {
    pub fn new(channels: u32, sample_rate: u32) -> Result<Self> {
        let opus_channels = if channels == 1 { Channels::Mono } else { Channels::Stereo };
        let opus_rate = match sample_rate {
            8000 => SampleRate::Hz8000,
            12000 => SampleRate::Hz12000,
            16000 => SampleRate::Hz16000,
            24000 => SampleRate::Hz24000,
            _ => SampleRate::Hz48000,
        };
        let decoder = OpusDecoder::new(opus_rate, opus_channels).map_err(|_| VgmError::InvalidConfig("unsupported Opus sample rate/channel combination"))?;
        Ok(OpusCodec { decoder, channels, pending: Vec::new(), pending_pos: 0, sequence: 0, granule: 0 })
    }
}

impl FrameCodec for OpusCodec {
    fn reset(&mut self) {
        self.pending.clear();
        self.pending_pos = 0;
        self.sequence = 0;
        self.granule = 0;
    }

    fn decode_frame(&mut self, channels: &mut [StreamChannel], out: &mut [i16]) -> Result<()> {
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

            let mut size_buf = [0u8; 4];
            let n = channels[0].file.read(&mut size_buf, channels[0].offset)?;
            if n < 4 {
                out[done..].fill(0);
                return Ok(());
            }
            channels[0].offset += 4;
            let packet_size = u32::from_le_bytes(size_buf) as usize;

            let mut packet = vec![0u8; packet_size];
            let n = channels[0].file.read(&mut packet, channels[0].offset)?;
            channels[0].offset += n as u64;
            if n < packet_size {
                return malformed("truncated Wwise Opus packet");
            }

            let samples_per_frame = packet.first().map(|&toc| wwise_packet_sample_count(toc)).unwrap_or(0);
            self.granule += samples_per_frame as u64;
            let page = make_oggs_page(&packet, self.sequence, self.granule);
            self.sequence += 1;
            let payload = oggs_page_payload(&page);

            let max_samples = 5760; // 120ms at 48kHz, libopus's documented worst case.
            let mut pcm = vec![0i16; max_samples * stride];
            let decoded = self.decoder.decode(Some(payload), &mut pcm, false).map_err(|_| internal_err("Opus packet decode failed"))?;
            pcm.truncate(decoded * stride);
            self.pending = pcm;
            self.pending_pos = 0;

            if self.pending.is_empty() {
                out[done..].fill(0);
                return Ok(());
            }
        }

        Ok(())
    }

    fn snapshot(&self) -> Box<dyn Any + Send> {
        Box::new((self.pending.clone(), self.pending_pos, self.sequence, self.granule))
    }

    fn restore(&mut self, snapshot: &(dyn Any + Send)) {
        if let Some((pending, pos, sequence, granule)) = snapshot.downcast_ref::<(Vec<i16>, usize, u32, u64)>() {
            self.pending = pending.clone();
            self.pending_pos = *pos;
            self.sequence = *sequence;
            self.granule = *granule;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toc_config_0_frame_code_0_is_one_480_sample_frame() {
        assert_eq!(wwise_packet_sample_count(0x00), 480);
    }

    #[test]
    fn toc_frame_code_2_doubles_the_frame_count() {
        assert_eq!(wwise_packet_sample_count(0x02), 960);
    }

    #[test]
    fn toc_config_in_silk_wideband_range() {
        // config 12: 480 samples at the low end of the hybrid range.
        assert_eq!(wwise_packet_sample_count(12 << 3), 480);
    }

    #[test]
    fn oggs_page_round_trips_the_payload() {
        let packet = vec![0xAAu8; 40];
        let page = make_oggs_page(&packet, 0, 960);
        assert_eq!(&page[0..4], b"OggS");
        assert_eq!(oggs_page_payload(&page), &packet[..]);
    }

    #[test]
    fn first_page_sets_the_bos_flag() {
        let page = make_oggs_page(&[1, 2, 3], 0, 0);
        assert_eq!(page[5], 2);
        let page = make_oggs_page(&[1, 2, 3], 1, 0);
        assert_eq!(page[5], 0);
    }

    #[test]
    fn page_carries_sequence_and_granule_and_serial() {
        let page = make_oggs_page(&[9, 9], 5, 0x1_0002_0003);
        assert_eq!(u32::from_le_bytes(page[0x06..0x0A].try_into().unwrap()), 0x0002_0003);
        assert_eq!(u32::from_le_bytes(page[0x0A..0x0E].try_into().unwrap()), 0x1);
        assert_eq!(u32::from_le_bytes(page[0x0E..0x12].try_into().unwrap()), WWISE_OPUS_SERIAL);
        assert_eq!(u32::from_le_bytes(page[0x12..0x16].try_into().unwrap()), 5);
    }

    #[test]
    fn checksum_changes_when_payload_changes() {
        let a = make_oggs_page(&[1, 2, 3], 0, 0);
        let b = make_oggs_page(&[1, 2, 4], 0, 0);
        assert_ne!(&a[0x16..0x1A], &b[0x16..0x1A]);
    }

    #[test]
    fn large_payload_needs_a_multi_segment_table() {
        // 0x1FF bytes: two full 0xFF segments plus a short one, no trailing zero terminator.
        let packet = vec![0u8; 0x1FF];
        let page = make_oggs_page(&packet, 0, 0);
        assert_eq!(page[0x1A], 3);
        assert_eq!(oggs_page_payload(&page).len(), packet.len());
    }

    #[test]
    fn exact_multiple_of_255_adds_a_zero_terminator_segment() {
        let packet = vec![0u8; 0xFF];
        let page = make_oggs_page(&packet, 0, 0);
        // one full 0xFF segment plus the zero-length terminator ww2ogg's lacing loop writes.
        assert_eq!(page[0x1A], 2);
        assert_eq!(oggs_page_payload(&page).len(), packet.len());
    }
}
