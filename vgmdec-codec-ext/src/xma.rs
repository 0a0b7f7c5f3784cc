// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Microsoft XMA2, reached through a pluggable [`XmaBackend`] for the same reason as
//! [`crate::atrac9`]: no safe Rust crate decodes XMA, so the bitstream is never touched here,
//! only reshaped into standard XMA2 packets for a linked decoder.
//!
//! EA titles store XMA as "EA-XMA": XMA2 with the per-packet padding stripped out to save space,
//! packed into SNS blocks that interleave one sub-block per stream. [`reinterleave_eaxma_block`]
//! undoes that, re-padding packets back to the fixed 0x800 size and rewriting each packet's
//! `packet_skip` field so the result reads like an ordinary interleaved XMA2 stream.

use std::any::Any;

use vgmdec_core::codecs::FrameCodec;
use vgmdec_core::errors::{malformed, unsupported, Result};
use vgmdec_core::stream::StreamChannel;

const XMA_PACKET_SIZE: usize = 0x800;

pub trait XmaBackend: Send {
    fn init(&mut self, channels: u32, sample_rate: u32) -> Result<()>;
    /// Feeds one `XMA_PACKET_SIZE` packet and returns any PCM it produced (may be empty: XMA
    /// frames can straddle packet boundaries).
    fn decode_packet(&mut self, packet: &[u8; XMA_PACKET_SIZE]) -> Result<Vec<i16>>;
}

/// Reinterleaves one EA-XMA "SNS" block into standard XMA2 packets.
///
/// `block` is the raw SNS block (its 4-byte size prefix and flag byte included). Returns the
/// reinterleaved packet bytes, a multiple of `XMA_PACKET_SIZE * num_streams` long, plus the
/// number of bytes of `block` consumed.
pub fn reinterleave_eaxma_block(block: &[u8], num_streams: usize) -> Result<(Vec<u8>, usize)> {
    if block.len() < 8 {
        return malformed("EA-XMA block shorter than its header");
    }
    let block_size = (u32::from_be_bytes([block[0], block[1], block[2], block[3]]) & 0x00FF_FFFF) as usize;
    if block_size > block.len() {
        return malformed("EA-XMA block_size overruns the available data");
    }

    let mut packets_offset = 8usize;
    let mut stream_sizes = Vec::with_capacity(num_streams);
    let mut max_packets = 0usize;

    for _ in 0..num_streams {
        if packets_offset + 4 > block.len() {
            return malformed("EA-XMA stream header runs past end of block");
        }
        let packets_size4 = u32::from_be_bytes([
            block[packets_offset],
            block[packets_offset + 1],
            block[packets_offset + 2],
            block[packets_offset + 3],
        ]) as usize;
        if packets_size4 == 0 {
            return malformed("EA-XMA stream with a null packet size");
        }
        let packets_size = (packets_size4 / 4).saturating_sub(4);
        let num_packets = packets_size / XMA_PACKET_SIZE + 1;
        max_packets = max_packets.max(num_packets);
        stream_sizes.push((packets_offset, packets_size));
        packets_offset += packets_size4 / 4;
    }

    let mut out = vec![0u8; max_packets * num_streams * XMA_PACKET_SIZE];

    for (s, &(stream_offset, packets_size)) in stream_sizes.iter().enumerate() {
        for p in 0..max_packets {
            let packet_offset = stream_offset + 4 + p * XMA_PACKET_SIZE;
            let v_offset = p * XMA_PACKET_SIZE * num_streams + s * XMA_PACKET_SIZE;

            let packet_to_do = if packets_size < p * XMA_PACKET_SIZE {
                0
            } else {
                (packets_size - p * XMA_PACKET_SIZE).min(XMA_PACKET_SIZE)
            };

            let mut header;
            if packet_to_do == 0 {
                header = 0x03FF_F800u32;
            } else if packet_offset + 4 <= block.len() {
                let src_end = (packet_offset + packet_to_do).min(block.len());
                out[v_offset..v_offset + (src_end - packet_offset)].copy_from_slice(&block[packet_offset..src_end]);
                header = u32::from_be_bytes([block[packet_offset], block[packet_offset + 1], block[packet_offset + 2], block[packet_offset + 3]]);
            } else {
                header = 0x03FF_F800;
            }

            if packet_to_do < XMA_PACKET_SIZE {
                for b in out[v_offset + packet_to_do..v_offset + XMA_PACKET_SIZE].iter_mut() {
                    *b = 0xFF;
                }
            }

            header = (header & 0xFFFF_FF00) | ((header & 0xFF) + num_streams as u32 - 1);
            out[v_offset..v_offset + 4].copy_from_slice(&header.to_be_bytes());
        }
    }

    Ok((out, block_size))
}

pub struct XmaCodec {
    backend: Option<Box<dyn XmaBackend>>,
    stream_count: u32,
    pending: Vec<i16>,
    pending_pos: usize,
}

impl XmaCodec {
    pub fn new(channels: u32, sample_rate: u32, stream_count: u32, backend: Option<Box<dyn XmaBackend>>) -> Result<Self> {
        let mut backend = backend;
        if let Some(b) = backend.as_mut() {
            b.init(channels, sample_rate)?;
        }
        Ok(XmaCodec { backend, stream_count, pending: Vec::new(), pending_pos: 0 })
    }
}

impl FrameCodec for XmaCodec {
    fn reset(&mut self) {
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn decode_frame(&mut self, channels: &mut [StreamChannel], out: &mut [i16]) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return unsupported("xma (no backend configured)");
        };

        let mut done = 0usize;
        while done < out.len() {
            if self.pending_pos < self.pending.len() {
                let n = (out.len() - done).min(self.pending.len() - self.pending_pos);
                out[done..done + n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                done += n;
                self.pending_pos += n;
                continue;
            }

            let mut packet = [0u8; XMA_PACKET_SIZE];
            let n = channels[0].file.read(&mut packet, channels[0].offset)?;
            channels[0].offset += n as u64;
            if n < XMA_PACKET_SIZE {
                out[done..].fill(0);
                return Ok(());
            }

            self.pending = backend.decode_packet(&packet)?;
            self.pending_pos = 0;
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
