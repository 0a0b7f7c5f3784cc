// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FSB5's CELT variant, used by the 0.6.1 and 0.11.0 era of the reference CELT library before it
//! merged into Opus. Like [`crate::atrac9`], there is no safe Rust crate for either CELT vintage,
//! so decoding goes through a pluggable [`CeltFsbBackend`] rather than raw FFI.

use std::any::Any;

use vgmdec_core::codecs::ChannelCodec;
use vgmdec_core::errors::{unsupported, Result};
use vgmdec_core::stream::{CeltVersion, StreamChannel};

pub trait CeltFsbBackend: Send {
    fn init(&mut self, version: CeltVersion, channels: u32, frame_size: u32) -> Result<()>;
    /// Decodes one length-prefixed frame, returning the interleaved PCM it produced.
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>>;
}

pub struct CeltFsbCodec {
    backend: Option<Box<dyn CeltFsbBackend>>,
    version: CeltVersion,
    channels: u32,
    pending: Vec<i16>,
    pending_pos: usize,
}

impl CeltFsbCodec {
    pub fn new(version: CeltVersion, channels: u32, frame_size: u32, backend: Option<Box<dyn CeltFsbBackend>>) -> Result<Self> {
        let mut backend = backend;
        if let Some(b) = backend.as_mut() {
            b.init(version, channels, frame_size)?;
        }
        Ok(CeltFsbCodec { backend, version, channels, pending: Vec::new(), pending_pos: 0 })
    }
}

impl ChannelCodec for CeltFsbCodec {
    fn reset(&mut self) {
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn decode_channel(&mut self, channel: &mut StreamChannel, out: &mut [i16], channel_index: usize, _first_sample: usize) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return unsupported("celt_fsb (no backend configured)");
        };
        let stride = self.channels.max(1) as usize;

        let mut done = 0usize;
        while done < out.len() {
            if self.pending_pos < self.pending.len() {
                out[done] = self.pending[self.pending_pos + channel_index.min(stride - 1)];
                self.pending_pos += stride;
                done += 1;
                continue;
            }

            // FSB5 CELT frames are length-prefixed with a little-endian u16.
            let mut len_buf = [0u8; 2];
            let n = channel.file.read(&mut len_buf, channel.offset)?;
            if n < 2 {
                out[done..].fill(0);
                return Ok(());
            }
            channel.offset += 2;
            let frame_len = u16::from_le_bytes(len_buf) as usize;

            let mut frame = vec![0u8; frame_len];
            let n = channel.file.read(&mut frame, channel.offset)?;
            channel.offset += n as u64;
            frame.truncate(n);

            self.pending = backend.decode(&frame)?;
            self.pending_pos = 0;

            if self.pending.is_empty() {
                out[done..].fill(0);
                return Ok(());
            }
        }

        Ok(())
    }

    fn snapshot(&self, _channel_index: usize) -> Box<dyn Any + Send> {
        Box::new((self.pending.clone(), self.pending_pos))
    }

    fn restore(&mut self, _channel_index: usize, snapshot: &(dyn Any + Send)) {
        if let Some((pending, pos)) = snapshot.downcast_ref::<(Vec<i16>, usize)>() {
            self.pending = pending.clone();
            self.pending_pos = *pos;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgmdec_core::io::MemoryFile;

    struct SilentBackend;
    impl CeltFsbBackend for SilentBackend {
        fn init(&mut self, _version: CeltVersion, _channels: u32, _frame_size: u32) -> Result<()> {
            Ok(())
        }
        fn decode(&mut self, _frame: &[u8]) -> Result<Vec<i16>> {
            Ok(vec![0i16; 2])
        }
    }

    #[test]
    fn without_a_backend_reports_unsupported() {
        let mut codec = CeltFsbCodec::new(CeltVersion::V0_11_0, 1, 512, None).unwrap();
        let file = Box::new(MemoryFile::new(vec![0u8; 16], "test.celt"));
        let mut channel = StreamChannel::new(file, 0);
        let mut out = [0i16; 4];
        assert!(codec.decode_channel(&mut channel, &mut out, 0, 0).is_err());
    }

    #[test]
    fn short_read_past_end_of_stream_fills_silence() {
        let mut codec = CeltFsbCodec::new(CeltVersion::V0_6_1, 1, 256, Some(Box::new(SilentBackend))).unwrap();
        let file = Box::new(MemoryFile::new(vec![], "test.celt"));
        let mut channel = StreamChannel::new(file, 0);
        let mut out = [7i16; 4];
        codec.decode_channel(&mut channel, &mut out, 0, 0).unwrap();
        assert_eq!(out, [0i16; 4]);
    }
}
