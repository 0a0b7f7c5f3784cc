// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sony ATRAC3plus, via a pluggable [`Atrac3PlusBackend`]. Same shape as [`crate::atrac9`]:
//! maiatrac3plus has no safe Rust binding, so frames are handed to whatever decoder an embedder
//! links in rather than decoded by hand or through raw FFI.

use std::any::Any;

use vgmdec_core::codecs::FrameCodec;
use vgmdec_core::errors::{unsupported, Result};
use vgmdec_core::stream::StreamChannel;

pub trait Atrac3PlusBackend: Send {
    fn init(&mut self, channels: u32, block_align: u32) -> Result<()>;
    /// Decodes one `block_align`-sized block, returning interleaved PCM for all channels.
    fn decode(&mut self, block: &[u8]) -> Result<Vec<i16>>;
}

pub struct Atrac3PlusCodec {
    backend: Option<Box<dyn Atrac3PlusBackend>>,
    channels: u32,
    block_align: u32,
    pending: Vec<i16>,
    pending_pos: usize,
}

impl Atrac3PlusCodec {
    pub fn new(channels: u32, block_align: u32, backend: Option<Box<dyn Atrac3PlusBackend>>) -> Result<Self> {
        let mut backend = backend;
        if let Some(b) = backend.as_mut() {
            b.init(channels, block_align)?;
        }
        Ok(Atrac3PlusCodec { backend, channels, block_align, pending: Vec::new(), pending_pos: 0 })
    }
}

impl FrameCodec for Atrac3PlusCodec {
    fn reset(&mut self) {
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn decode_frame(&mut self, channels: &mut [StreamChannel], out: &mut [i16]) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return unsupported("atrac3plus (no backend configured)");
        };
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

            let mut block = vec![0u8; self.block_align as usize];
            let n = channels[0].file.read(&mut block, channels[0].offset)?;
            channels[0].offset += n as u64;
            if n < block.len() {
                out[done..].fill(0);
                return Ok(());
            }

            self.pending = backend.decode(&block)?;
            self.pending_pos = 0;

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
    use vgmdec_core::io::MemoryFile;

    struct SilentBackend;
    impl Atrac3PlusBackend for SilentBackend {
        fn init(&mut self, _channels: u32, _block_align: u32) -> Result<()> {
            Ok(())
        }
        fn decode(&mut self, _block: &[u8]) -> Result<Vec<i16>> {
            Ok(vec![0i16; 4096 * 2])
        }
    }

    #[test]
    fn without_a_backend_reports_unsupported() {
        let mut codec = Atrac3PlusCodec::new(2, 384, None).unwrap();
        let file = Box::new(MemoryFile::new(vec![0u8; 384], "test.at3"));
        let mut channel = StreamChannel::new(file, 0);
        let mut out = [0i16; 8];
        assert!(codec.decode_frame(std::slice::from_mut(&mut channel), &mut out).is_err());
    }

    #[test]
    fn short_block_at_end_of_stream_fills_silence() {
        let mut codec = Atrac3PlusCodec::new(2, 384, Some(Box::new(SilentBackend))).unwrap();
        let file = Box::new(MemoryFile::new(vec![0u8; 10], "test.at3"));
        let mut channel = StreamChannel::new(file, 0);
        let mut out = [9i16; 8];
        codec.decode_frame(std::slice::from_mut(&mut channel), &mut out).unwrap();
        assert_eq!(out, [0i16; 8]);
    }
}
