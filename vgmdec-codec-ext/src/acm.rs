// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interplay ACM's streaming surface. The `mus_acm` layout concatenates whole ACM sub-streams and
//! needs to seek, read raw PCM bytes in a caller-chosen endianness/width, and query total/current
//! position in both samples and bytes; it does not need to know how ACM's own entropy coding
//! works. [`AcmStream`] is that surface, implemented by a pluggable [`AcmBackend`] for the same
//! reason as the other third-party codecs in this crate: no published Rust crate decodes ACM.

use vgmdec_core::errors::{unsupported, Result};

#[derive(Copy, Clone, Debug)]
pub struct AcmInfo {
    pub channels: u32,
    pub sample_rate: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleWidth {
    Eight,
    Sixteen,
}

/// What a linked ACM decoder must expose. Mirrors `acm_read`/`acm_seek_pcm`/`acm_pcm_total` from
/// the reference streaming API, minus the parts the original exposed only for its own CLI tools.
pub trait AcmBackend: Send {
    fn info(&self) -> AcmInfo;
    fn pcm_total(&self) -> u64;
    fn pcm_tell(&self) -> u64;
    /// Reads up to `buf.len() / bytes_per_sample` samples, converting to `width`/`big_endian`/
    /// `signed` on the way out. Returns the number of bytes actually written.
    fn read(&mut self, buf: &mut [u8], big_endian: bool, width: SampleWidth, signed: bool) -> Result<usize>;
    fn seek_pcm(&mut self, pcm_pos: u64) -> Result<()>;
}

pub struct AcmStream {
    backend: Option<Box<dyn AcmBackend>>,
}

impl AcmStream {
    pub fn new(backend: Option<Box<dyn AcmBackend>>) -> Self {
        AcmStream { backend }
    }

    pub fn info(&self) -> Result<AcmInfo> {
        self.backend.as_ref().map(|b| b.info()).ok_or_else(|| unsupported::<AcmInfo>("acm (no backend configured)").unwrap_err())
    }

    pub fn pcm_total(&self) -> u64 {
        self.backend.as_ref().map(|b| b.pcm_total()).unwrap_or(0)
    }

    pub fn pcm_tell(&self) -> u64 {
        self.backend.as_ref().map(|b| b.pcm_tell()).unwrap_or(0)
    }

    pub fn read(&mut self, buf: &mut [u8], big_endian: bool, width: SampleWidth, signed: bool) -> Result<usize> {
        match self.backend.as_mut() {
            Some(b) => b.read(buf, big_endian, width, signed),
            None => unsupported("acm (no backend configured)"),
        }
    }

    pub fn seek_pcm(&mut self, pcm_pos: u64) -> Result<()> {
        match self.backend.as_mut() {
            Some(b) => b.seek_pcm(pcm_pos),
            None => unsupported("acm (no backend configured)"),
        }
    }

    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentBackend {
        pos: u64,
        total: u64,
    }
    impl AcmBackend for SilentBackend {
        fn info(&self) -> AcmInfo {
            AcmInfo { channels: 2, sample_rate: 22050 }
        }
        fn pcm_total(&self) -> u64 {
            self.total
        }
        fn pcm_tell(&self) -> u64 {
            self.pos
        }
        fn read(&mut self, buf: &mut [u8], _big_endian: bool, _width: SampleWidth, _signed: bool) -> Result<usize> {
            buf.fill(0);
            self.pos += (buf.len() / 2) as u64;
            Ok(buf.len())
        }
        fn seek_pcm(&mut self, pcm_pos: u64) -> Result<()> {
            self.pos = pcm_pos;
            Ok(())
        }
    }

    #[test]
    fn without_a_backend_every_call_reports_unsupported() {
        let mut stream = AcmStream::new(None);
        assert!(stream.info().is_err());
        assert_eq!(stream.pcm_total(), 0);
        assert!(stream.read(&mut [0u8; 4], false, SampleWidth::Sixteen, true).is_err());
    }

    #[test]
    fn tracks_position_across_reads_and_seeks() {
        let mut stream = AcmStream::new(Some(Box::new(SilentBackend { pos: 0, total: 1000 })));
        let mut buf = [0u8; 8];
        stream.read(&mut buf, false, SampleWidth::Sixteen, true).unwrap();
        assert_eq!(stream.pcm_tell(), 4);
        stream.seek_pcm(500).unwrap();
        assert_eq!(stream.pcm_tell(), 500);
    }
}
