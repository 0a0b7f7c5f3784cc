// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! ADPCM codec family: PSX/VAG, IMA (with the MTAF block variant), Nintendo DSP, Ongakukan, and
//! CRI ADX.
//!
//! Every codec here implements [`vgmdec_core::codecs::ChannelCodec`]: each channel owns its own
//! predictor/history state, addressed by `channel_index`, and decodes from its own
//! [`vgmdec_core::stream::StreamChannel`].

pub mod adx;
pub mod dsp;
pub mod ima;
pub mod ongakukan;
pub mod vag;

use vgmdec_core::errors::Result;
use vgmdec_core::io::StreamReader;
use vgmdec_core::stream::StreamChannel;

pub use adx::AdxCodec;
pub use dsp::DspAdpcmCodec;
pub use ima::{ImaAdpcmCodec, ImaSnapshot};
pub use ongakukan::OngakukanAdpcmCodec;
pub use vag::VagAdpcmCodec;

/// Reads `buf.len()` bytes from `channel`'s current offset, advancing it.
fn read_exact(channel: &mut StreamChannel, buf: &mut [u8]) -> Result<()> {
    let mut reader = StreamReader::new(&mut *channel.file, channel.offset);
    reader.read_buf_exact(buf)?;
    channel.offset = reader.pos();
    Ok(())
}

/// Splits a byte into its two 4-bit samples, low nibble first, each sign-extended to `i32` as a
/// value in `-8..=7`. Every codec in this crate packs two samples per byte in that order.
fn signed_nibbles(byte: u8) -> (i32, i32) {
    let lo = (((byte << 4) as i8) >> 4) as i32;
    let hi = ((byte as i8) >> 4) as i32;
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibble_sign_extension() {
        assert_eq!(signed_nibbles(0x00), (0, 0));
        assert_eq!(signed_nibbles(0x0F), (-1, 0));
        assert_eq!(signed_nibbles(0xF0), (0, -1));
        assert_eq!(signed_nibbles(0x7F), (-1, 7));
        assert_eq!(signed_nibbles(0x8F), (-1, -8));
    }
}
