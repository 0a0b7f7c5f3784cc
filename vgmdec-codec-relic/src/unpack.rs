// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame bit-unpacking: turns one `RELIC_BUFFER_SIZE` frame into two dequantized spectra
//! (`freq1`, `freq2`), using a per-channel exponent table that persists across frames until a
//! frame's flag bit asks for a reset.

use crate::bitreader::{read_sbits, read_ubits};
use crate::dequant::CRITICAL_BAND_DATA;

pub const MAX_FREQ: usize = 256;

/// Unpacks one frame's worth of bits into `freq1`/`freq2`, advancing `exponents` in place.
///
/// `buf` must be at least `RELIC_BUFFER_SIZE` (0x104) bytes, the last few bytes zero-padded so the
/// bit reader's 32-bit window never runs past real data near the end of a short frame.
pub fn unpack_frame(
    buf: &[u8],
    freq1: &mut [f64; MAX_FREQ],
    freq2: &mut [f64; MAX_FREQ],
    scales: &[f64; crate::dequant::MAX_SCALES],
    exponents: &mut [u8; MAX_FREQ],
    freq_size: usize,
) -> bool {
    freq1.fill(0.0);
    freq2.fill(0.0);

    let max_offset = (buf.len() * 8) as u32;
    let flags = read_ubits(2, 0, buf) as u8;
    let cb_bits = read_ubits(3, 2, buf);
    let ev_bits = read_ubits(2, 5, buf);
    let ei_bits = read_ubits(4, 7, buf);
    let mut bit_offset: u32 = 11;

    if flags & 1 == 1 {
        exponents.fill(0);
    }

    if cb_bits > 0 && ev_bits > 0 {
        let mut pos: usize = 0;
        for i in 0..(crate::dequant::CRITICAL_BAND_COUNT - 1) {
            if bit_offset + cb_bits > max_offset {
                return false;
            }
            let mv = read_ubits(cb_bits, bit_offset, buf);
            bit_offset += cb_bits;

            if i > 0 && mv == 0 {
                break;
            }
            pos += mv as usize;

            if bit_offset + ev_bits > max_offset {
                return false;
            }
            let ev = read_ubits(ev_bits, bit_offset, buf) as u8;
            bit_offset += ev_bits;

            if pos + 1 >= CRITICAL_BAND_DATA.len() {
                return false;
            }
            let lo = CRITICAL_BAND_DATA[pos] as usize;
            let hi = CRITICAL_BAND_DATA[pos + 1] as usize;
            for e in exponents.iter_mut().take(hi).skip(lo) {
                *e = ev;
            }
        }
    }

    let freq_half = freq_size >> 1;
    if freq_half > 0 && ei_bits > 0 {
        bit_offset = unpack_half(buf, max_offset, bit_offset, ei_bits, exponents, scales, freq_half, freq1);
        if bit_offset == u32::MAX {
            return false;
        }

        if flags & 2 == 2 {
            freq2.copy_from_slice(freq1);
        }
        else if unpack_half(buf, max_offset, bit_offset, ei_bits, exponents, scales, freq_half, freq2) == u32::MAX {
            return false;
        }
    }

    true
}

/// Reads one of the two quantized-value passes, returning `u32::MAX` on a bounds failure.
#[allow(clippy::too_many_arguments)]
fn unpack_half(
    buf: &[u8],
    max_offset: u32,
    mut bit_offset: u32,
    ei_bits: u32,
    exponents: &[u8; MAX_FREQ],
    scales: &[f64; crate::dequant::MAX_SCALES],
    freq_half: usize,
    out: &mut [f64; MAX_FREQ],
) -> u32 {
    let mut pos: usize = 0;
    for i in 0..MAX_FREQ {
        if bit_offset + ei_bits > max_offset {
            return u32::MAX;
        }
        let mv = read_ubits(ei_bits, bit_offset, buf);
        bit_offset += ei_bits;

        if i > 0 && mv == 0 {
            break;
        }
        pos += mv as usize;

        if pos >= MAX_FREQ {
            return u32::MAX;
        }
        let qv_bits = exponents[pos] as u32;

        if bit_offset + qv_bits + 2 > max_offset {
            return u32::MAX;
        }
        let qv = read_sbits(qv_bits + 2, bit_offset, buf);
        bit_offset += qv_bits + 2;

        if qv != 0 && pos < freq_half && qv_bits < 6 {
            out[pos] = qv as f64 * scales[qv_bits as usize];
        }
    }
    bit_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dequant::build_scales;

    #[test]
    fn all_zero_frame_flags_produce_silent_spectra() {
        let buf = [0u8; 0x104];
        let scales = build_scales();
        let mut exponents = [0u8; MAX_FREQ];
        let mut freq1 = [0.0; MAX_FREQ];
        let mut freq2 = [0.0; MAX_FREQ];
        let ok = unpack_frame(&buf, &mut freq1, &mut freq2, &scales, &mut exponents, 512);
        assert!(ok);
        assert!(freq1.iter().all(|&v| v == 0.0));
        assert!(freq2.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn exponent_reset_flag_clears_persisted_table() {
        let scales = build_scales();
        let mut exponents = [5u8; MAX_FREQ];
        let mut freq1 = [0.0; MAX_FREQ];
        let mut freq2 = [0.0; MAX_FREQ];
        // flags = 0b01 (reset bit set), everything else zero.
        let mut buf = [0u8; 0x104];
        buf[0] = 0b01;
        unpack_frame(&buf, &mut freq1, &mut freq2, &scales, &mut exponents, 512);
        assert!(exponents.iter().all(|&e| e == 0));
    }
}
