// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DCT-IV-via-FFT (the "Jens Nielsen" construction), 50%-overlap-add, and pixel-repeat upsampling
//! when the frame's sample rate calls for a larger wave than its DCT size.

use crate::complex::Complex;
use crate::fft::fft;

pub const MAX_SIZE: usize = 512;
pub const SIZE_LOW: usize = 128;
pub const SIZE_MID: usize = 256;
pub const SIZE_HIGH: usize = 512;

/// Twiddle table, always built at `SIZE_HIGH` regardless of the DCT size a given frame actually
/// uses: a smaller DCT reuses this table's leading entries rather than getting its own, since only
/// the 512/512 (DCT size / sample size) combination is exercised by any known stream.
pub fn build_dct_table() -> [f64; MAX_SIZE] {
    let mut dct = [0.0f64; MAX_SIZE];
    let dct_quarter = SIZE_HIGH >> 2;
    for i in 0..dct_quarter {
        let temp = (i as f64 + 0.125) * (2.0 * std::f64::consts::PI) * (1.0 / SIZE_HIGH as f64);
        dct[i] = temp.sin();
        dct[dct_quarter + i] = temp.cos();
    }
    dct
}

pub fn build_window_table() -> [f64; MAX_SIZE] {
    let mut window = [0.0f64; MAX_SIZE];
    for (i, w) in window.iter_mut().enumerate() {
        *w = (i as f64 * (std::f64::consts::PI / MAX_SIZE as f64)).sin();
    }
    window
}

/// One half-size complex FFT stands in for a full DCT-IV via pre- and post-rotation against the
/// twiddle table.
fn apply_idct(freq: &[f64], dct: &[f64; MAX_SIZE], dct_size: usize) -> Vec<f64> {
    let dct_half = dct_size >> 1;
    let dct_quarter = dct_size >> 2;
    let dct_3quarter = 3 * dct_quarter;

    let mut data: Vec<Complex> = (0..dct_quarter)
        .map(|i| {
            let coef1 = freq[2 * i] * 0.5;
            let coef2 = freq[dct_half - 1 - 2 * i] * 0.5;
            Complex::new(
                coef1 * dct[dct_quarter + i] + coef2 * dct[i],
                -coef1 * dct[i] + coef2 * dct[dct_quarter + i],
            )
        })
        .collect();

    fft(&mut data, false);

    let factor = 8.0 / (dct_size as f64).sqrt();
    let mut wave_tmp = vec![0.0f64; dct_size];
    for i in 0..dct_quarter {
        let re_i = data[i].re;
        let re = (data[i].re * dct[dct_quarter + i] + data[i].im * dct[i]) * factor;
        let im = (-re_i * dct[i] + data[i].im * dct[dct_quarter + i]) * factor;
        wave_tmp[i * 2] = re;
        wave_tmp[i * 2 + dct_half] = im;
    }
    for i in (1..dct_size).step_by(2) {
        wave_tmp[i] = -wave_tmp[dct_size - 1 - i];
    }

    let mut wave = vec![0.0f64; dct_size];
    wave[..dct_3quarter].copy_from_slice(&wave_tmp[dct_quarter..dct_quarter + dct_3quarter]);
    for i in dct_3quarter..dct_size {
        wave[i] = -wave_tmp[i - dct_3quarter];
    }
    wave
}

/// Transforms both halves of a frame's spectrum and overlap-adds them into the running
/// previous-frame buffer, returning this frame's output wave.
///
/// `wave_prv` carries the tail of the previous frame in and the tail of *this* frame out — a
/// frame's first `dct_half` output samples come from the prior call's carried tail, so the first
/// frame a stream decodes is always silent for its first half.
fn decode_frame(
    freq1: &[f64],
    freq2: &[f64],
    wave_prv: &mut [f64; MAX_SIZE],
    dct: &[f64; MAX_SIZE],
    window: &[f64; MAX_SIZE],
    dct_size: usize,
) -> [f64; MAX_SIZE] {
    let dct_half = dct_size >> 1;
    let mut wave_cur = *wave_prv;

    let wave_tmp = apply_idct(freq1, dct, dct_size);
    let next_half = apply_idct(freq2, dct, dct_size);
    let mut next_prv = *wave_prv;
    next_prv[..dct_size].copy_from_slice(&next_half);

    for i in 0..dct_half {
        wave_cur[dct_half + i] = wave_tmp[i] * window[i] + wave_cur[dct_half + i] * window[dct_half + i];
        next_prv[i] = next_prv[i] * window[i] + wave_tmp[dct_half + i] * window[dct_half + i];
    }

    *wave_prv = next_prv;
    wave_cur
}

fn pixel_repeat(wave: &[f64], factor: usize, out_len: usize) -> [f64; MAX_SIZE] {
    let mut out = [0.0f64; MAX_SIZE];
    let mut i = 0;
    while i < out_len {
        let v = wave[i / factor];
        for k in 0..factor {
            out[i + k] = v;
        }
        i += factor;
    }
    out
}

/// Produces 512 samples for one frame, pixel-repeating a smaller DCT's output when `dct_mode` is
/// below `samples_mode`.
pub fn decode_frame_base(
    freq1: &[f64],
    freq2: &[f64],
    wave_prv: &mut [f64; MAX_SIZE],
    dct: &[f64; MAX_SIZE],
    window: &[f64; MAX_SIZE],
    dct_mode: usize,
    samples_mode: usize,
) -> [f64; MAX_SIZE] {
    match samples_mode {
        SIZE_LOW => decode_frame(freq1, freq2, wave_prv, dct, window, SIZE_LOW),
        SIZE_MID if dct_mode == SIZE_LOW => {
            let wave_tmp = decode_frame(freq1, freq2, wave_prv, dct, window, SIZE_LOW);
            pixel_repeat(&wave_tmp, 2, SIZE_MID)
        }
        SIZE_MID => decode_frame(freq1, freq2, wave_prv, dct, window, SIZE_MID),
        SIZE_HIGH if dct_mode == SIZE_LOW => {
            let wave_tmp = decode_frame(freq1, freq2, wave_prv, dct, window, SIZE_LOW);
            pixel_repeat(&wave_tmp, 4, SIZE_HIGH)
        }
        SIZE_HIGH if dct_mode == SIZE_MID => {
            let wave_tmp = decode_frame(freq1, freq2, wave_prv, dct, window, SIZE_MID);
            pixel_repeat(&wave_tmp, 2, SIZE_HIGH)
        }
        _ => decode_frame(freq1, freq2, wave_prv, dct, window, samples_mode),
    }
}
