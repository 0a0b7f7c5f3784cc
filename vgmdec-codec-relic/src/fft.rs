// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A mixed-radix FFT (decimation-in-time Cooley-Tukey), generalized to any radix rather than just
//! 2, so it can factor `N` through 3/5/8/10 stages and not just powers of two.
//!
//! Radices are tried largest-first so a size like 512 decomposes as a single chain of 8s rather
//! than a long chain of 2s; any residual prime factor outside `{2,3,4,5,8,10}` falls back to a
//! direct O(n^2) DFT for that stage.

use crate::complex::Complex;

const PREFERRED_RADICES: [usize; 6] = [10, 8, 5, 4, 3, 2];

/// Runs the FFT in place. `inverse` selects the `+i` sign convention; the caller is responsible
/// for the `1/n` normalization on an inverse transform.
pub fn fft(data: &mut [Complex], inverse: bool) {
    let n = data.len();
    if n <= 1 {
        return;
    }

    match PREFERRED_RADICES.iter().copied().find(|&r| r < n && n % r == 0) {
        Some(radix) => radix_step(data, radix, inverse),
        None => direct_dft(data, inverse),
    }
}

fn radix_step(data: &mut [Complex], radix: usize, inverse: bool) {
    let n = data.len();
    let m = n / radix;
    let sign = if inverse { 1.0 } else { -1.0 };

    // Split into `radix` interleaved subsequences and recurse on each.
    let mut subs: Vec<Vec<Complex>> = (0..radix)
        .map(|r| (0..m).map(|k| data[k * radix + r]).collect::<Vec<_>>())
        .collect();
    for sub in &mut subs {
        fft(sub, inverse);
    }

    // Combine: X[k + j*m] = sum_r (twiddle(r,k,n) * Y_r[k]) * radix-root(r*j).
    for k in 0..m {
        let twiddled: Vec<Complex> = (0..radix)
            .map(|r| {
                let angle = sign * 2.0 * std::f64::consts::PI * (r as f64) * (k as f64) / (n as f64);
                subs[r][k] * Complex::from_polar(angle)
            })
            .collect();

        for j in 0..radix {
            let mut acc = Complex::new(0.0, 0.0);
            for (r, &tw) in twiddled.iter().enumerate() {
                let angle = sign * 2.0 * std::f64::consts::PI * (r * j) as f64 / radix as f64;
                acc = acc + tw * Complex::from_polar(angle);
            }
            data[k + j * m] = acc;
        }
    }
}

fn direct_dft(data: &mut [Complex], inverse: bool) {
    let n = data.len();
    let sign = if inverse { 1.0 } else { -1.0 };
    let input = data.to_vec();
    for (k, slot) in data.iter_mut().enumerate() {
        let mut acc = Complex::new(0.0, 0.0);
        for (t, &x) in input.iter().enumerate() {
            let angle = sign * 2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
            acc = acc + x * Complex::from_polar(angle);
        }
        *slot = acc;
    }
}

/// Forward transform followed by the matching `1/n` normalized inverse; used only by tests to
/// check round-trip fidelity.
#[cfg(test)]
fn round_trip(data: &[Complex]) -> Vec<Complex> {
    let mut buf = data.to_vec();
    fft(&mut buf, false);
    fft(&mut buf, true);
    let n = buf.len() as f64;
    buf.iter().map(|c| Complex::new(c.re / n, c.im / n)).collect()
}
