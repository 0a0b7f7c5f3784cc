// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Critical-band table and quantizer scale table shared by every frame decode.

pub const CRITICAL_BAND_COUNT: usize = 27;
pub const MAX_SCALES: usize = 6;
const BASE_SCALE: f64 = 10.0;
const FREQUENCY_MASKING_FACTOR: f64 = 1.0;

/// Band boundaries in frequency-bin units; band `i` spans `[CRITICAL_BAND_DATA[i],
/// CRITICAL_BAND_DATA[i + 1])`.
pub const CRITICAL_BAND_DATA: [i16; CRITICAL_BAND_COUNT] =
    [0, 1, 2, 3, 4, 5, 6, 7, 9, 11, 13, 15, 17, 20, 23, 27, 31, 37, 43, 51, 62, 74, 89, 110, 139, 180, 256];

/// Per-quantizer dequantization scale: `s_i = FMF / (2^(i+1) - 1) * BASE^i`.
pub fn build_scales() -> [f64; MAX_SCALES] {
    let mut scales = [0.0f64; MAX_SCALES];
    scales[0] = BASE_SCALE;
    for i in 1..MAX_SCALES {
        scales[i] = scales[i - 1] * BASE_SCALE;
    }
    for (i, s) in scales.iter_mut().enumerate() {
        *s = FREQUENCY_MASKING_FACTOR / (((1u32 << (i + 1)) - 1) as f64) * *s;
    }
    scales
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_scale_matches_base_over_one() {
        let scales = build_scales();
        assert!((scales[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn scales_grow_with_index() {
        let scales = build_scales();
        for w in scales.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn band_table_is_monotonic_and_ends_at_max_freq() {
        for w in CRITICAL_BAND_DATA.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert_eq!(CRITICAL_BAND_DATA[CRITICAL_BAND_COUNT - 1], 256);
    }
}
