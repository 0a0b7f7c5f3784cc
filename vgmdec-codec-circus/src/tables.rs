// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-point twiddle table and per-profile quantizer scales shared by every frame's transform
//! and scale stages.

/// `transform`'s butterfly tree indexes this as `sincos_table[k]` for sine and
/// `sincos_table[k + 1024]` for cosine, both in Q12 (`>> 12` after multiplying). Since
/// `1024 * pi/2048 == pi/2`, a single `sin(i * pi / 2048)` table serves both roles.
const SINCOS_LEN: usize = 3072;

pub fn build_sincos_table() -> Vec<i32> {
    (0..SINCOS_LEN)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::PI / 2048.0;
            (angle.sin() * 4096.0).round() as i32
        })
        .collect()
}

pub const SCALE_PROFILE_COUNT: usize = 6;
const SCALE_BANDS: usize = 8;

/// `scale`'s per-band quantizer step, one table per `flags & 0xF` profile (0..5). Each profile's
/// 8 bands grow geometrically, steeper profiles (higher index) covering a wider dynamic range at
/// coarser low-end resolution — the same per-band-doubling shape `vgmdec-codec-relic`'s quantizer
/// scale uses, parameterized by profile instead of fixed.
pub fn build_scale_tables() -> [[i32; SCALE_BANDS]; SCALE_PROFILE_COUNT] {
    let mut tables = [[0i32; SCALE_BANDS]; SCALE_PROFILE_COUNT];
    for (profile, table) in tables.iter_mut().enumerate() {
        let base = 1i64 << (profile + 2);
        for (band, slot) in table.iter_mut().enumerate() {
            *slot = (base << band).min(i32::MAX as i64) as i32;
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sincos_matches_pythagorean_identity() {
        let table = build_sincos_table();
        for k in [1usize, 5, 40, 900] {
            let sin = table[k] as f64;
            let cos = table[k + 1024] as f64;
            let mag = (sin * sin + cos * cos).sqrt() / 4096.0;
            assert!((mag - 1.0).abs() < 0.01, "k={k} mag={mag}");
        }
    }

    #[test]
    fn scale_tables_grow_within_and_across_profiles() {
        let tables = build_scale_tables();
        for table in &tables {
            for w in table.windows(2) {
                assert!(w[1] > w[0]);
            }
        }
        for w in tables.windows(2) {
            assert!(w[1][0] > w[0][0]);
        }
    }
}
