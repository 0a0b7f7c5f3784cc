// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Playback configuration: loop/fade/downmix behavior applied uniformly across every format.

/// Caller-provided playback configuration, set once via `setup` before `open`.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackConfig {
    pub disable_config_override: bool,
    pub allow_play_forever: bool,
    pub play_forever: bool,
    pub ignore_loop: bool,
    pub force_loop: bool,
    pub really_force_loop: bool,
    pub ignore_fade: bool,
    pub loop_count: f64,
    pub fade_time: f64,
    pub fade_delay: f64,
    pub auto_downmix_channels: i32,
    pub force_pcm16: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            disable_config_override: false,
            allow_play_forever: false,
            play_forever: false,
            ignore_loop: false,
            force_loop: false,
            really_force_loop: false,
            ignore_fade: false,
            loop_count: 2.0,
            fade_time: 10.0,
            fade_delay: 0.0,
            auto_downmix_channels: 0,
            force_pcm16: false,
        }
    }
}

/// Resolves a meta-reported loop (`loop_flag`, `loop_start`, `loop_end`) against the playback
/// config's override knobs.
pub fn resolve_loop(
    cfg: &PlaybackConfig,
    loop_flag: bool,
    loop_start: i64,
    loop_end: i64,
    total_samples: i64,
) -> (bool, i64, i64) {
    if cfg.ignore_loop {
        return (false, 0, 0);
    }
    if cfg.really_force_loop {
        return (true, 0, total_samples);
    }
    if loop_flag {
        return (true, loop_start, loop_end);
    }
    if cfg.force_loop {
        return (true, 0, total_samples);
    }
    (false, 0, 0)
}

/// Computes the total number of samples a stream should render, per the data model's formula:
/// without a loop, `play_samples = total_samples`; with a loop, the loop body repeats
/// `loop_count` times and a trailing fade is appended unless `ignore_fade` is set, in which case
/// the tail simply runs to `total_samples`.
pub fn compute_play_samples(
    cfg: &PlaybackConfig,
    loop_flag: bool,
    loop_start: i64,
    loop_end: i64,
    total_samples: i64,
    sample_rate: u32,
) -> i64 {
    if !loop_flag {
        return total_samples;
    }

    if cfg.play_forever && cfg.allow_play_forever {
        return i64::MAX;
    }

    if cfg.ignore_fade {
        return total_samples;
    }

    let loop_body = (loop_end - loop_start) as f64 * cfg.loop_count;
    let fade_samples = (cfg.fade_delay + cfg.fade_time) * sample_rate as f64;
    loop_start + loop_body as i64 + fade_samples as i64
}
