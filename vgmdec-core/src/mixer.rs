// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The post-decode mixer: channel ops (swap/add/volume/limit/up-down-mix) and the fade envelope.

use crate::errors::{invalid_config, Result};

/// Maximum number of queued mix commands, matching the data model's cap.
pub const MAX_MIX_COMMANDS: usize = 512;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FadeShape {
    Linear,
    ExpFade,
    LogFade,
    RaisedSine,
    QuarterSine,
    Parabola,
    InverseParabola,
}

impl FadeShape {
    /// `-5.75646273248511` gives ~100dB of attenuation at `index == 0` for the exponential
    /// shapes; this is the same constant the data model specifies.
    const EXP_K: f64 = -5.75646273248511;

    /// Evaluates the shape function `g(index)` for `index` in `[0, 1]`.
    ///
    /// Short-circuits near the endpoints to avoid transcendental edge cases, per the data model:
    /// if `index <= 0.0001` or `index >= 0.9999`, `index` itself is returned unchanged.
    pub fn evaluate(&self, index: f64) -> f64 {
        if !(0.0001..=0.9999).contains(&index) {
            return index;
        }
        match self {
            FadeShape::Linear => index,
            FadeShape::ExpFade => (Self::EXP_K * (1.0 - index)).exp(),
            FadeShape::LogFade => 1.0 - (Self::EXP_K * index).exp(),
            FadeShape::RaisedSine => (1.0 - (index * std::f64::consts::PI).cos()) / 2.0,
            FadeShape::QuarterSine => (index * std::f64::consts::FRAC_PI_2).sin(),
            FadeShape::Parabola => 1.0 - (1.0 - index).sqrt(),
            FadeShape::InverseParabola => 1.0 - (1.0 - index).powi(2),
        }
    }
}

/// One entry in the ordered post-decode mix command list.
#[derive(Clone, Debug)]
pub enum MixCommand {
    Swap(usize, usize),
    Add { dst: usize, src: usize, gain: f32 },
    /// `channel == None` means "all channels".
    Volume { channel: Option<usize>, gain: f32 },
    Limit { channel: Option<usize>, gain: f32 },
    Upmix { dst: usize },
    Downmix { dst: usize },
    Killmix { from_channel: usize },
    Fade {
        channel: Option<usize>,
        vol_start: f32,
        vol_end: f32,
        shape: FadeShape,
        /// Absolute sample position; `-1` encodes "from the beginning".
        time_pre: i64,
        time_start: i64,
        time_end: i64,
        /// Absolute sample position; `-1` encodes "until the end".
        time_post: i64,
    },
}

impl MixCommand {
    pub fn validate(&self) -> Result<()> {
        if let MixCommand::Fade { time_pre, time_start, time_end, time_post, .. } = self {
            if time_start > time_end {
                return invalid_config("fade time_start must be <= time_end");
            }
            if *time_pre != -1 && time_pre > time_start {
                return invalid_config("fade time_pre must be <= time_start (or -1)");
            }
            if *time_post != -1 && time_end > time_post {
                return invalid_config("fade time_end must be <= time_post (or -1)");
            }
        }
        Ok(())
    }

    /// Returns `[effective_start, effective_end)` this fade is non-identity over, with `-1`
    /// resolved to the stream-relative open bound the caller supplies.
    fn fade_active_range(
        time_pre: i64,
        time_post: i64,
        stream_start: i64,
        stream_end: i64,
    ) -> (i64, i64) {
        let start = if time_pre == -1 { stream_start } else { time_pre };
        let end = if time_post == -1 { stream_end } else { time_post };
        (start, end)
    }
}

/// Runtime mixer state: current/maximum channel counts and the queued command list.
pub struct MixerState {
    pub max_channels: usize,
    pub current_channels: usize,
    pub commands: Vec<MixCommand>,
    scratch: Vec<f32>,
}

impl MixerState {
    pub fn new(channels: usize) -> Self {
        MixerState { max_channels: channels, current_channels: channels, commands: Vec::new(), scratch: Vec::new() }
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    pub fn push(&mut self, cmd: MixCommand) -> Result<()> {
        cmd.validate()?;
        if self.commands.len() >= MAX_MIX_COMMANDS {
            return invalid_config("mix command list is full");
        }
        self.commands.push(cmd);
        Ok(())
    }

    /// Applies every queued command, in order, to `buf` (interleaved PCM16, `self.current_channels`
    /// wide coming in). `frame_start` is the absolute sample position of `buf`'s first frame,
    /// used to evaluate time-gated fades. Returns the channel count after mixing (which may have
    /// changed via up/down/killmix).
    pub fn apply(&mut self, buf: &mut Vec<i16>, frames: usize, frame_start: i64) -> usize {
        if self.commands.is_empty() {
            return self.current_channels;
        }

        let max_ch = self.max_channels;
        self.scratch.clear();
        self.scratch.resize(max_ch * frames, 0.0);

        // Convert interleaved int16 -> float scratch, channel-major per frame, zero-padding any
        // channel not yet present.
        let in_ch = self.current_channels;
        for f in 0..frames {
            for c in 0..in_ch {
                self.scratch[f * max_ch + c] = buf[f * in_ch + c] as f32;
            }
        }

        let mut cur_ch = self.current_channels;
        let commands = self.commands.clone();
        for cmd in &commands {
            apply_command(cmd, &mut self.scratch, max_ch, &mut cur_ch, frames, frame_start);
        }
        self.current_channels = cur_ch;

        buf.clear();
        buf.resize(frames * cur_ch, 0);
        for f in 0..frames {
            for c in 0..cur_ch {
                buf[f * cur_ch + c] = clamp_i16(self.scratch[f * max_ch + c]);
            }
        }
        cur_ch
    }
}

fn clamp_i16(v: f32) -> i16 {
    v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn apply_command(
    cmd: &MixCommand,
    scratch: &mut [f32],
    max_ch: usize,
    cur_ch: &mut usize,
    frames: usize,
    frame_start: i64,
) {
    match *cmd {
        MixCommand::Swap(a, b) => {
            for f in 0..frames {
                scratch.swap(f * max_ch + a, f * max_ch + b);
            }
        }
        MixCommand::Add { dst, src, gain } => {
            for f in 0..frames {
                let add = scratch[f * max_ch + src] * gain;
                scratch[f * max_ch + dst] += add;
            }
        }
        MixCommand::Volume { channel, gain } => match channel {
            Some(ch) => {
                for f in 0..frames {
                    scratch[f * max_ch + ch] *= gain;
                }
            }
            None => {
                for v in scratch.iter_mut().take(frames * max_ch) {
                    *v *= gain;
                }
            }
        },
        MixCommand::Limit { channel, gain } => {
            let bound = 32767.0 * gain;
            let mut clamp_one = |f: usize, ch: usize| {
                let v = &mut scratch[f * max_ch + ch];
                *v = v.clamp(-bound, bound);
            };
            match channel {
                Some(ch) => {
                    for f in 0..frames {
                        clamp_one(f, ch);
                    }
                }
                None => {
                    for f in 0..frames {
                        for ch in 0..*cur_ch {
                            clamp_one(f, ch);
                        }
                    }
                }
            }
        }
        MixCommand::Upmix { dst } => {
            if *cur_ch < max_ch {
                for f in 0..frames {
                    let base = f * max_ch;
                    for ch in (dst..*cur_ch).rev() {
                        scratch[base + ch + 1] = scratch[base + ch];
                    }
                    scratch[base + dst] = 0.0;
                }
                *cur_ch += 1;
            }
        }
        MixCommand::Downmix { dst } => {
            if *cur_ch > 0 && dst < *cur_ch {
                for f in 0..frames {
                    let base = f * max_ch;
                    for ch in dst..*cur_ch - 1 {
                        scratch[base + ch] = scratch[base + ch + 1];
                    }
                }
                *cur_ch -= 1;
            }
        }
        MixCommand::Killmix { from_channel } => {
            *cur_ch = from_channel;
        }
        MixCommand::Fade { channel, vol_start, vol_end, shape, time_pre, time_start, time_end, time_post } => {
            let (active_start, active_end) = MixCommand::fade_active_range(
                time_pre,
                time_post,
                frame_start,
                frame_start + frames as i64,
            );

            // Anchor-at-time_start special case: an open-ended pre-segment with vol_start == 1.0
            // is a no-op before time_start, so skip straight to evaluating from there.
            let pre_is_anchor = time_pre == -1 && vol_start == 1.0;

            for f in 0..frames {
                let p = frame_start + f as i64;
                if p < active_start || p >= active_end {
                    continue;
                }

                let vol = if !pre_is_anchor && p < time_start {
                    vol_start
                }
                else if p >= time_end {
                    vol_end
                }
                else if time_end > time_start {
                    let is_fade_in = vol_end >= vol_start;
                    let index = if is_fade_in {
                        (p - time_start) as f64 / (time_end - time_start) as f64
                    }
                    else {
                        (time_end - p) as f64 / (time_end - time_start) as f64
                    };
                    let g = shape.evaluate(index) as f32;
                    if is_fade_in {
                        vol_start + (vol_end - vol_start) * g
                    }
                    else {
                        vol_end - (vol_end - vol_start) * g
                    }
                }
                else {
                    vol_end
                };

                match channel {
                    Some(ch) => scratch[f * max_ch + ch] *= vol,
                    None => {
                        for c in 0..*cur_ch {
                            scratch[f * max_ch + c] *= vol;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_shape_endpoints_are_monotonic() {
        for shape in [
            FadeShape::Linear,
            FadeShape::ExpFade,
            FadeShape::LogFade,
            FadeShape::RaisedSine,
            FadeShape::QuarterSine,
            FadeShape::Parabola,
            FadeShape::InverseParabola,
        ] {
            assert!((shape.evaluate(0.0) - 0.0).abs() < 1e-9);
            assert!((shape.evaluate(1.0) - 1.0).abs() < 1e-9);
            let mut prev = -1.0;
            let mut i = 0.0;
            while i <= 1.0 {
                let g = shape.evaluate(i);
                assert!(g >= prev - 1e-9, "{:?} not monotonic at {}", shape, i);
                prev = g;
                i += 0.05;
            }
        }
    }

    #[test]
    fn pcm16_clamp_never_overflows() {
        assert_eq!(clamp_i16(40000.0), i16::MAX);
        assert_eq!(clamp_i16(-40000.0), i16::MIN);
    }

    #[test]
    fn linear_fade_to_silence_reaches_zero() {
        let mut mixer = MixerState::new(1);
        mixer
            .push(MixCommand::Fade {
                channel: None,
                vol_start: 1.0,
                vol_end: 0.0,
                shape: FadeShape::Linear,
                time_pre: -1,
                time_start: 0,
                time_end: 100,
                time_post: -1,
            })
            .unwrap();

        let mut buf = vec![10000i16; 100];
        mixer.apply(&mut buf, 100, 0);
        assert!(buf[0].abs() > buf[99].abs());
        assert!(buf[99].abs() <= 10);
    }

    #[test]
    fn upmix_then_downmix_restores_channel_count() {
        let mut mixer = MixerState::new(4);
        mixer.current_channels = 2;
        mixer.push(MixCommand::Upmix { dst: 1 }).unwrap();
        mixer.push(MixCommand::Downmix { dst: 1 }).unwrap();
        let mut buf = vec![1i16, 2];
        let ch = mixer.apply(&mut buf, 1, 0);
        assert_eq!(ch, 2);
    }
}
