// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relic DCT: the mono-per-channel transform codec used by Homeworld-era Relic Entertainment
//! titles. Each channel is an independent bitstream of fixed-size frames; a frame's bits unpack
//! into two quantized half-spectra, which dequantize and inverse-transform into 512 time-domain
//! samples via a 50%-overlap-add DCT-IV built from a mixed-radix FFT.

mod bitreader;
mod codec;
mod complex;
mod dequant;
mod fft;
mod idct;
mod unpack;

pub use codec::{RelicDctCodec, SAMPLES_PER_FRAME};
