// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Circus Inc.'s VQ-like XPCM codec: a custom LZ or deflate-compressed bitstream carrying
//! fixed-point transform coefficients, decoded through a re-interleave/scale/transform/convert
//! pipeline into interleaved PCM.

mod codec;
mod lzxpcm;
mod pipeline;
mod tables;

pub use codec::{CircusVqCodec, XpcmCodec};
