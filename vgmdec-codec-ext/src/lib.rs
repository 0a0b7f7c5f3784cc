// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codecs that either wrap a third-party decoder or, for ATRAC3plus/ATRAC9/CELT-FSB/XMA, reach
//! one through a pluggable backend trait because no safe Rust crate exists to depend on and this
//! workspace forbids `unsafe_code`. Microtalk/UTK and the Interplay ACM streaming surface live
//! here too even though Microtalk is natively implemented: both are "legacy speech codec" kin to
//! the rest of the crate's contents rather than belonging with the PCM/ADPCM families.

pub mod acm;
pub mod atrac3plus;
pub mod atrac9;
pub mod celt_fsb;
pub mod microtalk;
pub mod xma;

#[cfg(feature = "opus")]
pub mod opus;

#[cfg(feature = "vorbis")]
pub mod vorbis;

pub use acm::{AcmBackend, AcmInfo, AcmStream, SampleWidth};
pub use atrac3plus::{Atrac3PlusBackend, Atrac3PlusCodec};
pub use atrac9::{Atrac9Backend, Atrac9Codec, Atrac9Info};
pub use celt_fsb::{CeltFsbBackend, CeltFsbCodec};
pub use microtalk::{MicrotalkCodec, UtkKind};
pub use xma::{reinterleave_eaxma_block, XmaBackend, XmaCodec};

#[cfg(feature = "opus")]
pub use opus::{wwise_packet_sample_count, OpusCodec};

#[cfg(feature = "vorbis")]
pub use vorbis::{scan_loop_comments, wants_channel_reorder_disabled, LoopPoints, VorbisCodec, VorbisContainer};
