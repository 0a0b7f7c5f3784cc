// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! `vgmdec-core` defines the shared vocabulary every meta and codec crate builds on: the
//! [`io::StreamFile`] abstraction encoded data is read through, the [`codecs`] trait pair a
//! decoder implements, the [`stream::StreamDescriptor`] a meta hands back, and the
//! [`playback::render`] driver that turns a descriptor into PCM16.
//!
//! A meta crate's only job is to recognize a container and build a [`stream::StreamDescriptor`].
//! Everything downstream of that — looping, fading, mixing, channel traversal — lives here so
//! every format gets the same playback semantics for free.

pub mod codecs;
pub mod config;
pub mod errors;
pub mod io;
pub mod layout;
pub mod mixer;
pub mod playback;
pub mod stream;
pub mod tags;

pub use errors::{Result, VgmError};
pub use stream::StreamDescriptor;

/// One registered container/subsong format, as reported by [`Meta::info`].
pub struct FormatInfo {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

/// Implemented by every format-specific crate. The orchestrator in the `vgmdec` facade crate
/// tries metas in priority order and takes the first one that returns `Ok(Some(_))`.
pub trait Meta: Send + Sync {
    fn info(&self) -> FormatInfo;

    /// Attempts to recognize and fully parse `source` as this meta's format. Returns `Ok(None)`
    /// (not `Err`) when the source simply isn't this format, reserving `Err` for "this is
    /// plausibly our format but it's corrupt". `subsong` selects a 1-based subsong index when the
    /// container holds more than one stream; `None` means "the first/only one".
    fn try_open(
        &self,
        source: Box<dyn io::StreamFile>,
        subsong: Option<u32>,
        cfg: &config::PlaybackConfig,
    ) -> Result<Option<stream::StreamDescriptor>>;
}
