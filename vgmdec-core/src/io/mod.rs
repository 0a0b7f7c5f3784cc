// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composable byte-level I/O: [`StreamFile`] and its stackable wrappers, plus endian-aware
//! primitive readers layered on top.

mod reader;
mod stream_file;

pub use reader::StreamReader;
pub use stream_file::{
    subfile, Clamp, Deblock, FakeName, FileStreamFile, IoTransform, MemoryFile, ReverseBitXor,
    StreamFile, Subfile, Transform, Wrap, XxteaBlockFile,
};
