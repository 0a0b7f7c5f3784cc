// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type shared by every meta, codec, and layout.

use std::fmt;
use std::io;

/// `VgmError` enumerates every failure mode a meta, codec, or layout can report.
///
/// `NotRecognized` is not a "failure" in the usual sense: it tells the orchestrator to try the
/// next meta in the registry. Every other variant is fatal to the meta or codec that produced it.
#[derive(Debug)]
pub enum VgmError {
    /// No meta recognized the source. The caller should try another handler, or report that the
    /// file format is unknown.
    NotRecognized,
    /// A meta matched by extension or magic bytes, but a structural check afterwards failed.
    MalformedHeader(&'static str),
    /// The header was recognized but this build has no decoder for the codec it names.
    UnsupportedCodec(&'static str),
    /// An I/O read returned fewer bytes than required at a point where a short read is fatal.
    ShortRead,
    /// The caller supplied contradictory or out-of-range configuration.
    InvalidConfig(&'static str),
    /// A third-party codec library reported a nonzero status.
    InternalDecoderError(&'static str),
    /// A sidecar key file (e.g. `.fsbkey`) was missing or the wrong size.
    CryptoKeyMissing(&'static str),
    /// Wraps an underlying I/O error from the host file system or transport.
    Io(io::Error),
}

impl fmt::Display for VgmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VgmError::NotRecognized => write!(f, "no meta recognized the stream"),
            VgmError::MalformedHeader(msg) => write!(f, "malformed header: {}", msg),
            VgmError::UnsupportedCodec(name) => write!(f, "unsupported codec: {}", name),
            VgmError::ShortRead => write!(f, "short read past expected end of data"),
            VgmError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            VgmError::InternalDecoderError(msg) => write!(f, "internal decoder error: {}", msg),
            VgmError::CryptoKeyMissing(msg) => write!(f, "crypto key missing: {}", msg),
            VgmError::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for VgmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VgmError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for VgmError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => VgmError::ShortRead,
            _ => VgmError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, VgmError>;

/// Convenience constructor for [`VgmError::MalformedHeader`].
pub fn malformed<T>(msg: &'static str) -> Result<T> {
    Err(VgmError::MalformedHeader(msg))
}

/// Convenience constructor for [`VgmError::UnsupportedCodec`].
pub fn unsupported<T>(name: &'static str) -> Result<T> {
    Err(VgmError::UnsupportedCodec(name))
}

/// Convenience constructor for [`VgmError::InvalidConfig`].
pub fn invalid_config<T>(msg: &'static str) -> Result<T> {
    Err(VgmError::InvalidConfig(msg))
}

/// Convenience constructor for [`VgmError::InternalDecoderError`], used for driver-side
/// invariant violations rather than third-party codec library failures.
pub fn internal<T>(msg: &'static str) -> Result<T> {
    Err(VgmError::InternalDecoderError(msg))
}

/// Builds a bare [`VgmError::InternalDecoderError`], for use with `Option::ok_or_else`.
pub fn internal_err(msg: &'static str) -> VgmError {
    VgmError::InternalDecoderError(msg)
}
