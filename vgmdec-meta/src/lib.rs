// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Container format recognizers: the CRI `@UTF` table reader every CRI-family meta shares, the
//! format [`vgmdec_core::Meta`] implementations built on top of it (AAX, ACB, AWB-as-CPK,
//! standalone ADX), and a set of otherwise-unrelated single-format containers (MTAF, IVB, VSV,
//! XAVS, PS2 ENTH, SSCF, BGW, SPW) that each illustrate a different wrinkle in the data model:
//! block layouts, subsong selection, magic-less sniffing, chunked audio/video interleaving, and
//! encrypted payloads.

pub mod aax;
pub mod acb;
pub mod adx;
pub mod awb;
pub mod bgw;
pub mod cpk;
pub mod ivb;
pub mod mtaf;
#[cfg(feature = "vorbis")]
pub mod ogg_vorbis;
pub mod ps2_enth;
pub mod sscf;
pub mod utf;
pub mod vsv;
pub mod xavs;

pub use aax::AaxMeta;
pub use acb::AcbMeta;
pub use adx::AdxMeta;
pub use bgw::{BgwMeta, SpwMeta};
pub use cpk::CpkMeta;
pub use ivb::IvbMeta;
pub use mtaf::{MtafBlockLayout, MtafMeta};
#[cfg(feature = "vorbis")]
pub use ogg_vorbis::OggVorbisMeta;
pub use ps2_enth::Ps2EnthMeta;
pub use sscf::SscfMeta;
pub use utf::UtfTable;
pub use vsv::VsvMeta;
pub use xavs::XavsMeta;

/// Every format meta this crate provides, in the order an orchestrator should try them: most
/// structurally distinctive magic first, since `try_open` probes a few bytes per candidate before
/// falling through to the next. PS2 ENTH's three 4-byte magics, SSCF's own magic, BGW/SPW's 8-12
/// byte magics, and `ogg_vorbis`'s `"OggS"`/`"RPGMV"`/NIS magics are a real sniff despite the
/// bare/overloaded extensions; IVB and VSV have the weakest sniffs of all (no literal magic), so
/// they run last.
pub fn all_metas() -> Vec<Box<dyn vgmdec_core::Meta>> {
    let mut metas: Vec<Box<dyn vgmdec_core::Meta>> = vec![
        Box::new(AdxMeta),
        Box::new(AaxMeta),
        Box::new(CpkMeta),
        Box::new(AcbMeta),
        Box::new(MtafMeta),
        Box::new(XavsMeta),
        Box::new(SscfMeta),
        Box::new(BgwMeta),
        Box::new(SpwMeta),
        Box::new(Ps2EnthMeta),
    ];
    #[cfg(feature = "vorbis")]
    metas.push(Box::new(OggVorbisMeta));
    metas.push(Box::new(IvbMeta));
    metas.push(Box::new(VsvMeta));
    metas
}
