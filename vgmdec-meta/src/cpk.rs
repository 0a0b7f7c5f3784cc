// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CPK used as an audio bank: a CRI `@UTF` `CpkItocInfo` (split into a small-file "L" table and a
//! big-file "H" table) describing the concatenated, alignment-padded content region. Subsong `n`
//! is the `n`th file by on-disk order.
//!
//! Per-file dispatch sniffs the first bytes: `"HCA\0"` (top bit of each byte possibly XORed) goes
//! to HCA, `"CWAV"` to BCWAV, and a big-endian `0x8000` to ADX. This crate only implements the ADX
//! branch — see `DESIGN.md` for why HCA/BCWAV are left as a documented gap rather than a stub.

use vgmdec_core::config::PlaybackConfig;
use vgmdec_core::errors::{malformed, unsupported, Result};
use vgmdec_core::io::{subfile, StreamFile};
use vgmdec_core::stream::StreamDescriptor;
use vgmdec_core::{FormatInfo, Meta};

use crate::adx::AdxMeta;
use crate::utf::UtfTable;

#[derive(Copy, Clone)]
enum SniffedType {
    Hca,
    Cwav,
    Adx,
}

fn sniff(bytes: &[u8]) -> Option<SniffedType> {
    if bytes.len() < 4 {
        return None;
    }
    let unmasked = [bytes[0] & 0x7F, bytes[1] & 0x7F, bytes[2] & 0x7F, bytes[3] & 0x7F];
    if &unmasked == b"HCA\0" {
        return Some(SniffedType::Hca);
    }
    if &bytes[0..4] == b"CWAV" {
        return Some(SniffedType::Cwav);
    }
    if u16::from_be_bytes([bytes[0], bytes[1]]) == 0x8000 {
        return Some(SniffedType::Adx);
    }
    None
}

pub struct CpkMeta;

impl Meta for CpkMeta {
    fn info(&self) -> FormatInfo {
        FormatInfo { name: "cpk", extensions: &["awb", "cpk"] }
    }

    fn try_open(
        &self,
        mut source: Box<dyn StreamFile>,
        subsong: Option<u32>,
        cfg: &PlaybackConfig,
    ) -> Result<Option<StreamDescriptor>> {
        let mut magic = [0u8; 0x10];
        if source.read(&mut magic, 0)? < 0x10 || &magic[0..4] != b"CPK " {
            return Ok(None);
        }

        let size = source.size().ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("CPK source has no known size"))?;
        let mut buf = vec![0u8; size as usize];
        source.read_exact_at(&mut buf, 0)?;
        if &buf[0x10..0x14] != b"@UTF" {
            return Ok(None);
        }

        let header = match UtfTable::open(buf[0x10..].to_vec()) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        if header.name != "CpkHeader" || header.row_count() != 1 {
            return Ok(None);
        }

        let tvers = header.query_string(0, "Tvers")?;
        if !tvers.starts_with("awb") {
            return Ok(None);
        }
        let files = header.query_u32(0, "Files")?;
        let content_offset = header.query(0, "ContentOffset")?.as_u64().unwrap_or(0);
        let itoc_offset = header.query(0, "ItocOffset")?.as_u64().unwrap_or(0);
        let align = header.query_u32(0, "Align")?.max(1) as u64;
        if files == 0 {
            return malformed("CPK declares zero files");
        }

        let itoc_table_start = (0x10 + itoc_offset) as usize;
        let itoc = UtfTable::open(buf[itoc_table_start..].to_vec())?;
        if itoc.name != "CpkItocInfo" || itoc.row_count() != 1 {
            return malformed("CPK Itoc header is malformed");
        }

        let files_l = itoc.query_u32(0, "FilesL")?;
        let files_h = itoc.query_u32(0, "FilesH")?;
        if files_l + files_h != files {
            return malformed("CPK small/big file counts do not add up to Files");
        }

        let (data_l_off, data_l_size) = itoc.query_data(0, "DataL")?;
        let (data_h_off, data_h_size) = itoc.query_data(0, "DataH")?;
        let _ = (data_l_size, data_h_size);

        let mut sizes = vec![0u64; files as usize];

        let data_l = UtfTable::open(buf[itoc_table_start + data_l_off..].to_vec())?;
        if data_l.name != "CpkItocL" || data_l.row_count() != files_l as usize {
            return malformed("CPK CpkItocL table is malformed");
        }
        for i in 0..files_l as usize {
            let id = data_l.query_u32(i, "ID")? as usize;
            let file_size = data_l.query_u32(i, "FileSize")?;
            if id >= files as usize || sizes[id] != 0 {
                return malformed("CPK CpkItocL entry has an out-of-range or duplicate ID");
            }
            sizes[id] = file_size as u64;
        }

        let data_h = UtfTable::open(buf[itoc_table_start + data_h_off..].to_vec())?;
        if data_h.name != "CpkItocH" || data_h.row_count() != files_h as usize {
            return malformed("CPK CpkItocH table is malformed");
        }
        for i in 0..files_h as usize {
            let id = data_h.query_u32(i, "ID")? as usize;
            let file_size = data_h.query_u32(i, "FileSize")?;
            if id >= files as usize || sizes[id] != 0 {
                return malformed("CPK CpkItocH entry has an out-of-range or duplicate ID");
            }
            sizes[id] = file_size as u64;
        }

        let total_subsongs = files;
        let target = subsong.unwrap_or(1);
        if target == 0 || target > total_subsongs {
            return malformed("CPK subsong index out of range");
        }

        let mut offset = content_offset;
        let mut subfile_offset = None;
        let mut subfile_size = 0u64;
        for (i, &sz) in sizes.iter().enumerate() {
            if i as u32 + 1 == target {
                subfile_offset = Some(offset);
                subfile_size = sz;
                break;
            }
            offset += sz;
            if align > 1 && offset % align != 0 {
                offset += align - (offset % align);
            }
        }

        let subfile_offset = match subfile_offset {
            Some(o) => o,
            None => return malformed("failed to locate the target subsong's content offset"),
        };

        if subfile_offset as usize + 4 > buf.len() {
            return malformed("CPK content offset runs past the end of the file");
        }
        let probe = &buf[subfile_offset as usize..];
        let kind = sniff(probe).ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("unrecognized CPK subfile signature"))?;

        source.close();

        match kind {
            SniffedType::Adx => {
                let whole = vgmdec_core::io::MemoryFile::new(buf, "embedded.cpk");
                let inner = subfile(whole, subfile_offset, subfile_size, "adx");
                let descriptor = AdxMeta.try_open(Box::new(inner), None, cfg)?;
                match descriptor {
                    Some(mut d) => {
                        d.subsong_index = target;
                        d.subsong_count = total_subsongs;
                        Ok(Some(d))
                    }
                    None => malformed("CPK sniffed ADX but the embedded stream failed to parse"),
                }
            }
            SniffedType::Hca => unsupported("hca"),
            SniffedType::Cwav => unsupported("bcwav"),
        }
    }
}
