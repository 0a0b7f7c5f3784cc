// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRI AFS2 audio wave bank: a flat array of subfiles (one per cue ID), addressed by position.
//! Both ACB's embedded memory bank and a standalone `.awb` use this same layout.
//!
//! No AFS2 source survives in the retrieval pack; this is a documented reconstruction of the
//! well-known public layout (magic, header fields, ID table, offset table), the same way
//! `vgmdec-codec-adpcm`'s ADX coefficient formula is. See `DESIGN.md`.

use vgmdec_core::errors::{malformed, Result};

pub struct AwbEntry {
    pub id: u16,
    pub offset: u64,
    pub size: u64,
}

pub struct AwbBank {
    pub entries: Vec<AwbEntry>,
}

fn read_u32(buf: &[u8], off: usize) -> Result<u32> {
    buf.get(off..off + 4).map(|b| u32::from_le_bytes(b.try_into().unwrap())).ok_or(vgmdec_core::errors::VgmError::MalformedHeader("AWB header truncated"))
}

fn read_u16(buf: &[u8], off: usize) -> Result<u16> {
    buf.get(off..off + 2).map(|b| u16::from_le_bytes(b.try_into().unwrap())).ok_or(vgmdec_core::errors::VgmError::MalformedHeader("AWB header truncated"))
}

impl AwbBank {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 0x10 || &buf[0..4] != b"AFS2" {
            return malformed("missing AFS2 magic");
        }
        let version = buf[4];
        let offset_size = buf[5] as usize;
        if offset_size != 2 && offset_size != 4 && offset_size != 8 {
            return malformed("unsupported AWB offset field width");
        }
        let file_count = read_u16(buf, 6)? as usize;
        let align = read_u32(buf, 0x0C)?.max(1) as u64;
        let _ = version;

        let id_table_start = 0x10;
        let id_table_len = file_count * 2;
        let offset_table_start = id_table_start + id_table_len;
        let offset_table_len = (file_count + 1) * offset_size;
        if offset_table_start + offset_table_len > buf.len() {
            return malformed("AWB ID/offset tables run past the end of the bank");
        }

        let mut ids = Vec::with_capacity(file_count);
        for i in 0..file_count {
            ids.push(read_u16(buf, id_table_start + i * 2)?);
        }

        let read_offset = |i: usize| -> Result<u64> {
            let pos = offset_table_start + i * offset_size;
            Ok(match offset_size {
                2 => read_u16(buf, pos)? as u64,
                4 => read_u32(buf, pos)? as u64,
                8 => buf.get(pos..pos + 8).map(|b| u64::from_le_bytes(b.try_into().unwrap())).ok_or(vgmdec_core::errors::VgmError::MalformedHeader("AWB offset truncated"))?,
                _ => unreachable!(),
            })
        };

        let align_up = |v: u64| -> u64 {
            if v % align == 0 { v } else { v + (align - v % align) }
        };

        let mut entries = Vec::with_capacity(file_count);
        for i in 0..file_count {
            let start = align_up(read_offset(i)?);
            let end = align_up(read_offset(i + 1)?);
            if end < start || end as usize > buf.len() {
                return malformed("AWB entry offsets out of range");
            }
            entries.push(AwbEntry { id: ids[i], offset: start, size: end - start });
        }

        Ok(AwbBank { entries })
    }

    pub fn by_position(&self, index: usize) -> Option<&AwbEntry> {
        self.entries.get(index)
    }

    pub fn by_id(&self, id: u16) -> Option<&AwbEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bank() -> Vec<u8> {
        let align = 0x20u32;
        let mut header = Vec::new();
        header.extend_from_slice(b"AFS2");
        header.push(2); // version
        header.push(4); // offset_size
        header.extend_from_slice(&2u16.to_le_bytes()); // file_count
        header.extend_from_slice(&0u16.to_le_bytes()); // padding/reserved
        header.extend_from_slice(&align.to_le_bytes());

        let ids = [0u16, 1u16];
        for id in ids {
            header.extend_from_slice(&id.to_le_bytes());
        }

        let header_and_ids_len = header.len() + 4 * 3; // offsets table length added below
        let base = ((header_and_ids_len as u32 + align - 1) / align) * align;
        let offsets = [base, base + align, base + align * 2];
        for off in offsets {
            header.extend_from_slice(&off.to_le_bytes());
        }

        let mut bank = header;
        bank.resize(offsets[2] as usize, 0xAA);
        bank
    }

    #[test]
    fn parses_two_entries_with_aligned_offsets() {
        let bank = AwbBank::parse(&sample_bank()).unwrap();
        assert_eq!(bank.entries.len(), 2);
        assert_eq!(bank.entries[0].id, 0);
        assert_eq!(bank.entries[1].id, 1);
        assert!(bank.by_id(1).is_some());
        assert!(bank.by_id(9).is_none());
    }

    #[test]
    fn rejects_a_buffer_without_the_afs2_magic() {
        assert!(AwbBank::parse(&[0u8; 32]).is_err());
    }
}
