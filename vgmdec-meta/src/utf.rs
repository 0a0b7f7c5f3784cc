// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRI's `@UTF` generic typed row/column table. Every CRI container in this crate (AAX, ACB, CPK)
//! is, underneath, one or more of these tables: a schema of named, typed columns followed by rows
//! that either carry their own value or fall back to a per-column constant or a hardwired zero.

use vgmdec_core::errors::{malformed, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ColumnType {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    Float,
    String,
    Data,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Storage {
    Constant,
    PerRow,
    Zero,
}

struct Column {
    name: String,
    storage: Storage,
    ty: ColumnType,
    /// Byte offset into `data` for `Storage::Constant`'s value, or into each row for `PerRow`.
    offset: usize,
}

/// A value read back from a table cell, typed per the column's declared [`ColumnType`].
#[derive(Clone, Debug, PartialEq)]
pub enum UtfValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    /// `(offset, size)` into the table's data region, absolute within the whole table buffer.
    Data(usize, usize),
}

impl UtfValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            UtfValue::I64(v) => Some(*v as u64),
            UtfValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UtfValue::I64(v) => Some(*v),
            UtfValue::U64(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            UtfValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<(usize, usize)> {
        match self {
            UtfValue::Data(off, len) => Some((*off, *len)),
            _ => None,
        }
    }
}

/// A parsed `@UTF` table: read-only, queried by (row, column name).
pub struct UtfTable {
    table: Vec<u8>,
    columns: Vec<Column>,
    row_width: usize,
    rows_offset: usize,
    rows: usize,
    strings_offset: usize,
    data_offset: usize,
    pub name: String,
}

const FLAG_STORAGE_MASK: u8 = 0xF0;
const FLAG_TYPE_MASK: u8 = 0x0F;

fn column_type(flag: u8) -> Result<ColumnType> {
    Ok(match flag & FLAG_TYPE_MASK {
        0x00 => ColumnType::S8,
        0x01 => ColumnType::U8,
        0x02 => ColumnType::S16,
        0x03 => ColumnType::U16,
        0x04 => ColumnType::S32,
        0x05 => ColumnType::U32,
        0x06 => ColumnType::S64,
        0x07 => ColumnType::U64,
        0x08 => ColumnType::Float,
        0x0A => ColumnType::String,
        0x0B => ColumnType::Data,
        _ => return malformed("unrecognized @UTF column type"),
    })
}

fn column_storage(flag: u8) -> Result<Storage> {
    Ok(match flag & FLAG_STORAGE_MASK {
        0x10 => Storage::Constant,
        0x30 => Storage::PerRow,
        0x50 => Storage::Zero,
        _ => return malformed("unrecognized @UTF column storage class"),
    })
}

fn read_cstring(buf: &[u8], offset: usize) -> String {
    let end = buf[offset..].iter().position(|&b| b == 0).map(|p| offset + p).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[offset..end]).into_owned()
}

fn type_width(ty: ColumnType) -> usize {
    match ty {
        ColumnType::S8 | ColumnType::U8 => 1,
        ColumnType::S16 | ColumnType::U16 => 2,
        ColumnType::S32 | ColumnType::U32 | ColumnType::Float | ColumnType::String => 4,
        ColumnType::S64 | ColumnType::U64 => 8,
        ColumnType::Data => 8,
    }
}

fn read_typed(buf: &[u8], offset: usize, ty: ColumnType, table_data_start: usize) -> Result<UtfValue> {
    if offset + type_width(ty) > buf.len() {
        return malformed("@UTF value offset runs past the end of the table");
    }
    Ok(match ty {
        ColumnType::S8 => UtfValue::I64(buf[offset] as i8 as i64),
        ColumnType::U8 => UtfValue::U64(buf[offset] as u64),
        ColumnType::S16 => UtfValue::I64(i16::from_be_bytes([buf[offset], buf[offset + 1]]) as i64),
        ColumnType::U16 => UtfValue::U64(u16::from_be_bytes([buf[offset], buf[offset + 1]]) as u64),
        ColumnType::S32 => UtfValue::I64(i32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap()) as i64),
        ColumnType::U32 => UtfValue::U64(u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap()) as u64),
        ColumnType::S64 => UtfValue::I64(i64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())),
        ColumnType::U64 => UtfValue::U64(u64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())),
        ColumnType::Float => UtfValue::F64(f32::from_bits(u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())) as f64),
        ColumnType::String => {
            let rel = u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
            UtfValue::Str(read_cstring(buf, table_data_start + rel))
        }
        ColumnType::Data => {
            let rel_off = u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
            let size = u32::from_be_bytes(buf[offset + 4..offset + 8].try_into().unwrap()) as usize;
            let abs = table_data_start + rel_off;
            if abs + size > buf.len() {
                return malformed("@UTF data column offset+size runs past the end of the table");
            }
            UtfValue::Data(abs, size)
        }
    })
}

impl UtfTable {
    /// Parses a buffer starting at the `"@UTF"` magic (the caller strips any outer container
    /// framing first). `table` holds the whole envelope: the 8-byte `"@UTF"` + size header,
    /// followed by the table body the header's offsets are relative to.
    pub fn open(table: Vec<u8>) -> Result<Self> {
        if table.len() < 8 || &table[0..4] != b"@UTF" {
            return malformed("missing @UTF magic");
        }
        let size = u32::from_be_bytes(table[4..8].try_into().unwrap()) as usize;
        if table.len() < 8 + size {
            return malformed("@UTF size header exceeds the supplied buffer");
        }

        let body_start = 8;
        let rd = |rel: usize| -> Result<usize> {
            if body_start + rel + 4 > table.len() {
                return malformed("@UTF header field runs past the end of the table");
            }
            Ok(u32::from_be_bytes(table[body_start + rel..body_start + rel + 4].try_into().unwrap()) as usize)
        };

        let _version = {
            if body_start + 2 > table.len() {
                return malformed("@UTF header too short for version field");
            }
            table[body_start]
        };
        let rows_offset = body_start + rd(4)?;
        let strings_offset = body_start + rd(8)?;
        let data_offset = body_start + rd(12)?;
        let name_offset = rd(16)?;
        if body_start + 18 + 4 > table.len() {
            return malformed("@UTF header too short for schema fields");
        }
        let columns_count = u16::from_be_bytes(table[body_start + 18..body_start + 20].try_into().unwrap()) as usize;
        let row_width = u16::from_be_bytes(table[body_start + 20..body_start + 22].try_into().unwrap()) as usize;
        let rows = u32::from_be_bytes(table[body_start + 22..body_start + 26].try_into().unwrap()) as usize;

        let mut columns = Vec::with_capacity(columns_count);
        let mut schema_pos = body_start + 26;
        let mut per_row_offset = 0usize;

        for _ in 0..columns_count {
            if schema_pos + 5 > table.len() {
                return malformed("@UTF schema runs past the end of the table");
            }
            let flag = table[schema_pos];
            let name_rel = u32::from_be_bytes(table[schema_pos + 1..schema_pos + 5].try_into().unwrap()) as usize;
            schema_pos += 5;

            let storage = column_storage(flag)?;
            let ty = column_type(flag)?;
            let name = read_cstring(&table, strings_offset + name_rel);

            let offset = match storage {
                Storage::Constant => {
                    let off = schema_pos;
                    schema_pos += type_width(ty);
                    off
                }
                Storage::PerRow => {
                    let off = per_row_offset;
                    per_row_offset += type_width(ty);
                    off
                }
                Storage::Zero => 0,
            };

            columns.push(Column { name, storage, ty, offset });
        }

        if rows_offset + rows * row_width > table.len() {
            return malformed("@UTF rows region runs past the end of the table");
        }
        if strings_offset > table.len() || data_offset > table.len() {
            return malformed("@UTF string/data region starts past the end of the table");
        }

        let name = read_cstring(&table, strings_offset + name_offset);

        Ok(UtfTable { table, columns, row_width, rows_offset, rows, strings_offset, data_offset, name })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn query(&self, row: usize, column: &str) -> Result<UtfValue> {
        let col = self.columns.iter().find(|c| c.name == column).ok_or(vgmdec_core::errors::VgmError::MalformedHeader("unknown @UTF column name"))?;
        if row >= self.rows {
            return malformed("@UTF row index out of range");
        }

        match col.storage {
            Storage::Zero => Ok(zero_value(col.ty)),
            Storage::Constant => read_typed(&self.table, col.offset, col.ty, self.data_offset),
            Storage::PerRow => {
                let row_start = self.rows_offset + row * self.row_width;
                read_typed(&self.table, row_start + col.offset, col.ty, self.data_offset)
            }
        }
    }

    pub fn query_u32(&self, row: usize, column: &str) -> Result<u32> {
        Ok(self.query(row, column)?.as_u64().unwrap_or(0) as u32)
    }

    pub fn query_string(&self, row: usize, column: &str) -> Result<String> {
        Ok(self.query(row, column)?.as_str().unwrap_or_default().to_string())
    }

    pub fn query_data(&self, row: usize, column: &str) -> Result<(usize, usize)> {
        self.query(row, column)?.as_data().ok_or_else(|| vgmdec_core::errors::VgmError::MalformedHeader("column is not a data column"))
    }

    /// Borrows the raw table buffer, for callers (like ACB's `AwbFile` column) that need to slice
    /// a `(offset, size)` pair returned by [`Self::query_data`] out themselves.
    pub fn raw(&self) -> &[u8] {
        &self.table
    }
}

fn zero_value(ty: ColumnType) -> UtfValue {
    match ty {
        ColumnType::Float => UtfValue::F64(0.0),
        ColumnType::String => UtfValue::Str(String::new()),
        ColumnType::Data => UtfValue::Data(0, 0),
        ColumnType::S8 | ColumnType::S16 | ColumnType::S32 | ColumnType::S64 => UtfValue::I64(0),
        ColumnType::U8 | ColumnType::U16 | ColumnType::U32 | ColumnType::U64 => UtfValue::U64(0),
    }
}
