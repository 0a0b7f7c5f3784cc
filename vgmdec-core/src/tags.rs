// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sidecar tag files: a `!tags.m3u`-style text file sitting next to a set of streams, carrying
//! `key=value` pairs that apply either to every file in the directory or to one named file.
//!
//! Format, line by line:
//! - Lines starting with `#` or blank lines are ignored.
//! - A line with no `=` names a target file; every `key=value` line that follows applies only to
//!   that file, until the next target-file line.
//! - `key=value` lines before the first target-file line are global and apply to every file.
//!
//! This is pure string iteration with no effect on decoding and is never touched from the hot
//! path; it exists purely so callers building a track list can show titles/comments.

use crate::errors::Result;
use crate::io::StreamFile;

#[derive(Clone, Debug, PartialEq, Eq)]
struct TagLine {
    key: String,
    value: String,
}

enum Entry {
    Target(String),
    Pair(TagLine),
}

/// Which list [`TagContext::next`] is currently walking.
enum Phase {
    Globals(usize),
    Section(usize),
}

/// A parsed tag sidecar, positioned at a target file via [`TagContext::find`] and then iterated
/// with [`TagContext::next`].
pub struct TagContext {
    entries: Vec<Entry>,
    globals: Vec<TagLine>,
    phase: Phase,
    /// Index into `entries` where the most recent `find` wants `next` to continue after the
    /// globals are exhausted; `entries.len()` (an empty section) until `find` is called.
    pending_section_start: usize,
    current: Option<TagLine>,
}

impl TagContext {
    /// Reads and parses `source` in full. `source` is consumed; sidecar files are small text
    /// files read once, never streamed.
    pub fn init(mut source: Box<dyn StreamFile>) -> Result<Self> {
        let size = source.size().unwrap_or(0) as usize;
        let mut buf = vec![0u8; size];
        source.read_exact_at(&mut buf, 0)?;
        source.close();

        let text = String::from_utf8_lossy(&buf);
        let mut entries = Vec::new();
        let mut globals = Vec::new();
        let mut in_target = false;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((k, v)) => {
                    let pair = TagLine { key: k.trim().to_string(), value: v.trim().to_string() };
                    if in_target {
                        entries.push(Entry::Pair(pair));
                    }
                    else {
                        globals.push(pair);
                    }
                }
                None => {
                    in_target = true;
                    entries.push(Entry::Target(line.to_string()));
                }
            }
        }

        let entries_len = entries.len();
        Ok(TagContext {
            entries,
            globals,
            phase: Phase::Globals(0),
            pending_section_start: entries_len,
            current: None,
        })
    }

    /// Positions the iterator at the section for `target_filename` (matched by exact file name,
    /// case-sensitively, ignoring any directory component). [`TagContext::next`] will first
    /// replay the global pairs, then this file's section, in file order.
    pub fn find(&mut self, target_filename: &str) {
        let name = target_filename.rsplit(['/', '\\']).next().unwrap_or(target_filename);

        let mut start = self.entries.len();
        for (idx, entry) in self.entries.iter().enumerate() {
            if let Entry::Target(t) = entry {
                if t == name {
                    start = idx + 1;
                    break;
                }
            }
        }
        self.phase = Phase::Globals(0);
        self.pending_section_start = start;
        self.current = None;
    }

    /// Advances to the next `(key, value)` pair, returning `true` and leaving it accessible via
    /// [`TagContext::key`]/[`TagContext::value`], or `false` once the section (or global list, if
    /// `find` was never called) is exhausted.
    pub fn next(&mut self) -> bool {
        loop {
            match self.phase {
                Phase::Globals(i) => {
                    if i < self.globals.len() {
                        self.current = Some(self.globals[i].clone());
                        self.phase = Phase::Globals(i + 1);
                        return true;
                    }
                    self.phase = Phase::Section(self.pending_section_start);
                }
                Phase::Section(i) => {
                    if i >= self.entries.len() {
                        self.current = None;
                        return false;
                    }
                    self.phase = Phase::Section(i + 1);
                    match &self.entries[i] {
                        Entry::Pair(pair) => {
                            self.current = Some(pair.clone());
                            return true;
                        }
                        Entry::Target(_) => {
                            self.current = None;
                            return false;
                        }
                    }
                }
            }
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.key.as_str())
    }

    pub fn value(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFile;

    fn ctx(text: &str) -> TagContext {
        let file: Box<dyn StreamFile> =
            Box::new(MemoryFile::new(text.as_bytes().to_vec(), "!tags.m3u"));
        TagContext::init(file).unwrap()
    }

    #[test]
    fn global_pairs_apply_before_any_target() {
        let mut c = ctx("ALBUM=Demo\ntrack1.vgmstream\nTITLE=One\n");
        c.find("track1.vgmstream");
        assert!(c.next());
        assert_eq!(c.key(), Some("ALBUM"));
        assert!(c.next());
        assert_eq!((c.key(), c.value()), (Some("TITLE"), Some("One")));
        assert!(!c.next());
    }

    #[test]
    fn sections_do_not_leak_into_each_other() {
        let mut c = ctx("track1.vgmstream\nTITLE=One\ntrack2.vgmstream\nTITLE=Two\n");
        c.find("track2.vgmstream");
        assert!(c.next());
        assert_eq!(c.value(), Some("Two"));
        assert!(!c.next());
    }

    #[test]
    fn unmatched_filename_yields_only_globals() {
        let mut c = ctx("ALBUM=Demo\ntrack1.vgmstream\nTITLE=One\n");
        c.find("missing.vgmstream");
        assert!(c.next());
        assert_eq!(c.key(), Some("ALBUM"));
        assert!(!c.next());
    }
}
