// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display-title construction for [`crate::VgmStream::get_title`]: prefer a format's own embedded
//! stream name, fall back to the filename, and optionally tidy either one up.

/// Controls how [`crate::VgmStream::get_title`] builds its result.
#[derive(Clone, Debug, Default)]
pub struct TitleConfig {
    /// Always fall back to `filename` even when the format has an embedded stream name.
    pub force_title: bool,
    /// Append ` (subsong/total)` when the stream has more than one subsong.
    pub subsong_range: bool,
    /// Strip a trailing `.ext` from the filename fallback.
    pub remove_extension: bool,
    /// Strip everything up to and including the last path separator, dropping any archive/folder
    /// prefix the filename carries.
    pub remove_archive: bool,
    /// The filename to fall back to (and to derive a title from) when there's no embedded stream
    /// name, or when `force_title` is set.
    pub filename: String,
}

pub(crate) fn build(cfg: &TitleConfig, stream_name: &str, subsong_index: u32, subsong_count: u32) -> String {
    let mut title = if !cfg.force_title && !stream_name.is_empty() {
        stream_name.to_string()
    }
    else {
        from_filename(cfg)
    };

    if cfg.subsong_range && subsong_count > 1 {
        title.push_str(&format!(" ({}/{})", subsong_index, subsong_count));
    }

    title
}

fn from_filename(cfg: &TitleConfig) -> String {
    let mut name = cfg.filename.as_str();

    if cfg.remove_archive {
        name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    }

    if cfg.remove_extension {
        if let Some((stem, _ext)) = name.rsplit_once('.') {
            name = stem;
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_the_embedded_stream_name_by_default() {
        let cfg = TitleConfig { filename: "disk/song.adx".to_string(), ..Default::default() };
        assert_eq!(build(&cfg, "Boss Theme", 1, 1), "Boss Theme");
    }

    #[test]
    fn force_title_always_uses_the_filename() {
        let cfg = TitleConfig { filename: "disk/song.adx".to_string(), force_title: true, ..Default::default() };
        assert_eq!(build(&cfg, "Boss Theme", 1, 1), "disk/song.adx");
    }

    #[test]
    fn empty_stream_name_falls_back_to_filename_even_without_force_title() {
        let cfg = TitleConfig { filename: "song.adx".to_string(), ..Default::default() };
        assert_eq!(build(&cfg, "", 1, 1), "song.adx");
    }

    #[test]
    fn remove_archive_and_extension_strip_path_and_suffix() {
        let cfg = TitleConfig {
            filename: "bgm.cpk/boss_theme.adx".to_string(),
            force_title: true,
            remove_archive: true,
            remove_extension: true,
            ..Default::default()
        };
        assert_eq!(build(&cfg, "", 1, 1), "boss_theme");
    }

    #[test]
    fn subsong_range_appends_index_over_count() {
        let cfg = TitleConfig { filename: "bank.acb".to_string(), subsong_range: true, ..Default::default() };
        assert_eq!(build(&cfg, "Voice A", 3, 12), "Voice A (3/12)");
    }

    #[test]
    fn subsong_range_is_silent_for_a_single_subsong_stream() {
        let cfg = TitleConfig { filename: "song.adx".to_string(), subsong_range: true, ..Default::default() };
        assert_eq!(build(&cfg, "Theme", 1, 1), "Theme");
    }
}
