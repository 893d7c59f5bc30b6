#![forbid(unsafe_code)]

//! Media-library naming rules: path sanitization, the month-keyed season
//! scheme, and the output layout for downloaded VODs.
//!
//! Everything here is pure. Callers convert the VOD publish instant to
//! local wall-clock time first and create directories themselves, so the
//! resolver stays deterministic under test.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

const MAX_COMPONENT_LEN: usize = 180;
const EMPTY_FALLBACK: &str = "untitled";

/// Filename stem convention for a run.
///
/// `TimeStem` is the canonical convention and the only one used in
/// multi-channel runs, where short stems keep paths from growing past
/// filesystem limits. `TitleStem` appends the sanitized broadcast title
/// for single-channel libraries where readable filenames matter more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingStrategy {
    TimeStem,
    TitleStem,
}

/// Replaces the filesystem-hostile character class `\ / : * ? " < > |`
/// with hyphens (runs collapse to one), collapses whitespace runs to a
/// single space, trims, and caps the result at 180 characters. A result
/// with no substance left becomes `untitled`.
pub fn sanitize_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_hyphen = false;
    let mut last_space = false;
    for ch in value.chars() {
        if matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            if !last_hyphen {
                out.push('-');
                last_hyphen = true;
            }
            last_space = false;
        } else if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
            last_hyphen = false;
        } else {
            out.push(ch);
            last_hyphen = false;
            last_space = false;
        }
    }

    let trimmed = out.trim();
    if trimmed.chars().all(|ch| ch == '-' || ch == ' ') {
        return EMPTY_FALLBACK.to_string();
    }
    trimmed.chars().take(MAX_COMPONENT_LEN).collect()
}

/// Seasons are keyed by calendar month of the publish date, so a library
/// holds at most twelve seasons per year and episode numbers reset monthly.
pub fn season_label(date: NaiveDate) -> String {
    format!("Season {:02}", date.month())
}

pub fn season_number(date: NaiveDate) -> u32 {
    date.month()
}

/// Episode number is the day of month, giving at most one episode slot per
/// calendar day.
pub fn episode_number(date: NaiveDate) -> u32 {
    date.day()
}

/// Builds the filename stem from the local publish time, e.g.
/// `Mar-15-20-30`, optionally extended with the sanitized title.
pub fn file_stem(strategy: NamingStrategy, local_ts: NaiveDateTime, title: &str) -> String {
    let time_stem = local_ts.format("%b-%d-%H-%M").to_string();
    match strategy {
        NamingStrategy::TimeStem => time_stem,
        NamingStrategy::TitleStem => {
            let stem = format!("{} {}", time_stem, sanitize_component(title));
            stem.chars().take(MAX_COMPONENT_LEN).collect()
        }
    }
}

/// Fully derived destination for one VOD. Recomputed fresh every run from
/// the publish timestamp; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    pub season_dir: PathBuf,
    pub stem: String,
    pub season: u32,
    pub episode: u32,
    pub aired: NaiveDate,
}

impl OutputLocation {
    pub fn video_path(&self) -> PathBuf {
        self.season_dir.join(format!("{}.mp4", self.stem))
    }

    pub fn nfo_path(&self) -> PathBuf {
        self.season_dir.join(format!("{}.nfo", self.stem))
    }
}

/// Derives `{root}/{channel}/{show name}/Season {MM}/{stem}` from the
/// local publish time. Every user-supplied segment is sanitized.
pub fn resolve_output(
    root: &Path,
    channel: &str,
    show_name: &str,
    local_ts: NaiveDateTime,
    title: &str,
    strategy: NamingStrategy,
) -> OutputLocation {
    let date = local_ts.date();
    let season_dir = root
        .join(sanitize_component(channel))
        .join(sanitize_component(show_name))
        .join(season_label(date));
    OutputLocation {
        season_dir,
        stem: file_stem(strategy, local_ts, title),
        season: season_number(date),
        episode: episode_number(date),
        aired: date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn sanitize_rewrites_illegal_characters() {
        assert_eq!(sanitize_component("a:b?c/d"), "a-b-c-d");
        assert_eq!(sanitize_component("run??of*illegal"), "run-of-illegal");
        assert_eq!(sanitize_component("  spaced \t out  "), "spaced out");
    }

    #[test]
    fn sanitize_all_illegal_falls_back_to_untitled() {
        assert_eq!(sanitize_component("???"), "untitled");
        assert_eq!(sanitize_component("  \\ / : * "), "untitled");
        assert_eq!(sanitize_component(""), "untitled");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_component(&long).chars().count(), 180);
    }

    #[test]
    fn season_and_episode_follow_publish_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(season_label(date), "Season 03");
        assert_eq!(season_number(date), 3);
        assert_eq!(episode_number(date), 15);
    }

    #[test]
    fn time_stem_is_deterministic() {
        let ts = local(2024, 3, 15, 20, 30);
        assert_eq!(file_stem(NamingStrategy::TimeStem, ts, "Weekly Update #5"), "Mar-15-20-30");
        assert_eq!(file_stem(NamingStrategy::TimeStem, ts, "Weekly Update #5"), "Mar-15-20-30");
    }

    #[test]
    fn title_stem_appends_sanitized_title() {
        let ts = local(2024, 3, 15, 20, 30);
        assert_eq!(
            file_stem(NamingStrategy::TitleStem, ts, "Weekly: Update?"),
            "Mar-15-20-30 Weekly- Update-"
        );
    }

    #[test]
    fn title_stem_recaps_length() {
        let ts = local(2024, 3, 15, 20, 30);
        let stem = file_stem(NamingStrategy::TitleStem, ts, &"y".repeat(400));
        assert_eq!(stem.chars().count(), 180);
        assert!(stem.starts_with("Mar-15-20-30 "));
    }

    #[test]
    fn resolve_output_builds_layout() {
        let loc = resolve_output(
            Path::new("/library"),
            "foo",
            "Foo Show",
            local(2024, 1, 10, 5, 0),
            "Ep A",
            NamingStrategy::TimeStem,
        );
        assert_eq!(
            loc.season_dir,
            PathBuf::from("/library/foo/Foo Show/Season 01")
        );
        assert_eq!(loc.season, 1);
        assert_eq!(loc.episode, 10);
        assert_eq!(
            loc.video_path(),
            PathBuf::from("/library/foo/Foo Show/Season 01/Jan-10-05-00.mp4")
        );
        assert_eq!(
            loc.nfo_path(),
            PathBuf::from("/library/foo/Foo Show/Season 01/Jan-10-05-00.nfo")
        );
    }

    #[test]
    fn resolve_output_sanitizes_every_segment() {
        let loc = resolve_output(
            Path::new("/library"),
            "bad:channel",
            "Show/Name?",
            local(2024, 12, 1, 0, 0),
            "t",
            NamingStrategy::TimeStem,
        );
        assert_eq!(
            loc.season_dir,
            PathBuf::from("/library/bad-channel/Show-Name-/Season 12")
        );
    }
}
