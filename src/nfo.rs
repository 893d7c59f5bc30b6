#![forbid(unsafe_code)]

//! Episode sidecar writer. Media library scanners (Kodi, Jellyfin) read a
//! small `episodedetails` XML next to the video file; the schema here is
//! fixed and intentionally minimal.

use crate::error::VodError;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

/// Escapes the five XML-significant characters for element content.
pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Renders the full sidecar document.
pub fn episode_nfo(title: &str, plot: &str, aired: NaiveDate, season: u32, episode: u32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n\
         <episodedetails>\n\
         \x20 <title>{}</title>\n\
         \x20 <plot>{}</plot>\n\
         \x20 <aired>{}</aired>\n\
         \x20 <season>{}</season>\n\
         \x20 <episode>{}</episode>\n\
         </episodedetails>\n",
        xml_escape(title),
        xml_escape(plot),
        aired.format("%Y-%m-%d"),
        season,
        episode
    )
}

/// Writes the sidecar via a temp sibling and rename. The file is cosmetic
/// rather than durable state, so "no file or a whole file" is enough of a
/// guarantee.
pub fn write_nfo(
    path: &Path,
    title: &str,
    plot: &str,
    aired: NaiveDate,
    season: u32,
    episode: u32,
) -> Result<(), VodError> {
    let document = episode_nfo(title, plot, aired, season, episode);
    let tmp_path = path.with_extension("nfo.tmp");
    fs::write(&tmp_path, document)
        .map_err(|err| VodError::io(err, format!("writing {}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|err| VodError::io(err, format!("renaming into {}", path.display())))?;
    Ok(())
}
