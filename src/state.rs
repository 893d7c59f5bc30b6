#![forbid(unsafe_code)]

//! Per-channel download progress, persisted as a small JSON record.
//!
//! The record is the durable ledger of what has been archived: it only
//! ever advances after a download and its sidecar both landed, so a run
//! killed mid-download re-attempts the same VOD next time.

use crate::error::VodError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub last_vod_id: Option<String>,
    pub last_vod_published_at: Option<DateTime<Utc>>,
}

impl ProcessingState {
    pub fn already_processed(&self, vod_id: &str) -> bool {
        self.last_vod_id.as_deref() == Some(vod_id)
    }
}

/// Missing file means first run; indistinguishable from "never succeeded".
pub fn load_state(path: &Path) -> Result<ProcessingState, VodError> {
    if !path.exists() {
        return Ok(ProcessingState::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| VodError::io(err, format!("reading {}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|err| VodError::Config(format!("parsing state file {}: {err}", path.display())))
}

/// Creates parent directories as needed, then writes via a temp sibling
/// and rename so a crash never leaves a half-written record.
pub fn save_state(path: &Path, state: &ProcessingState) -> Result<(), VodError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|err| VodError::io(err, format!("creating {}", parent.display())))?;
    }
    let payload = serde_json::to_vec_pretty(state)
        .map_err(|err| VodError::Config(format!("serializing state: {err}")))?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload)
        .map_err(|err| VodError::io(err, format!("writing {}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|err| VodError::io(err, format!("renaming into {}", path.display())))?;
    Ok(())
}

/// Picks the state file for a channel.
///
/// Without an override, state lives under `{output_root}/state/`. A
/// single-channel override is taken verbatim. In multi-channel mode the
/// override is per-run, not per-channel, so it is disambiguated: an
/// existing directory (or a path without a `.json` suffix) holds one file
/// per channel, while a file-like override maps siblings into its parent.
pub fn resolve_state_path(
    override_path: Option<&Path>,
    output_root: &Path,
    channel: &str,
    multi: bool,
) -> PathBuf {
    let channel_file = format!("{channel}.json");
    let Some(base) = override_path else {
        return output_root.join("state").join(channel_file);
    };
    if !multi {
        return base.to_path_buf();
    }
    if base.is_dir() {
        return base.join(channel_file);
    }
    if base.is_file() {
        return base.parent().unwrap_or_else(|| Path::new("")).join(channel_file);
    }
    let looks_like_json = base
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if looks_like_json {
        base.parent().unwrap_or_else(|| Path::new("")).join(channel_file)
    } else {
        base.join(channel_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_state() -> ProcessingState {
        ProcessingState {
            last_vod_id: Some("101".to_string()),
            last_vod_published_at: Some(Utc.with_ymd_and_hms(2024, 1, 10, 5, 0, 0).unwrap()),
        }
    }

    #[test]
    fn load_missing_file_is_zero_state() {
        let dir = tempdir().unwrap();
        let state = load_state(&dir.path().join("absent.json")).unwrap();
        assert_eq!(state, ProcessingState::default());
        assert!(!state.already_processed("100"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("foo.json");
        let state = sample_state();
        save_state(&path, &state).unwrap();
        assert_eq!(load_state(&path).unwrap(), state);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foo.json");
        save_state(&path, &ProcessingState::default()).unwrap();
        save_state(&path, &sample_state()).unwrap();
        let state = load_state(&path).unwrap();
        assert!(state.already_processed("101"));
    }

    #[test]
    fn corrupt_state_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_state(&path).unwrap_err();
        assert!(matches!(err, VodError::Config(_)));
    }

    #[test]
    fn default_state_path_lives_under_output_root() {
        let path = resolve_state_path(None, Path::new("/library"), "foo", true);
        assert_eq!(path, PathBuf::from("/library/state/foo.json"));
    }

    #[test]
    fn single_channel_override_is_verbatim() {
        let path = resolve_state_path(
            Some(Path::new("/var/state/custom.json")),
            Path::new("/library"),
            "foo",
            false,
        );
        assert_eq!(path, PathBuf::from("/var/state/custom.json"));
    }

    #[test]
    fn multi_channel_directory_override_gets_channel_file() {
        let dir = tempdir().unwrap();
        let path = resolve_state_path(Some(dir.path()), Path::new("/library"), "foo", true);
        assert_eq!(path, dir.path().join("foo.json"));
    }

    #[test]
    fn multi_channel_file_override_uses_parent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("state.json");
        fs::write(&file, "{}").unwrap();
        let path = resolve_state_path(Some(&file), Path::new("/library"), "foo", true);
        assert_eq!(path, dir.path().join("foo.json"));
    }

    #[test]
    fn multi_channel_missing_json_suffix_uses_parent() {
        let path = resolve_state_path(
            Some(Path::new("/var/state/run.json")),
            Path::new("/library"),
            "bar",
            true,
        );
        assert_eq!(path, PathBuf::from("/var/state/bar.json"));
    }

    #[test]
    fn multi_channel_missing_plain_path_is_directory() {
        let path = resolve_state_path(
            Some(Path::new("/var/state")),
            Path::new("/library"),
            "bar",
            true,
        );
        assert_eq!(path, PathBuf::from("/var/state/bar.json"));
    }
}
