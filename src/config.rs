#![forbid(unsafe_code)]

//! Configuration loading for the vodkeep binaries.
//!
//! Values come from three places with a fixed precedence: explicit CLI
//! overrides win over process environment variables, which win over the
//! `.env` file next to the working directory. Everything is resolved once
//! at startup into an immutable [`Settings`] value so the orchestrator
//! never touches ambient state.

use crate::error::VodError;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";

pub const CHANNELS_VAR: &str = "TWITCH_CHANNELS";
pub const SINGLE_CHANNEL_VAR: &str = "TWITCH_CHANNEL";
pub const SHOW_NAMES_VAR: &str = "SHOW_NAMES";
pub const CLIENT_ID_VAR: &str = "TWITCH_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "TWITCH_CLIENT_SECRET";
pub const USER_TOKEN_VAR: &str = "TWITCH_USER_OAUTH_TOKEN";
pub const COOKIES_PATH_VAR: &str = "COOKIES_PATH";
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIR";
pub const STATE_PATH_VAR: &str = "STATE_PATH";
pub const EXTRA_ARGS_VAR: &str = "YTDLP_EXTRA_ARGS";
pub const SCOPES_VAR: &str = "TWITCH_SCOPES";
pub const TOKEN_PATH_VAR: &str = "TOKEN_PATH";

/// Everything `save_vods` needs for a run, resolved up front.
#[derive(Debug, Clone)]
pub struct Settings {
    pub channels: Vec<String>,
    pub show_names: Vec<String>,
    pub client_id: String,
    pub client_secret: String,
    pub user_token: Option<String>,
    pub cookies_path: PathBuf,
    pub output_dir: PathBuf,
    pub state_path: Option<PathBuf>,
    pub ytdlp_extra_args: Vec<String>,
}

impl Settings {
    /// Multi-channel runs change both the state-file layout and the
    /// filename stem convention.
    pub fn is_multi(&self) -> bool {
        self.channels.len() > 1
    }

    /// Show name for the channel at `index`, falling back to the channel
    /// login when the aligned entry is missing or blank.
    pub fn show_name_for(&self, index: usize) -> String {
        resolve_show_name(&self.channels[index], index, &self.show_names)
    }
}

/// CLI-level overrides; `None` means "defer to env/file".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: Overrides) -> Result<Settings, VodError> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings, VodError> {
    build_settings_with_overrides(file_vars, env_lookup, Overrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: Overrides,
) -> Result<Settings, VodError> {
    let channels_value = lookup_value(CHANNELS_VAR, file_vars, &env_lookup)
        .or_else(|| lookup_value(SINGLE_CHANNEL_VAR, file_vars, &env_lookup))
        .ok_or_else(|| {
            VodError::Config(format!("{CHANNELS_VAR} or {SINGLE_CHANNEL_VAR} not set"))
        })?;
    let channels = normalize_channels(&channels_value);
    if channels.is_empty() {
        return Err(VodError::Config("no valid channels provided".into()));
    }

    let show_names = lookup_value(SHOW_NAMES_VAR, file_vars, &env_lookup)
        .map(|value| normalize_show_names(&value))
        .unwrap_or_default();

    let client_id = require(CLIENT_ID_VAR, file_vars, &env_lookup)?;
    let client_secret = require(CLIENT_SECRET_VAR, file_vars, &env_lookup)?;
    let user_token = lookup_value(USER_TOKEN_VAR, file_vars, &env_lookup);
    let cookies_path = PathBuf::from(require(COOKIES_PATH_VAR, file_vars, &env_lookup)?);

    let output_dir = overrides
        .output_dir
        .or_else(|| lookup_value(OUTPUT_DIR_VAR, file_vars, &env_lookup).map(PathBuf::from))
        .ok_or_else(|| VodError::Config(format!("{OUTPUT_DIR_VAR} not set")))?;
    let state_path = overrides
        .state_path
        .or_else(|| lookup_value(STATE_PATH_VAR, file_vars, &env_lookup).map(PathBuf::from));

    let ytdlp_extra_args = lookup_value(EXTRA_ARGS_VAR, file_vars, &env_lookup)
        .map(|value| {
            value
                .split_whitespace()
                .map(|arg| arg.to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(Settings {
        channels,
        show_names,
        client_id,
        client_secret,
        user_token,
        cookies_path,
        output_dir,
        state_path,
        ytdlp_extra_args,
    })
}

fn require(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, VodError> {
    lookup_value(key, file_vars, env_lookup)
        .ok_or_else(|| VodError::Config(format!("{key} not set")))
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

/// Splits a comma-separated channel list, trims entries, and lowercases
/// logins (Twitch logins are case-insensitive; state files key on the
/// lowercase form).
pub fn normalize_channels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_lowercase())
        .collect()
}

/// Show names keep their case and may be blank; blank entries fall back to
/// the channel login at lookup time, so empty slots are preserved here to
/// keep positional alignment intact.
pub fn normalize_show_names(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value
        .split(',')
        .map(|entry| entry.trim().to_string())
        .collect()
}

pub fn resolve_show_name(channel: &str, index: usize, show_names: &[String]) -> String {
    if let Some(candidate) = show_names.get(index) {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    channel.to_string()
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, VodError> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content = fs::read_to_string(path)
        .map_err(|err| VodError::io(err, format!("reading {}", path.display())))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// Updates or appends a single env var inside the target file while
/// preserving unrelated lines and comments. Used by `get_token --write-env`
/// to persist a freshly obtained user token.
pub fn upsert_env_value(path: &Path, key: &str, value: &str) -> Result<(), VodError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|err| VodError::io(err, format!("creating {}", parent.display())))?;
    }

    let raw = fs::read_to_string(path).unwrap_or_default();
    let mut lines = Vec::new();
    let mut updated = false;
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");

    for line in raw.lines() {
        let trimmed = line.trim_start();
        let indent_len = line.len() - trimmed.len();
        let indent = &line[..indent_len];
        let (prefix, rest) = if let Some(stripped) = trimmed.strip_prefix("export ") {
            ("export ", stripped)
        } else {
            ("", trimmed)
        };
        let Some((candidate, _)) = rest.split_once('=') else {
            lines.push(line.to_string());
            continue;
        };
        if candidate.trim() == key {
            lines.push(format!("{indent}{prefix}{key}=\"{escaped}\""));
            updated = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !updated {
        lines.push(format!("{key}=\"{escaped}\""));
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, lines.join("\n") + "\n")
        .map_err(|err| VodError::io(err, format!("writing {}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|err| VodError::io(err, format!("renaming into {}", path.display())))?;
    Ok(())
}
