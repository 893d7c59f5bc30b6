#![forbid(unsafe_code)]

//! Standalone helper that runs the OAuth2 device-code flow and saves the
//! resulting user token. Run it once interactively; `save_vods` then picks
//! the token up from `TWITCH_USER_OAUTH_TOKEN`.

use anyhow::{Context, Result, bail};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use vodkeep_tools::config::{
    CLIENT_ID_VAR, DEFAULT_ENV_PATH, SCOPES_VAR, TOKEN_PATH_VAR, USER_TOKEN_VAR, read_env_file,
    upsert_env_value,
};
use vodkeep_tools::security::ensure_not_root;
use vodkeep_tools::twitch::{TokenResponse, poll_device_token, request_device_code};

const DEFAULT_TOKEN_PATH: &str = "twitch_token.json";

#[derive(Debug, Clone, Default)]
struct TokenArgs {
    token_path: Option<PathBuf>,
    env_path: Option<PathBuf>,
    write_env: bool,
}

impl TokenArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--token-path=") {
                parsed.token_path = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env-file=") {
                parsed.env_path = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--token-path" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--token-path requires a value"))?;
                    parsed.token_path = Some(PathBuf::from(value));
                }
                "--env-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--env-file requires a value"))?;
                    parsed.env_path = Some(PathBuf::from(value));
                }
                "--write-env" => {
                    parsed.write_env = true;
                }
                _ => {
                    bail!(
                        "unknown argument: {arg}\nUsage: get_token [--token-path <path>] [--env-file <path>] [--write-env]"
                    );
                }
            }
        }

        Ok(parsed)
    }
}

fn main() -> Result<()> {
    ensure_not_root("get_token")?;

    let args = TokenArgs::parse()?;
    let env_path = args
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;

    let lookup = |key: &str| -> Option<String> {
        env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| file_vars.get(key).cloned())
    };

    let client_id = lookup(CLIENT_ID_VAR)
        .with_context(|| format!("{CLIENT_ID_VAR} not set"))?;
    let scopes = lookup(SCOPES_VAR).unwrap_or_default();
    let token_path = args
        .token_path
        .clone()
        .or_else(|| lookup(TOKEN_PATH_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH));

    let grant = request_device_code(&client_id, &scopes).context("requesting device code")?;

    println!("Go to: {}", grant.verification_uri);
    println!("Enter code: {}", grant.user_code);
    println!("Waiting for authorization...");

    let token = poll_device_token(&client_id, &grant).context("polling for authorization")?;
    save_token(&token_path, &token)?;

    println!("Token saved to {}", token_path.display());
    if args.write_env {
        upsert_env_value(&env_path, USER_TOKEN_VAR, &token.access_token)?;
        println!("Updated {USER_TOKEN_VAR} in {}", env_path.display());
    } else {
        println!("Set {USER_TOKEN_VAR} to access_token from that file.");
    }

    Ok(())
}

/// The token file holds live credentials; write it whole-or-not-at-all.
fn save_token(path: &Path, token: &TokenResponse) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let payload = serde_json::to_vec_pretty(token).context("serializing token")?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
