#![forbid(unsafe_code)]

//! Command-line poller that checks configured Twitch channels for new
//! archived broadcasts, downloads them with yt-dlp, and files them into a
//! media-library hierarchy with an `.nfo` sidecar per episode.
//!
//! Designed to run from cron: every invocation is a full pass over the
//! configured channels, progress is persisted per channel, and a killed
//! run resumes from the same VOD next time.

use anyhow::{Context, Result, bail};
use std::env;
use std::path::PathBuf;
use vodkeep_tools::config::{Overrides, resolve_settings};
use vodkeep_tools::downloader::YtDlp;
use vodkeep_tools::error::VodError;
use vodkeep_tools::processor::{ChannelReport, run_channels};
use vodkeep_tools::security::{ensure_not_root, warn_on_loose_cookie_permissions};
use vodkeep_tools::twitch::{TwitchClient, app_access_token};

#[derive(Debug, Clone, Default)]
struct SaveArgs {
    overrides: Overrides,
}

impl SaveArgs {
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
        let mut overrides = Overrides::default();
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--output-dir=") {
                overrides.output_dir = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--state-path=") {
                overrides.state_path = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env-file=") {
                overrides.env_path = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--output-dir" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--output-dir requires a value"))?;
                    overrides.output_dir = Some(PathBuf::from(value));
                }
                "--state-path" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--state-path requires a value"))?;
                    overrides.state_path = Some(PathBuf::from(value));
                }
                "--env-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--env-file requires a value"))?;
                    overrides.env_path = Some(PathBuf::from(value));
                }
                _ => {
                    bail!(
                        "unknown argument: {arg}\nUsage: save_vods [--env-file <path>] [--output-dir <path>] [--state-path <path>]"
                    );
                }
            }
        }

        Ok(Self { overrides })
    }
}

fn main() -> Result<()> {
    ensure_not_root("save_vods")?;

    let SaveArgs { overrides } = SaveArgs::parse()?;
    let settings = resolve_settings(overrides).context("loading configuration")?;

    if !settings.cookies_path.exists() {
        bail!(
            "Cookies file not found: {}",
            settings.cookies_path.display()
        );
    }
    warn_on_loose_cookie_permissions(&settings.cookies_path);

    let ytdlp = YtDlp::new();
    ytdlp.ensure_available()?;

    println!("===================================");
    println!("Twitch VOD Saver");
    println!("===================================");
    println!("Channels: {}", settings.channels.join(", "));
    println!("Library root: {}", settings.output_dir.display());
    println!();

    let token = match &settings.user_token {
        Some(token) => token.clone(),
        None => app_access_token(&settings.client_id, &settings.client_secret)
            .context("obtaining app access token")?,
    };
    let client = TwitchClient::new(settings.client_id.clone(), token);

    let reports = run_channels(&client, &ytdlp, &settings).context("processing channels")?;

    let failures = reports
        .iter()
        .filter(|report| report.result.is_err())
        .count();
    println!();
    println!(
        "Run complete: {} channel(s), {} failure(s).",
        reports.len(),
        failures
    );

    // A one-channel invocation surfaces the downloader's own exit code so
    // wrappers and cron alerts can tell a tool failure from a config one.
    if let [report] = reports.as_slice()
        && let Some(code) = downloader_exit_code(report)
    {
        std::process::exit(code);
    }

    Ok(())
}

fn downloader_exit_code(report: &ChannelReport) -> Option<i32> {
    match &report.result {
        Err(VodError::Download { code }) => Some(*code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vodkeep_tools::processor::Outcome;

    #[test]
    fn args_default_to_no_overrides() {
        let args = SaveArgs::from_slice(&[]).unwrap();
        assert!(args.overrides.output_dir.is_none());
        assert!(args.overrides.state_path.is_none());
        assert!(args.overrides.env_path.is_none());
    }

    #[test]
    fn args_accept_separate_and_equals_forms() {
        let args = SaveArgs::from_slice(&[
            "--output-dir",
            "/library",
            "--state-path=/var/state",
            "--env-file",
            "/etc/vodkeep.env",
        ])
        .unwrap();
        assert_eq!(args.overrides.output_dir, Some(PathBuf::from("/library")));
        assert_eq!(args.overrides.state_path, Some(PathBuf::from("/var/state")));
        assert_eq!(
            args.overrides.env_path,
            Some(PathBuf::from("/etc/vodkeep.env"))
        );
    }

    #[test]
    fn args_reject_unknown_flags() {
        let err = SaveArgs::from_slice(&["--nope"]).unwrap_err();
        assert!(err.to_string().contains("unknown argument"));
    }

    #[test]
    fn args_require_flag_values() {
        let err = SaveArgs::from_slice(&["--output-dir"]).unwrap_err();
        assert!(err.to_string().contains("requires a value"));
    }

    #[test]
    fn only_download_failures_map_to_exit_codes() {
        let download_failed = ChannelReport {
            channel: "foo".to_string(),
            result: Err(VodError::Download { code: 7 }),
        };
        assert_eq!(downloader_exit_code(&download_failed), Some(7));

        let transport = ChannelReport {
            channel: "foo".to_string(),
            result: Err(VodError::Transport("timed out".into())),
        };
        assert_eq!(downloader_exit_code(&transport), None);

        let ok = ChannelReport {
            channel: "foo".to_string(),
            result: Ok(Outcome::NoArchive),
        };
        assert_eq!(downloader_exit_code(&ok), None);
    }
}
