#![forbid(unsafe_code)]

//! yt-dlp subprocess adapter.
//!
//! The external tool is the only thing that talks to the CDN; its exit
//! code is the only success signal consulted. No retries and no partial
//! file cleanup happen here: state never advances on failure and the next
//! run recomputes the same destination, so yt-dlp resumes or overwrites.

use crate::error::VodError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Narrow seam over the external download tool so tests can substitute a
/// fake that records calls instead of spawning a process.
pub trait Downloader {
    fn download(
        &self,
        url: &str,
        cookies_path: &Path,
        dest_path: &Path,
        extra_args: &[String],
    ) -> Result<(), VodError>;
}

pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    /// Points the adapter at a specific executable; tests pass a stub
    /// script here.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `--version` to fail loudly at startup when the tool is
    /// missing, instead of failing mid-run on the first channel.
    pub fn ensure_available(&self) -> Result<(), VodError> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(VodError::Config(format!(
                "{} is installed but returned a failure status",
                self.program.display()
            ))),
            Err(err) => Err(VodError::Config(format!(
                "{} is not installed or not in PATH: {err}",
                self.program.display()
            ))),
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for YtDlp {
    fn download(
        &self,
        url: &str,
        cookies_path: &Path,
        dest_path: &Path,
        extra_args: &[String],
    ) -> Result<(), VodError> {
        let args = build_args(url, cookies_path, dest_path, extra_args);
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|err| VodError::io(err, format!("running {}", self.program.display())))?;
        if status.success() {
            Ok(())
        } else {
            Err(VodError::Download {
                code: status.code().unwrap_or(-1),
            })
        }
    }
}

/// Caller-supplied extra args go first so they can override the fixed
/// defaults that follow them.
fn build_args(
    url: &str,
    cookies_path: &Path,
    dest_path: &Path,
    extra_args: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = extra_args.iter().map(OsString::from).collect();
    args.push("--cookies".into());
    args.push(cookies_path.into());
    args.push("--no-write-cookies".into());
    args.push("-o".into());
    args.push(dest_path.into());
    args.push("--merge-output-format".into());
    args.push("mp4".into());
    args.push(url.into());
    args
}
