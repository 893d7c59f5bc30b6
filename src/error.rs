#![forbid(unsafe_code)]

//! Error taxonomy shared by every component. Binaries wrap these in
//! `anyhow` at the top level; the variants matter to the orchestrator,
//! which treats authentication failures as fatal for the whole run and
//! everything else as fatal for the current channel only.

#[derive(thiserror::Error, Debug)]
pub enum VodError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("downloader exited with status {code}")]
    Download { code: i32 },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error {1}")]
    Io(#[source] std::io::Error, String),
}

impl VodError {
    /// Wraps an I/O error with a short description of the file operation
    /// that failed, mirroring how the rest of the crate reports paths.
    pub fn io(err: std::io::Error, what: impl Into<String>) -> Self {
        VodError::Io(err, what.into())
    }
}
