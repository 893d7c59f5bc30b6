#![forbid(unsafe_code)]

//! Shared security helpers used by the vodkeep binaries.

use anyhow::{Result, bail};
use nix::unistd::Uid;
use std::path::Path;

/// Fails fast when a binary is started as root. The tools write into a
/// media library owned by a regular user; running them privileged risks
/// scattering root-owned files through it.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!(
            "{process} must not be run as root; use a regular user or a dedicated service account"
        );
    }
    Ok(())
}

/// The cookie jar carries live session credentials. A loose mode is worth
/// a warning but not a hard failure, since the operator may be on a
/// single-user box.
pub fn warn_on_loose_cookie_permissions(path: &Path) {
    #[cfg(unix)]
    if cookie_permissions_are_loose(path) {
        eprintln!(
            "Warning: {} is readable by other users; consider chmod 600",
            path.display()
        );
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[cfg(unix)]
pub fn cookie_permissions_are_loose(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|metadata| metadata.permissions().mode() & 0o077 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Uid;

    #[test]
    fn ensure_not_root_allows_unprivileged_uid() {
        let uid = Uid::from_raw(1000);
        assert!(ensure_not_root_for(uid, "tester").is_ok());
    }

    #[test]
    fn ensure_not_root_rejects_root_uid() {
        let uid = Uid::from_raw(0);
        let err = ensure_not_root_for(uid, "tester").unwrap_err();
        assert!(err.to_string().contains("must not be run as root"));
    }

    #[cfg(unix)]
    #[test]
    fn cookie_mode_classification() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, "# Netscape HTTP Cookie File\n").unwrap();

        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(&path, perms.clone()).unwrap();
        assert!(cookie_permissions_are_loose(&path));

        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms).unwrap();
        assert!(!cookie_permissions_are_loose(&path));
    }
}
