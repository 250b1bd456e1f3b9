// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

use zkemail_core::error::Result;

/// Return the application data directory, creating it if needed.
///
/// On desktop this uses a conventional location. On mobile the bridge's
/// documents-directory query provides the equivalent.
pub fn data_dir() -> Result<PathBuf> {
    data_dir_under(&dirs_fallback())
}

fn data_dir_under(base: &Path) -> Result<PathBuf> {
    let dir = base.join("zkemail");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_app_directory() {
        let base = tempfile::tempdir().unwrap();
        let dir = data_dir_under(base.path()).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("zkemail"));
        // Second call is a no-op.
        assert_eq!(data_dir_under(base.path()).unwrap(), dir);
    }

    #[test]
    fn unwritable_base_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(data_dir_under(&file).is_err());
    }
}
