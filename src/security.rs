#![forbid(unsafe_code)]

//! Process-level guards and filename hardening for the fetchtube server.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when the server is started as root. It spawns an external
/// extractor on arbitrary user-supplied URLs and must run unprivileged.
pub fn ensure_not_root(process: &str) -> Result<()> {
    if Uid::current().is_root() {
        bail!("{process} must not be run as root; please use a dedicated service account");
    }
    Ok(())
}

/// Accepts only a single plain path component so a requested name can be
/// joined onto the storage directory without escaping it.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.len() <= 255
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_safe() {
        assert!(is_safe_file_name("Clip 123e4567-e89b-12d3-a456-426614174000.mp4"));
        assert!(is_safe_file_name("weird..but fine.webm"));
    }

    #[test]
    fn traversal_and_hidden_names_are_rejected() {
        for name in [
            "",
            ".",
            "..",
            "../secret",
            "..\\secret",
            "a/b.mp4",
            "/etc/passwd",
            ".env",
            "nul\0byte",
        ] {
            assert!(!is_safe_file_name(name), "{name:?} should be rejected");
        }
        assert!(!is_safe_file_name(&"a".repeat(256)));
    }
}
