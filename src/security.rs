#![forbid(unsafe_code)]

//! Startup guard for the catalog server.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when the server is started as root. The video tool reads
/// session cookies from the invoking user's browser profile, so running as
/// root would pick up the wrong (usually empty) profile and write downloads
/// owned by root.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!(
            "{process} must not be run as root; start it as the user whose browser holds the session cookies"
        );
    }
    Ok(())
}
