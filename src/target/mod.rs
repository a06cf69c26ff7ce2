//! Target preparation: make sure the source tree under review is on disk.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// What `prepare_target` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    Cloned,
    AlreadyPresent,
}

/// Clone `repo_url` into `dir` unless `dir` already holds a checkout.
///
/// A non-empty `dir` without `.git` is left alone and reported as an error
/// so an existing tree is never clobbered.
pub fn prepare_target(repo_url: &str, dir: &Path) -> Result<Prepared> {
    if dir.join(".git").exists() {
        debug!("Target already cloned at {:?}", dir);
        return Ok(Prepared::AlreadyPresent);
    }

    if dir.exists() {
        let occupied = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .next()
            .is_some();
        if occupied {
            bail!(
                "{} exists and is not a git checkout; remove it or point target_dir elsewhere",
                dir.display()
            );
        }
    }

    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!("Cloning {} into {:?}", repo_url, dir);
    let output = Command::new("git")
        .args(["clone", "--depth", "1", repo_url])
        .arg(dir)
        .output()
        .context("Failed to run git clone")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    info!("Cloned target into {:?}", dir);
    Ok(Prepared::Cloned)
}
