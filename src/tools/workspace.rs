//! Root confinement for the file tools.
//!
//! Every path the model supplies is resolved here before it touches the
//! filesystem. Resolution happens twice: lexically (so `..` can never climb
//! above the root even for paths that do not exist) and after
//! canonicalization (so symlinks cannot point outside it).

use crate::error::ToolError;
use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Workspace {
    /// Canonical root directory.
    root: PathBuf,
    /// The root as written in the config, e.g. `./repo`.
    alias: String,
    /// Directory names skipped by recursive walks.
    ignore: Vec<String>,
}

impl Workspace {
    /// Open a workspace over an existing directory.
    pub fn open(root: &Path, ignore: Vec<String>) -> Result<Self> {
        let canonical = root
            .canonicalize()
            .with_context(|| format!("Target root does not exist: {}", root.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("Target root is not a directory: {}", root.display());
        }
        Ok(Self {
            root: canonical,
            alias: normalize_alias(&root.to_string_lossy()),
            ignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|i| i == name)
    }

    /// Resolve a model-supplied path to an existing path inside the root.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let relative = self.strip_root_prefix(raw.trim());
        let candidate = Path::new(relative);

        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let lexical = lexical_normalize(&joined)
            .filter(|p| p.starts_with(&self.root))
            .ok_or_else(|| ToolError::PathEscapesRoot(raw.to_string()))?;

        let canonical = lexical
            .canonicalize()
            .map_err(|_| ToolError::NotFound(raw.to_string()))?;
        if !canonical.starts_with(&self.root) {
            return Err(ToolError::PathEscapesRoot(raw.to_string()));
        }
        Ok(canonical)
    }

    /// Render a path relative to the root, `.` for the root itself.
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    /// Drop a leading copy of the configured root so `./repo/routes` works
    /// when the root itself is `./repo`.
    fn strip_root_prefix<'a>(&self, raw: &'a str) -> &'a str {
        let trimmed = raw.strip_prefix("./").unwrap_or(raw);
        if self.alias.is_empty() || self.alias == "." {
            return if trimmed.is_empty() { "." } else { trimmed };
        }
        if trimmed == self.alias || trimmed == format!("{}/", self.alias) {
            return ".";
        }
        match trimmed.strip_prefix(&format!("{}/", self.alias)) {
            Some(rest) => rest,
            None if trimmed.is_empty() => ".",
            None => trimmed,
        }
    }
}

fn normalize_alias(root: &str) -> String {
    let trimmed = root.strip_prefix("./").unwrap_or(root);
    trimmed.trim_end_matches('/').to_string()
}

/// Collapse `.` and `..` without touching the filesystem. `None` if `..`
/// would climb above the filesystem root.
fn lexical_normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("repo/routes")).unwrap();
        fs::write(dir.path().join("repo/routes/login.ts"), "x").unwrap();
        fs::write(dir.path().join("secret.txt"), "s").unwrap();
        let ws = Workspace::open(&dir.path().join("repo"), vec![]).unwrap();
        (dir, ws)
    }

    #[test]
    fn resolves_relative_paths_under_root() {
        let (_dir, ws) = fixture();
        let p = ws.resolve("routes/login.ts").unwrap();
        assert!(p.ends_with("routes/login.ts"));
        assert_eq!(ws.display(&p), "routes/login.ts");
        assert_eq!(ws.display(&ws.resolve(".").unwrap()), ".");
    }

    #[test]
    fn rejects_parent_traversal() {
        let (_dir, ws) = fixture();
        assert!(matches!(
            ws.resolve("../secret.txt"),
            Err(ToolError::PathEscapesRoot(_))
        ));
        assert!(matches!(
            ws.resolve("routes/../../secret.txt"),
            Err(ToolError::PathEscapesRoot(_))
        ));
        assert!(matches!(
            ws.resolve("../does-not-exist"),
            Err(ToolError::PathEscapesRoot(_))
        ));
    }

    #[test]
    fn rejects_absolute_paths_outside_root() {
        let (dir, ws) = fixture();
        let outside = dir.path().join("secret.txt");
        assert!(matches!(
            ws.resolve(&outside.to_string_lossy()),
            Err(ToolError::PathEscapesRoot(_))
        ));
    }

    #[test]
    fn inner_dotdot_that_stays_inside_is_allowed() {
        let (_dir, ws) = fixture();
        let p = ws.resolve("routes/../routes/login.ts").unwrap();
        assert_eq!(ws.display(&p), "routes/login.ts");
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (_dir, ws) = fixture();
        assert!(matches!(ws.resolve("nope.ts"), Err(ToolError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_root_are_rejected() {
        let (dir, ws) = fixture();
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), ws.root().join("link")).unwrap();
        assert!(matches!(
            ws.resolve("link"),
            Err(ToolError::PathEscapesRoot(_))
        ));
    }

    #[test]
    fn configured_root_prefix_is_stripped() {
        let (dir, _) = fixture();
        let cwd_relative = Workspace {
            root: dir.path().join("repo").canonicalize().unwrap(),
            alias: normalize_alias("./repo"),
            ignore: vec![],
        };
        let p = cwd_relative.resolve("./repo/routes/login.ts").unwrap();
        assert_eq!(cwd_relative.display(&p), "routes/login.ts");
        assert_eq!(cwd_relative.display(&cwd_relative.resolve("./repo/").unwrap()), ".");
    }
}
