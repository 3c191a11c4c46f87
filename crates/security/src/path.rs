//! Path validation: resolve tool-supplied paths inside the workspace root.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathValidationError {
    #[error("path is empty")]
    Empty,

    #[error("path '{path}' escapes the workspace")]
    PathTraversal { path: String },

    #[error("path '{path}' is absolute; use a workspace-relative path")]
    Absolute { path: String },

    #[error("path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("path '{path}' contains a control character")]
    ControlCharacter { path: String },
}

/// Resolves workspace-relative paths and rejects the unsafe ones.
#[derive(Debug, Clone)]
pub struct WorkspaceSandbox {
    root: PathBuf,
    forbidden: Vec<String>,
}

impl WorkspaceSandbox {
    pub fn new(root: impl Into<PathBuf>, forbidden_paths: &[String]) -> Self {
        Self {
            root: root.into(),
            forbidden: forbidden_paths.to_vec(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every problem with `path`, in a stable order. Empty means the path is usable.
    pub fn check(&self, path: &str) -> Vec<PathValidationError> {
        let mut problems = Vec::new();
        let trimmed = path.trim();

        if trimmed.is_empty() {
            problems.push(PathValidationError::Empty);
            return problems;
        }
        if trimmed.chars().any(char::is_control) {
            problems.push(PathValidationError::ControlCharacter { path: path.into() });
        }

        let normalized = trimmed.replace('\\', "/");
        if normalized.starts_with('/') || normalized.starts_with('~') || has_drive_prefix(&normalized)
        {
            problems.push(PathValidationError::Absolute { path: path.into() });
        }
        if normalize(&normalized).is_none() {
            problems.push(PathValidationError::PathTraversal { path: path.into() });
        }
        if let Some(pattern) = self.forbidden_match(&normalized) {
            problems.push(PathValidationError::ForbiddenPath {
                path: path.into(),
                pattern,
            });
        }

        problems
    }

    /// Resolve `path` to an absolute path inside the root.
    ///
    /// Returns the first violation when the path is unusable.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        if let Some(first) = self.check(path).into_iter().next() {
            tracing::debug!(path, error = %first, "Rejected workspace path");
            return Err(first);
        }
        let relative = normalize(&path.trim().replace('\\', "/")).unwrap_or_default();
        Ok(self.root.join(relative))
    }

    /// Turn an absolute path under the root back into its workspace-relative form.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        absolute
            .strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }

    fn forbidden_match(&self, normalized: &str) -> Option<String> {
        let relative = normalize(normalized)?;
        let relative = relative.to_string_lossy().replace('\\', "/").to_lowercase();
        let home = home_dir();

        self.forbidden.iter().find_map(|pattern| {
            let candidate = if let Some(rest) = pattern.strip_prefix("~/") {
                // Home-relative patterns only apply when the workspace sits under home.
                let home = home.as_ref()?;
                let absolute = self.root.join(&relative);
                let target = PathBuf::from(home).join(rest);
                return absolute.starts_with(&target).then(|| pattern.clone());
            } else {
                pattern.trim_start_matches("./").to_lowercase()
            };
            let hit = relative == candidate || relative.starts_with(&format!("{candidate}/"));
            hit.then(|| pattern.clone())
        })
    }
}

/// Lexically resolve `.` and `..`. `None` when the path climbs above its start.
fn normalize(path: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                parts.pop()?;
            }
        }
    }
    Some(parts.iter().collect())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}
