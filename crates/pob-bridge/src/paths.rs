//! Builds-directory detection and the file-command sandbox
//!
//! Paths are compared as normalized strings: `\` becomes `/`, `.` and empty
//! segments disappear and `..` pops a segment without ever climbing above
//! the root. The check is purely lexical. Symlinks, mount points and
//! case-insensitive aliases are not resolved.

use std::fs;
use std::path::{Path, PathBuf};

use pob_config::builds_locations::{self, BUILDS_DIR};
use tracing::{debug, info, warn};

use crate::errors::PathError;

/// Normalize `path`, joining it onto `base` when it is relative
pub fn normalize(path: &str, base: &str) -> String {
    let path = path.replace('\\', "/");
    let joined = if split_root(&path).is_some() {
        path
    } else {
        let base = base.replace('\\', "/");
        if base.ends_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    };
    let (root, rest) = split_root(&joined).unwrap_or((String::new(), joined.as_str()));

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("{}{}", root, segments.join("/"))
}

/// Split a `/`-separated path into its root (`/`, `//` or `X:/`) and the rest
fn split_root(path: &str) -> Option<(String, &str)> {
    if let Some(rest) = path.strip_prefix("//") {
        return Some(("//".to_string(), rest));
    }
    if let Some(rest) = path.strip_prefix('/') {
        return Some(("/".to_string(), rest));
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/')
    {
        let drive = (bytes[0] as char).to_ascii_uppercase();
        return Some((format!("{}:/", drive), &path[2..]));
    }
    None
}

fn has_parent_segment(input: &str) -> bool {
    input.split(['/', '\\']).any(|segment| segment == "..")
}

/// Validates caller paths against the builds directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    /// Normalized, `/`-terminated builds directory
    root: String,
}

impl PathResolver {
    /// Resolver rooted at `dir`, resolved against `base` when relative
    pub fn new(dir: &str, base: &str) -> Self {
        let mut root = normalize(dir, base);
        if !root.ends_with('/') {
            root.push('/');
        }
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// A path naming a file strictly inside the builds directory
    pub fn validate_file(&self, input: &str) -> Result<PathBuf, PathError> {
        let normalized = normalize(input, &self.root);
        if normalized.len() > self.root.len() && self.is_inside(&normalized) {
            Ok(PathBuf::from(normalized))
        } else {
            Err(self.rejection(input))
        }
    }

    /// A directory inside the builds directory, or the directory itself
    pub fn validate_dir(&self, input: &str) -> Result<PathBuf, PathError> {
        let normalized = normalize(input, &self.root);
        let as_dir = if normalized.ends_with('/') {
            normalized.clone()
        } else {
            format!("{}/", normalized)
        };
        if as_dir == self.root || self.is_inside(&normalized) {
            Ok(PathBuf::from(normalized))
        } else {
            Err(self.rejection(input))
        }
    }

    /// `path` relative to the builds directory, `/`-separated
    pub fn relative(&self, path: &Path) -> String {
        let normalized = normalize(&path.to_string_lossy(), &self.root);
        if self.root.strip_suffix('/') == Some(normalized.as_str()) {
            return String::new();
        }
        normalized
            .strip_prefix(&self.root)
            .unwrap_or(&normalized)
            .to_string()
    }

    /// Normalized `/`-separated form of `path`
    pub fn display(&self, path: &Path) -> String {
        normalize(&path.to_string_lossy(), &self.root)
    }

    fn is_inside(&self, normalized: &str) -> bool {
        normalized.starts_with(&self.root) && !normalized.split('/').any(|s| s == "..")
    }

    fn rejection(&self, input: &str) -> PathError {
        if has_parent_segment(input) {
            PathError::Traversal(input.to_string())
        } else {
            PathError::OutsideRoot(input.to_string())
        }
    }
}

/// Candidate builds directories in detection order
#[derive(Debug, Clone, Default)]
pub struct BuildsCandidates {
    /// `--builds-path`, `POB_BUILDS_PATH` or the config file
    pub override_dir: Option<PathBuf>,
    /// Accepted when the directory exists
    pub default_dirs: Vec<PathBuf>,
    /// Settings files whose `buildPath` is accepted when listable
    pub settings_files: Vec<PathBuf>,
    pub fallback: PathBuf,
    /// Base for relative candidates, normally the working directory
    pub base: PathBuf,
}

impl BuildsCandidates {
    /// Candidates for the current platform
    pub fn from_environment(
        override_dir: Option<PathBuf>,
        user_folder: &str,
        pob_root: &Path,
        base: &Path,
    ) -> Self {
        Self {
            override_dir,
            default_dirs: builds_locations::default_build_dirs(user_folder),
            settings_files: builds_locations::settings_files(user_folder),
            fallback: pob_root.join(BUILDS_DIR),
            base: base.to_path_buf(),
        }
    }

    /// First acceptable candidate; never touches the filesystem for writing
    pub fn select(&self) -> PathBuf {
        if let Some(dir) = &self.override_dir {
            info!("Using builds directory override {}", dir.display());
            return dir.clone();
        }
        if let Some(dir) = self.default_dirs.iter().find(|d| d.is_dir()) {
            info!("Using builds directory {}", dir.display());
            return dir.clone();
        }
        for settings in self.settings_files.iter().filter(|f| f.is_file()) {
            match builds_locations::settings_build_path(settings) {
                Ok(Some(dir)) if fs::read_dir(&dir).is_ok() => {
                    info!(
                        "Using builds directory {} from {}",
                        dir.display(),
                        settings.display()
                    );
                    return dir;
                }
                Ok(Some(dir)) => {
                    debug!("Ignoring unlistable build path {}", dir.display());
                }
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
        }
        info!(
            "No builds directory found, falling back to {}",
            self.fallback.display()
        );
        self.fallback.clone()
    }

    /// Select the builds directory and make sure it exists
    pub fn detect(&self) -> Result<PathResolver, PathError> {
        let dir = self.select();
        let resolver = PathResolver::new(&dir.to_string_lossy(), &self.base.to_string_lossy());
        fs::create_dir_all(resolver.root()).map_err(|source| PathError::CreateDir {
            path: resolver.root().to_string(),
            source,
        })?;
        Ok(resolver)
    }
}
