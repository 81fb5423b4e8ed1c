use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::ConfigError;

/// Include and exclude path globs. Exclusion takes precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobRule {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ConfigError::Pattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

impl GlobRule {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.include.iter().any(|p| p.matches_path_with(path, MATCH_OPTIONS))
            && !self.exclude.iter().any(|p| p.matches_path_with(path, MATCH_OPTIONS))
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
