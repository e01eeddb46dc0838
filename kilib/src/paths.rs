//! Path macros, relative-path algebra and recursive search.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::{DirEntry, WalkDir};

use crate::config::{KicadPaths, KICAD_VERSIONS};
use crate::error::KilibError;

/// Token KiCad expands to the directory holding the project file.
pub const PROJECT_TOKEN: &str = "${KIPRJMOD}";

/// Deepest path (in segments) the relative-path algorithm and the recursive
/// searches will handle.
pub const MAX_PATH_DEPTH: usize = 255;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Result of [`PathResolver::to_relative`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relative {
    /// Already a macro path, or no library root given.
    Unchanged,
    Converted(String),
    /// The path is not below the library root.
    OutsideLibraryRoot,
    /// Project and library root share no ancestor (different drives).
    NoCommonAncestor,
}

impl Relative {
    /// The converted path, or `original` when nothing was converted.
    pub fn or_original(self, original: &str) -> String {
        match self {
            Relative::Converted(path) => path,
            _ => original.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    project_dir: PathBuf,
    project: String,
    substitutions: Vec<(String, String)>,
}

impl PathResolver {
    pub fn new(project_dir: &Path, paths: &KicadPaths) -> Self {
        let project = to_slash(project_dir);
        let mut substitutions = vec![(PROJECT_TOKEN.to_string(), project.clone())];
        for version in KICAD_VERSIONS {
            substitutions.push((
                format!("${{KICAD{}_FOOTPRINT_DIR}}", version),
                to_slash(&paths.footprints()),
            ));
            substitutions.push((
                format!("${{KICAD{}_SYMBOL_DIR}}", version),
                to_slash(&paths.symbols()),
            ));
            substitutions.push((
                format!("${{KICAD{}_3DMODEL_DIR}}", version),
                to_slash(&paths.models()),
            ));
        }
        Self {
            project_dir: project_dir.to_path_buf(),
            project,
            substitutions,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Expands every known token; unknown `${...}` tokens stay verbatim.
    pub fn resolve_macros(&self, path: &str) -> String {
        let mut resolved = path.to_string();
        for (token, value) in &self.substitutions {
            if resolved.contains(token.as_str()) {
                resolved = resolved.replace(token.as_str(), value);
            }
        }
        resolved
    }

    pub fn resolve(&self, uri: &str) -> PathBuf {
        PathBuf::from(self.resolve_macros(uri))
    }

    /// Rewrites an absolute path as `${KIPRJMOD}`-relative.
    ///
    /// Paths under the project become `${KIPRJMOD}/<rest>`. Paths under
    /// `library_root` climb from the project to the common ancestor and
    /// descend to the library root: `${KIPRJMOD}/../../<lib>/<rest>`.
    pub fn to_relative(&self, path: &str, library_root: &str) -> Relative {
        if path.starts_with('$') {
            return Relative::Unchanged;
        }
        let library_root = normalize(library_root);
        if library_root.is_empty() {
            return Relative::Unchanged;
        }
        let path = normalize(path);

        if let Some(rest) = strip_dir_prefix(&path, &self.project) {
            return Relative::Converted(format!("{}{}", PROJECT_TOKEN, rest));
        }
        let Some(below_library) = strip_dir_prefix(&path, &library_root) else {
            return Relative::OutsideLibraryRoot;
        };

        let project: Vec<&str> = self.project.split('/').collect();
        let library: Vec<&str> = library_root.split('/').collect();
        if project.len() > MAX_PATH_DEPTH || library.len() > MAX_PATH_DEPTH {
            return Relative::NoCommonAncestor;
        }
        let common = project
            .iter()
            .zip(&library)
            .take_while(|(a, b)| a == b)
            .count();
        if common == 0 {
            return Relative::NoCommonAncestor;
        }

        let mut relative = String::from(PROJECT_TOKEN);
        for _ in common..project.len() {
            relative.push_str("/..");
        }
        for segment in &library[common..] {
            relative.push('/');
            relative.push_str(segment);
        }
        relative.push_str(below_library);
        Relative::Converted(relative)
    }

    /// [`to_relative`](Self::to_relative) over paths, keeping the input on
    /// any non-conversion.
    pub fn relativize(&self, path: &Path, library_root: &Path) -> String {
        let original = to_slash(path);
        self.to_relative(&original, &to_slash(library_root))
            .or_original(&original)
    }
}

/// `/`-separated form of a path without a trailing separator.
pub fn to_slash(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

fn normalize(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let trimmed = slashed.trim_end_matches('/');
    if trimmed.is_empty() && slashed.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Remainder of `path` below directory `dir` (empty or starting with `/`).
fn strip_dir_prefix<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() || dir == "/" {
        return None;
    }
    let rest = path.strip_prefix(dir)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Pattern matching exactly `name`, with wildcard characters taken literally.
pub fn exact(name: &str) -> Result<Pattern, KilibError> {
    Ok(Pattern::new(&Pattern::escape(name))?)
}

pub fn wildcard(pattern: &str) -> Result<Pattern, KilibError> {
    Ok(Pattern::new(pattern)?)
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Depth-first walk below `root`; files before subdirectories, by name.
fn walk(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_PATH_DEPTH)
        .follow_links(false)
        .sort_by(files_first)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {}", e);
                None
            }
        })
}

fn name_matches(entry: &DirEntry, patterns: &[Pattern]) -> bool {
    let name = entry.file_name().to_string_lossy();
    patterns
        .iter()
        .any(|pattern| pattern.matches_with(&name, MATCH_OPTIONS))
}

pub fn find_files(root: &Path, patterns: &[Pattern]) -> Vec<PathBuf> {
    walk(root)
        .filter(|entry| entry.file_type().is_file() && name_matches(entry, patterns))
        .map(DirEntry::into_path)
        .collect()
}

pub fn find_file(root: &Path, patterns: &[Pattern]) -> Option<PathBuf> {
    walk(root)
        .find(|entry| entry.file_type().is_file() && name_matches(entry, patterns))
        .map(DirEntry::into_path)
}

/// First directory below `root` whose name equals `name`.
pub fn find_directory(root: &Path, name: &str) -> Option<PathBuf> {
    walk(root)
        .find(|entry| entry.file_type().is_dir() && entry.file_name() == name)
        .map(DirEntry::into_path)
}
