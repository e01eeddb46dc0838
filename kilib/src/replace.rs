//! Regex rewrites over schematic lines.
//!
//! A [`ReplaceList`] maps patterns to replacement text. Every mapping is
//! applied in order to every line; changed lines are reported one by one and
//! the file is rewritten behind a `<file>_old` backup.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KilibError;
use crate::notify::{emit, Listener, Notification, Severity};
use crate::patch::{join_like, rewrite_file};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub from: String,
    pub to: String,
}

/// Ordered pattern mappings. Patterns are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceList {
    mappings: Vec<Mapping>,
}

impl ReplaceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mapping unless `from` is already mapped.
    pub fn add(&mut self, from: impl Into<String>, to: impl Into<String>) -> bool {
        let from = from.into();
        if self.mappings.iter().any(|m| m.from == from) {
            return false;
        }
        self.mappings.push(Mapping { from, to: to.into() });
        true
    }

    pub fn update(&mut self, index: usize, from: impl Into<String>, to: impl Into<String>) -> bool {
        match self.mappings.get_mut(index) {
            Some(slot) => {
                *slot = Mapping {
                    from: from.into(),
                    to: to.into(),
                };
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Mapping> {
        (index < self.mappings.len()).then(|| self.mappings.remove(index))
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter()
    }

    /// Compiles every pattern; the first invalid one fails the whole list.
    pub fn compile(&self) -> Result<Rewriter, KilibError> {
        let rules = self
            .mappings
            .iter()
            .map(|m| Regex::new(&m.from).map(|pattern| (pattern, m.to.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rewriter { rules })
    }
}

impl<F: Into<String>, T: Into<String>> FromIterator<(F, T)> for ReplaceList {
    fn from_iter<I: IntoIterator<Item = (F, T)>>(iter: I) -> Self {
        let mut list = ReplaceList::new();
        for (from, to) in iter {
            list.add(from, to);
        }
        list
    }
}

/// One rewritten line, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChange {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReplace {
    pub file: PathBuf,
    pub changes: Vec<LineChange>,
}

/// Compiled [`ReplaceList`]. Replacements use `$1` / `${name}` group syntax.
#[derive(Debug, Clone)]
pub struct Rewriter {
    rules: Vec<(Regex, String)>,
}

impl Rewriter {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rewrite_line(&self, line: &str) -> String {
        self.rules
            .iter()
            .fold(line.to_string(), |text, (pattern, to)| {
                pattern.replace_all(&text, to.as_str()).into_owned()
            })
    }

    /// Rewritten text and the lines that changed.
    pub fn rewrite_text(&self, content: &str) -> (String, Vec<LineChange>) {
        let mut changes = Vec::new();
        let mut out = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let rewritten = self.rewrite_line(line);
            if rewritten != line {
                changes.push(LineChange {
                    line: number + 1,
                    text: rewritten.clone(),
                });
            }
            out.push(rewritten);
        }
        (join_like(content, out), changes)
    }

    /// Rewrites one file. Unreadable or unwritable files are reported and
    /// yield no changes; unchanged files are left alone.
    pub fn replace_in_file(&self, path: &Path, listener: &mut dyn Listener) -> Vec<LineChange> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                emit(listener, Notification::file_access("read", path, &e));
                return Vec::new();
            }
        };
        let (text, changes) = self.rewrite_text(&content);
        if changes.is_empty() {
            tracing::debug!("{}: no line matched", path.display());
            return changes;
        }
        for change in &changes {
            emit(
                listener,
                Notification::log(Severity::Info, format!("{} Update to '{}'", change.line, change.text))
                    .with_path(path),
            );
        }
        if !rewrite_file(path, &text, listener) {
            return Vec::new();
        }
        emit(
            listener,
            Notification::passed(format!(
                "'{}': {} lines replaced",
                path.file_name().unwrap_or_default().to_string_lossy(),
                changes.len()
            ))
            .with_path(path),
        );
        changes
    }

    /// Rewrites each of `files`, keeping only those that changed.
    pub fn replace_in_files(&self, files: &[PathBuf], listener: &mut dyn Listener) -> Vec<FileReplace> {
        if self.is_empty() {
            emit(
                listener,
                Notification::log(Severity::Warning, "Replace list is empty; nothing to rewrite"),
            );
            return Vec::new();
        }
        files
            .iter()
            .filter_map(|file| {
                let changes = self.replace_in_file(file, listener);
                (!changes.is_empty()).then(|| FileReplace {
                    file: file.clone(),
                    changes,
                })
            })
            .collect()
    }
}
