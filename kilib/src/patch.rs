//! Writes vendor part numbers into schematic symbol instances.
//!
//! One forward pass per file. Inside each placed symbol the `Value` and
//! `Footprint` properties select a [`PartRecord`]; vendor properties already
//! present are rewritten in place, missing ones are inserted before the
//! symbol's first pin. Instance state is reset where each placed symbol
//! starts and at every pin line.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::KilibError;
use crate::notify::{emit, Listener, Notification, Severity};
use crate::parser::line::{indent_of, quote, replace_property_value};
use crate::parser::{scan_line, LineForm, Placement};
use crate::parts::{PartMatch, PartRecord, PartTable, VendorField};
use crate::validate::{project_files, SCHEMATIC_EXTENSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchAction {
    Updated,
    Added,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchChange {
    pub designator: String,
    pub field: VendorField,
    pub code: String,
    pub action: PatchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePatch {
    pub file: PathBuf,
    pub changes: Vec<PatchChange>,
}

#[derive(Debug, Default)]
struct InstanceState {
    designator: String,
    value: String,
    indent: String,
    anchor: Option<Placement>,
    max_id: Option<u32>,
    seen: [bool; 3],
    target: Option<PartRecord>,
}

impl InstanceState {
    fn synthesize(&self, out: &mut Vec<String>, changes: &mut Vec<PatchChange>) {
        let Some(target) = &self.target else {
            return;
        };
        let Some(anchor) = &self.anchor else {
            tracing::debug!("{}: no Reference position, nothing inserted", self.designator);
            return;
        };
        let mut next_id = self.max_id.map(|id| id + 1);
        for field in VendorField::ALL {
            let code = target.code(field);
            if self.seen[field.slot()] || code.is_empty() {
                continue;
            }
            let id = match next_id {
                Some(id) => {
                    next_id = Some(id + 1);
                    format!(" (id {})", id)
                }
                None => String::new(),
            };
            out.push(format!(
                "{}(property {} {}{} (at {} {} 0)",
                self.indent,
                quote(field.key()),
                quote(code),
                id,
                anchor.x,
                anchor.y
            ));
            out.push(format!("{}  (effects (font (size 1.27 1.27)) hide)", self.indent));
            out.push(format!("{})", self.indent));
            changes.push(PatchChange {
                designator: self.designator.clone(),
                field,
                code: code.to_string(),
                action: PatchAction::Added,
            });
        }
    }
}

/// Patched text of one schematic and what changed.
pub fn patch_text(content: &str, parts: &PartTable) -> (String, Vec<PatchChange>) {
    let mut out: Vec<String> = Vec::new();
    let mut changes = Vec::new();
    let mut in_instances = false;
    let mut state = InstanceState::default();

    for line in content.lines() {
        match scan_line(line) {
            Some(LineForm::Instance { .. }) => {
                in_instances = true;
                state = InstanceState::default();
            }
            Some(LineForm::Property(property)) if in_instances => {
                if let Some(id) = property.id {
                    state.max_id = Some(state.max_id.map_or(id, |max| max.max(id)));
                }
                match property.key.as_str() {
                    "Reference" => {
                        state.designator = property.value;
                        state.anchor = property.at;
                        state.indent = indent_of(line).to_string();
                    }
                    "Value" => state.value = property.value,
                    "Footprint" => {
                        state.target = parts.lookup(&state.value, &property.value).map(|(record, how)| {
                            if how == PartMatch::ValueOnly {
                                tracing::debug!(
                                    "{}: '{}' matched by value only",
                                    state.designator,
                                    state.value
                                );
                            }
                            record.clone()
                        });
                    }
                    key => {
                        if let Some(field) = VendorField::from_key(key) {
                            state.seen[field.slot()] = true;
                            let code = state.target.as_ref().map(|t| t.code(field)).unwrap_or("");
                            if !code.is_empty() && code != property.value {
                                if let Some(rewritten) = replace_property_value(line, code) {
                                    changes.push(PatchChange {
                                        designator: state.designator.clone(),
                                        field,
                                        code: code.to_string(),
                                        action: PatchAction::Updated,
                                    });
                                    out.push(rewritten);
                                    continue;
                                }
                            }
                        }
                    }
                }
            }
            Some(LineForm::Pin { .. }) => {
                if in_instances {
                    state.synthesize(&mut out, &mut changes);
                }
                state = InstanceState::default();
            }
            _ => {}
        }
        out.push(line.to_string());
    }

    (join_like(content, out), changes)
}

/// Joins rewritten `lines` with the line ending and final newline of
/// `original`.
pub(crate) fn join_like(original: &str, lines: Vec<String>) -> String {
    let newline = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let mut text = lines.join(newline);
    if original.ends_with('\n') {
        text.push_str(newline);
    }
    text
}

/// `<file>_old` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push("_old");
    path.with_file_name(name)
}

/// Moves `path` to `<file>_old`, replacing an older backup. A failure is
/// reported and the caller goes on to write anyway.
pub fn backup(path: &Path, listener: &mut dyn Listener) {
    let old = backup_path(path);
    if old.exists() {
        if let Err(e) = std::fs::remove_file(&old) {
            tracing::warn!("cannot remove {}: {}", old.display(), e);
        }
    }
    if let Err(e) = std::fs::rename(path, &old) {
        emit(listener, Notification::file_access("back up", path, &e));
    }
}

/// Backs `path` up and writes `text` in its place. When the write fails the
/// backup is moved back, so the file is never left missing.
pub fn rewrite_file(path: &Path, text: &str, listener: &mut dyn Listener) -> bool {
    backup(path, listener);
    let Err(e) = std::fs::write(path, text) else {
        return true;
    };
    emit(listener, Notification::file_access("write", path, &e));
    let old = backup_path(path);
    if !path.exists() && old.exists() {
        if let Err(e) = std::fs::rename(&old, path) {
            tracing::error!("cannot restore {} from {}: {}", path.display(), old.display(), e);
        }
    }
    false
}

/// Patches one schematic. Files without changes are not rewritten; a file
/// that cannot be read or written is reported and yields no changes.
pub fn patch_schematic(path: &Path, parts: &PartTable, listener: &mut dyn Listener) -> Vec<PatchChange> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            emit(listener, Notification::file_access("read", path, &e));
            return Vec::new();
        }
    };

    let (text, changes) = patch_text(&content, parts);
    if changes.is_empty() {
        tracing::debug!("{} unchanged", path.display());
        return changes;
    }

    for change in &changes {
        emit(
            listener,
            Notification::log(
                Severity::Info,
                format!(
                    "{} {} = '{}' ({:?})",
                    change.designator,
                    change.field.key(),
                    change.code,
                    change.action
                ),
            )
            .with_path(path),
        );
    }
    if !rewrite_file(path, &text, listener) {
        return Vec::new();
    }
    emit(
        listener,
        Notification::passed(format!(
            "'{}' patched with {} properties",
            path.file_name().unwrap_or_default().to_string_lossy(),
            changes.len()
        ))
        .with_path(path),
    );
    changes
}

/// Patches every schematic directly inside `schematic_dir`.
pub fn apply(
    parts: &PartTable,
    schematic_dir: &Path,
    listener: &mut dyn Listener,
) -> Result<Vec<FilePatch>, KilibError> {
    let files = project_files(schematic_dir, SCHEMATIC_EXTENSION)?;
    if parts.is_empty() {
        emit(
            listener,
            Notification::log(Severity::Warning, "Part list is empty; nothing to patch"),
        );
        return Ok(Vec::new());
    }
    let mut patched = Vec::new();
    for file in files {
        let changes = patch_schematic(&file, parts, listener);
        if !changes.is_empty() {
            patched.push(FilePatch { file, changes });
        }
    }
    Ok(patched)
}
