//! Cross-checks schematic component references against the member index.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::KilibError;
use crate::flavor::Flavor;
use crate::index::MemberIndex;
use crate::notify::{emit, Listener, Notification, Severity};
use crate::parser::{scan_line, LineForm};

pub const SCHEMATIC_EXTENSION: &str = "kicad_sch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    /// Specifier absent from the index.
    Missing,
    /// Symbol pulled from a `-rescue` library.
    Rescue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub designator: String,
    pub specifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub file: PathBuf,
    pub findings: Vec<Finding>,
}

impl FileCheck {
    pub fn passed(&self) -> bool {
        !self.findings.iter().any(|f| f.kind == FindingKind::Missing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Unresolved specifiers, each once, in order of first sighting.
    pub missing: Vec<String>,
    pub files: Vec<FileCheck>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }

    fn record_missing(&mut self, specifier: &str) {
        if !self.missing.iter().any(|m| m == specifier) {
            self.missing.push(specifier.to_string());
        }
    }
}

/// Top-level files of `dir` with `extension`, sorted by name.
pub fn project_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, KilibError> {
    if !dir.is_dir() {
        return Err(KilibError::ProjectNotFound(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Single pass over one schematic's text.
pub fn scan_schematic(flavor: Flavor, content: &str, index: &MemberIndex) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut in_instances = false;
    let mut designator = String::new();
    let mut pending_symbol: Option<String> = None;

    for line in content.lines() {
        let Some(form) = scan_line(line) else {
            continue;
        };
        match form {
            LineForm::Instance { lib_id } => {
                in_instances = true;
                pending_symbol = Some(lib_id);
            }
            LineForm::Property(property) if in_instances => match (flavor, property.key.as_str()) {
                (_, "Reference") => {
                    designator = property.value;
                    if flavor == Flavor::Symbol {
                        if let Some(lib_id) = pending_symbol.take() {
                            check(&mut findings, index, &designator, lib_id);
                        }
                    }
                }
                (Flavor::Footprint, "Footprint") => {
                    if !property.value.is_empty() {
                        check(&mut findings, index, &designator, property.value);
                    }
                    designator.clear();
                }
                _ => {}
            },
            _ => {}
        }
    }
    findings
}

fn check(findings: &mut Vec<Finding>, index: &MemberIndex, designator: &str, specifier: String) {
    if specifier.contains("-rescue") {
        findings.push(Finding {
            kind: FindingKind::Rescue,
            designator: designator.to_string(),
            specifier: specifier.clone(),
        });
    }
    if !index.has_member(&specifier) {
        findings.push(Finding {
            kind: FindingKind::Missing,
            designator: designator.to_string(),
            specifier,
        });
    }
}

/// Checks one schematic, reporting each unresolved reference.
pub fn check_schematic(
    flavor: Flavor,
    path: &Path,
    index: &MemberIndex,
    report: &mut CheckReport,
    listener: &mut dyn Listener,
) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            emit(
                listener,
                Notification::log(Severity::Warning, format!("Cannot read '{}': {}", file_name, e))
                    .with_path(path),
            );
            return;
        }
    };

    let findings = scan_schematic(flavor, &content, index);
    for finding in &findings {
        match finding.kind {
            FindingKind::Missing => {
                report.record_missing(&finding.specifier);
                emit(
                    listener,
                    Notification::failed(format!(
                        "'{}':'{}' was not found in '{}'",
                        finding.designator, finding.specifier, file_name
                    ))
                    .with_path(path),
                );
            }
            FindingKind::Rescue => emit(
                listener,
                Notification::log(
                    Severity::Info,
                    format!(
                        "'{}' uses rescued symbol '{}' in '{}'",
                        finding.designator, finding.specifier, file_name
                    ),
                )
                .with_path(path),
            ),
        }
    }

    let file_check = FileCheck {
        file: path.to_path_buf(),
        findings,
    };
    let summary = if file_check.passed() {
        Notification::passed(format!("'{}' is Good", file_name))
    } else {
        let count = file_check
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::Missing)
            .count();
        Notification::failed(format!(
            "'{}' has {} unresolved {}s",
            file_name,
            count,
            flavor.label()
        ))
    };
    emit(listener, summary.with_path(path));
    report.files.push(file_check);
}

/// Checks every schematic directly inside `project_dir`.
pub fn check_all(
    flavor: Flavor,
    project_dir: &Path,
    index: &MemberIndex,
    listener: &mut dyn Listener,
) -> Result<CheckReport, KilibError> {
    let files = project_files(project_dir, SCHEMATIC_EXTENSION)?;
    let mut report = CheckReport::default();
    if files.is_empty() {
        emit(
            listener,
            Notification::log(
                Severity::Warning,
                format!("No schematics in '{}'", project_dir.display()),
            ),
        );
    }
    for file in &files {
        tracing::debug!("checking {}", file.display());
        check_schematic(flavor, file, index, &mut report, listener);
    }
    Ok(report)
}
