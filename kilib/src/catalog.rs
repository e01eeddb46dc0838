//! Library tables (`fp-lib-table`, `sym-lib-table`).
//!
//! Each project carries its own table next to the project file; the KiCad
//! installation carries a global one. Only the project table is ever written.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::KicadPaths;
use crate::flavor::Flavor;
use crate::notify::{emit, Listener, NoticeKind, Notification, Severity};
use crate::parser::line::{quote, scan_sexp};
use crate::parser::{scan_line, LineForm, TableRecord};
use crate::paths::{to_slash, PathResolver, Relative};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Project,
    Global,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Project => write!(f, "Project"),
            Level::Global => write!(f, "Global"),
        }
    }
}

/// Storage format of a library, from the table's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LibraryKind {
    /// KiCad 4-5 single-file library.
    Legacy,
    /// `KiCad` type: `.pretty` directory or `.kicad_sym` file.
    Modern,
    /// Any other plugin type, kept verbatim.
    Other(String),
}

impl LibraryKind {
    pub fn parse(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("kicad") {
            LibraryKind::Modern
        } else if kind.eq_ignore_ascii_case("legacy") {
            LibraryKind::Legacy
        } else {
            LibraryKind::Other(kind.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LibraryKind::Legacy => "Legacy",
            LibraryKind::Modern => "KiCad",
            LibraryKind::Other(kind) => kind,
        }
    }
}

impl From<String> for LibraryKind {
    fn from(kind: String) -> Self {
        LibraryKind::parse(&kind)
    }
}

impl From<LibraryKind> for String {
    fn from(kind: LibraryKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    pub kind: LibraryKind,
    pub uri: String,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub description: String,
}

impl LibraryEntry {
    pub fn new(name: impl Into<String>, kind: LibraryKind, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            uri: uri.into(),
            options: String::new(),
            description: String::new(),
        }
    }

    pub fn to_table_line(&self) -> String {
        format!(
            "  (lib (name {})(type {})(uri {})(options {})(descr {}))",
            quote(&self.name),
            quote(self.kind.as_str()),
            quote(&self.uri),
            quote(&self.options),
            quote(&self.description)
        )
    }
}

impl From<TableRecord> for LibraryEntry {
    fn from(record: TableRecord) -> Self {
        Self {
            name: record.name,
            kind: LibraryKind::parse(&record.kind),
            uri: record.uri,
            options: record.options,
            description: record.descr,
        }
    }
}

/// Editable column of a library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Name,
    Kind,
    Uri,
    Options,
    Description,
}

/// Result of writing one project entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Unchanged,
    Added,
    Updated,
}

#[derive(Debug, Clone)]
pub struct LibraryCatalog {
    flavor: Flavor,
    project_table: PathBuf,
    global_table: PathBuf,
    project: Vec<LibraryEntry>,
    global: Vec<LibraryEntry>,
    version: Option<String>,
}

impl LibraryCatalog {
    /// Empty catalog for `project_dir`; call [`load_all`](Self::load_all) to fill it.
    pub fn new(flavor: Flavor, project_dir: &Path, paths: &KicadPaths) -> Self {
        Self {
            flavor,
            project_table: project_dir.join(flavor.table_file_name()),
            global_table: paths.template().join(flavor.table_file_name()),
            project: Vec::new(),
            global: Vec::new(),
            version: None,
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn table_path(&self, level: Level) -> &Path {
        match level {
            Level::Project => &self.project_table,
            Level::Global => &self.global_table,
        }
    }

    pub fn entries(&self, level: Level) -> &[LibraryEntry] {
        match level {
            Level::Project => &self.project,
            Level::Global => &self.global,
        }
    }

    pub(crate) fn entries_mut(&mut self, level: Level) -> &mut Vec<LibraryEntry> {
        match level {
            Level::Project => &mut self.project,
            Level::Global => &mut self.global,
        }
    }

    /// Every entry with its level, project entries first.
    pub fn iter(&self) -> impl Iterator<Item = (Level, &LibraryEntry)> {
        self.project
            .iter()
            .map(|e| (Level::Project, e))
            .chain(self.global.iter().map(|e| (Level::Global, e)))
    }

    pub fn find(&self, level: Level, name: &str) -> Option<&LibraryEntry> {
        self.entries(level).iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_empty() && self.global.is_empty()
    }

    pub fn len(&self) -> usize {
        self.project.len() + self.global.len()
    }

    pub fn load_all(&mut self, listener: &mut dyn Listener) {
        self.load(Level::Project, listener);
        self.load(Level::Global, listener);
    }

    pub fn load(&mut self, level: Level, listener: &mut dyn Listener) {
        let path = self.table_path(level).to_path_buf();
        self.load_from(level, &path, listener);
    }

    /// Replaces the entries of `level` with the records of `table`.
    pub fn load_from(&mut self, level: Level, table: &Path, listener: &mut dyn Listener) {
        self.entries_mut(level).clear();
        if level == Level::Project {
            self.version = None;
        }

        if !table.exists() {
            match level {
                Level::Global => emit(
                    listener,
                    Notification::log(
                        Severity::Warning,
                        format!("Global library table '{}' not found", table.display()),
                    )
                    .with_path(table),
                ),
                Level::Project => tracing::debug!("no project table at {}", table.display()),
            }
            return;
        }

        let content = match std::fs::read_to_string(table) {
            Ok(content) => content,
            Err(e) => {
                emit(
                    listener,
                    Notification::log(
                        Severity::Warning,
                        format!("Cannot read '{}': {}", table.display(), e),
                    )
                    .with_path(table),
                );
                return;
            }
        };

        let mut version = None;
        let mut entries = Vec::new();
        for line in content.lines() {
            match scan_line(line) {
                Some(LineForm::Library(record)) => entries.push(LibraryEntry::from(record)),
                Some(_) => {}
                None => {
                    if version.is_none() {
                        version = scan_sexp(line)
                            .filter(|sexp| sexp.head() == Some("version"))
                            .and_then(|sexp| sexp.atom_at(1).map(str::to_string));
                    }
                }
            }
        }

        tracing::debug!(
            "loaded {} {} entries from {}",
            entries.len(),
            level,
            table.display()
        );
        *self.entries_mut(level) = entries;
        if level == Level::Project {
            self.version = version;
        }
    }

    pub fn render_project_table(&self) -> String {
        let mut out = format!("({}\n", self.flavor.table_header());
        if let Some(version) = &self.version {
            out.push_str(&format!("  (version {})\n", version));
        }
        for entry in &self.project {
            out.push_str(&entry.to_table_line());
            out.push('\n');
        }
        out.push_str(")\n");
        out
    }

    /// Writes the project table. The global table is never written.
    pub fn save(&self, listener: &mut dyn Listener) -> bool {
        let path = &self.project_table;
        match std::fs::write(path, self.render_project_table()) {
            Ok(()) => {
                tracing::info!("saved {} entries to {}", self.project.len(), path.display());
                true
            }
            Err(e) => {
                emit(
                    listener,
                    Notification::log(
                        Severity::Error,
                        format!("Cannot write '{}': {}", path.display(), e),
                    )
                    .with_path(path),
                );
                false
            }
        }
    }

    /// Saves the project table and reads it back.
    pub fn persist_and_reload(&mut self, listener: &mut dyn Listener) -> bool {
        let saved = self.save(listener);
        self.load(Level::Project, listener);
        saved
    }

    fn refuse_global(level: Level, listener: &mut dyn Listener) -> bool {
        if level == Level::Global {
            emit(
                listener,
                Notification::log(Severity::Warning, "The global library table is read-only"),
            );
            return true;
        }
        false
    }

    /// Replaces kind and uri of `name`, or appends a new entry, then persists
    /// and reloads.
    pub fn add_or_update(
        &mut self,
        name: &str,
        kind: LibraryKind,
        uri: &str,
        level: Level,
        listener: &mut dyn Listener,
    ) -> bool {
        if Self::refuse_global(level, listener) {
            return false;
        }
        let verb = match self.upsert(name, kind, uri) {
            Upsert::Added => "Adding",
            Upsert::Updated | Upsert::Unchanged => "Updating",
        };
        emit(
            listener,
            Notification::new(
                Severity::Info,
                NoticeKind::RowUpdated { level, name: name.to_string() },
                format!("{} '{}' as '{}'", verb, name, uri),
            ),
        );
        self.persist_and_reload(listener)
    }

    pub(crate) fn upsert(&mut self, name: &str, kind: LibraryKind, uri: &str) -> Upsert {
        match self.project.iter_mut().find(|e| e.name == name) {
            Some(entry) if entry.kind == kind && entry.uri == uri => Upsert::Unchanged,
            Some(entry) => {
                entry.kind = kind;
                entry.uri = uri.to_string();
                Upsert::Updated
            }
            None => {
                self.project.push(LibraryEntry::new(name, kind, uri));
                Upsert::Added
            }
        }
    }

    pub fn remove_by_name(&mut self, name: &str, level: Level, listener: &mut dyn Listener) -> bool {
        if Self::refuse_global(level, listener) {
            return false;
        }
        let before = self.project.len();
        self.project.retain(|e| e.name != name);
        if self.project.len() == before {
            emit(
                listener,
                Notification::log(Severity::Warning, format!("No library named '{}'", name)),
            );
            return false;
        }
        self.persist_and_reload(listener)
    }

    /// Edits one column of `name` and persists.
    pub fn change_field(
        &mut self,
        name: &str,
        field: EntryField,
        value: &str,
        level: Level,
        listener: &mut dyn Listener,
    ) -> bool {
        if Self::refuse_global(level, listener) {
            return false;
        }
        if field == EntryField::Name && name != value && self.find(level, value).is_some() {
            emit(
                listener,
                Notification::new(
                    Severity::Warning,
                    NoticeKind::DuplicateLibrary { name: value.to_string() },
                    format!("Duplicate Libraries {}", value),
                ),
            );
            return false;
        }
        let Some(entry) = self.project.iter_mut().find(|e| e.name == name) else {
            emit(
                listener,
                Notification::log(Severity::Warning, format!("No library named '{}'", name)),
            );
            return false;
        };
        match field {
            EntryField::Name => entry.name = value.to_string(),
            EntryField::Kind => entry.kind = LibraryKind::parse(value),
            EntryField::Uri => entry.uri = value.to_string(),
            EntryField::Options => entry.options = value.to_string(),
            EntryField::Description => entry.description = value.to_string(),
        }
        let updated = entry.name.clone();
        emit(
            listener,
            Notification::new(
                Severity::Debug,
                NoticeKind::RowUpdated { level, name: updated },
                format!("Library '{}' updated", name),
            ),
        );
        self.save(listener)
    }

    /// Rewrites every project uri relative to the project, in memory.
    /// Returns whether anything changed.
    pub fn convert_all_to_relative(&mut self, resolver: &PathResolver, library_root: &Path) -> bool {
        let mut changed = false;
        let library_root = to_slash(library_root);
        for entry in &mut self.project {
            if let Relative::Converted(relative) = resolver.to_relative(&entry.uri, &library_root) {
                if relative != entry.uri {
                    tracing::info!("{}: '{}' -> '{}'", entry.name, entry.uri, relative);
                    entry.uri = relative;
                    changed = true;
                }
            }
        }
        changed
    }
}
