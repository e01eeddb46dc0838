//! Library service shared by the CLI and embedding applications.
//! One [`LibraryManager`] per project and flavor.

use std::path::{Path, PathBuf};

use crate::catalog::{Level, LibraryCatalog, LibraryEntry};
use crate::config::KicadPaths;
use crate::error::KilibError;
use crate::flavor::Flavor;
use crate::index::MemberIndex;
use crate::notify::{emit, Listener, Notification, Severity};
use crate::paths::PathResolver;
use crate::repair::{self, RepairOutcome};
use crate::validate::{self, CheckReport};

pub struct LibraryManager {
    flavor: Flavor,
    resolver: PathResolver,
    catalog: LibraryCatalog,
}

impl LibraryManager {
    /// Loads both tables of `project_dir`.
    pub fn open(
        flavor: Flavor,
        project_dir: &Path,
        paths: &KicadPaths,
        listener: &mut dyn Listener,
    ) -> Result<Self, KilibError> {
        if !project_dir.is_dir() {
            return Err(KilibError::ProjectNotFound(project_dir.to_path_buf()));
        }
        let mut catalog = LibraryCatalog::new(flavor, project_dir, paths);
        catalog.load_all(listener);
        Ok(Self {
            flavor,
            resolver: PathResolver::new(project_dir, paths),
            catalog,
        })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn project_dir(&self) -> &Path {
        self.resolver.project_dir()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn catalog(&self) -> &LibraryCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut LibraryCatalog {
        &mut self.catalog
    }

    pub(crate) fn split_mut(&mut self) -> (&PathResolver, &mut LibraryCatalog) {
        (&self.resolver, &mut self.catalog)
    }

    pub fn reload(&mut self, listener: &mut dyn Listener) {
        self.catalog.load_all(listener);
    }

    pub fn build_index(&self, listener: &mut dyn Listener) -> MemberIndex {
        MemberIndex::build(&self.catalog, &self.resolver, listener)
    }

    /// Re-indexes the catalog and checks every schematic of the project.
    pub fn check(&self, listener: &mut dyn Listener) -> Result<CheckReport, KilibError> {
        if self.catalog.is_empty() {
            emit(
                listener,
                Notification::log(
                    Severity::Warning,
                    format!("No {} libraries loaded; nothing to check against", self.flavor.label()),
                ),
            );
            return Ok(CheckReport::default());
        }
        let index = self.build_index(listener);
        validate::check_all(self.flavor, self.project_dir(), &index, listener)
    }

    /// See [`repair::fix`].
    pub fn repair(
        &mut self,
        missing: &[String],
        search_root: &Path,
        listener: &mut dyn Listener,
    ) -> Result<RepairOutcome, KilibError> {
        repair::fix(self, missing, search_root, listener)
    }

    /// Adds the library that `member_file` belongs to, relative to the project.
    pub fn import_library(
        &mut self,
        member_file: &Path,
        library_root: &Path,
        listener: &mut dyn Listener,
    ) -> Option<LibraryEntry> {
        let Some((name, kind, location)) = self.flavor.library_of(member_file) else {
            emit(
                listener,
                Notification::log(
                    Severity::Warning,
                    format!(
                        "'{}' is not a {} library file",
                        member_file.display(),
                        self.flavor.label()
                    ),
                ),
            );
            return None;
        };
        let uri = self.resolver.relativize(&location, library_root);
        if !self.catalog.add_or_update(&name, kind, &uri, Level::Project, listener) {
            return None;
        }
        self.catalog.find(Level::Project, &name).cloned()
    }

    pub fn table_path(&self) -> PathBuf {
        self.catalog.table_path(Level::Project).to_path_buf()
    }
}
