//! Best-effort repair of a project's library table.
//!
//! Three passes, each persisted and re-checked when it changes anything:
//! relative-path normalization, healing of library paths that no longer
//! exist, and searching for the libraries of still-missing members.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{Level, LibraryKind, Upsert};
use crate::core::LibraryManager;
use crate::error::KilibError;
use crate::flavor::Flavor;
use crate::index::split_specifier;
use crate::notify::{emit, Listener, Notification};
use crate::paths::{exact, find_directory, find_file, find_files, wildcard};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    /// Absolute uris were rewritten relative to the project.
    pub normalized: bool,
    /// Libraries whose uri was pointed at a new location.
    pub healed_paths: Vec<String>,
    /// Specifiers resolved by adding or redirecting a library.
    pub healed_members: Vec<String>,
    /// Specifiers still unresolved after the last check.
    pub remaining: Vec<String>,
}

impl RepairOutcome {
    pub fn changed(&self) -> bool {
        self.normalized || !self.healed_paths.is_empty() || !self.healed_members.is_empty()
    }
}

/// Repairs the project table of `manager` using libraries found below
/// `search_root`. With an empty `missing` list a check runs first.
pub fn fix(
    manager: &mut LibraryManager,
    missing: &[String],
    search_root: &Path,
    listener: &mut dyn Listener,
) -> Result<RepairOutcome, KilibError> {
    let mut missing = if missing.is_empty() {
        manager.check(listener)?.missing
    } else {
        missing.to_vec()
    };
    let mut outcome = RepairOutcome::default();

    let (resolver, catalog) = manager.split_mut();
    if catalog.convert_all_to_relative(resolver, search_root) {
        outcome.normalized = true;
        missing = persist_and_recheck(manager, listener)?;
    }

    outcome.healed_paths = heal_paths(manager, search_root, listener)?;
    if !outcome.healed_paths.is_empty() {
        missing = persist_and_recheck(manager, listener)?;
    }

    for specifier in &missing {
        if heal_member(manager, specifier, search_root, listener)? {
            outcome.healed_members.push(specifier.clone());
        }
    }
    if !outcome.healed_members.is_empty() {
        missing = persist_and_recheck(manager, listener)?;
    }

    for specifier in &missing {
        emit(
            listener,
            Notification::failed(format!("'{}' could not be repaired", specifier)),
        );
    }
    outcome.remaining = missing;
    tracing::info!(
        normalized = outcome.normalized,
        paths = outcome.healed_paths.len(),
        members = outcome.healed_members.len(),
        remaining = outcome.remaining.len(),
        "repair finished"
    );
    Ok(outcome)
}

fn persist_and_recheck(
    manager: &mut LibraryManager,
    listener: &mut dyn Listener,
) -> Result<Vec<String>, KilibError> {
    manager.catalog_mut().persist_and_reload(listener);
    Ok(manager.check(listener)?.missing)
}

/// Points project entries whose location is gone at a file or directory of
/// the same name below `root`.
fn heal_paths(
    manager: &mut LibraryManager,
    root: &Path,
    listener: &mut dyn Listener,
) -> Result<Vec<String>, KilibError> {
    let (resolver, catalog) = manager.split_mut();
    let flavor = catalog.flavor();
    let mut healed = Vec::new();

    for entry in catalog.entries_mut(Level::Project) {
        if matches!(entry.kind, LibraryKind::Other(_)) {
            continue;
        }
        let location = resolver.resolve(&entry.uri);
        if location.exists() {
            continue;
        }
        let Some(name) = location.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let found = if flavor.is_directory_library(&entry.kind) {
            find_directory(root, name)
        } else {
            find_file(root, &[exact(name)?])
        };
        let Some(found) = found else {
            tracing::debug!("no '{}' below {}", name, root.display());
            continue;
        };

        let uri = resolver.relativize(&found, root);
        emit(
            listener,
            Notification::passed(format!("Library '{}' relocated to '{}'", entry.name, uri))
                .with_path(&found),
        );
        entry.uri = uri;
        healed.push(entry.name.clone());
    }
    Ok(healed)
}

#[derive(Debug)]
struct Hit {
    kind: LibraryKind,
    location: PathBuf,
}

fn heal_member(
    manager: &mut LibraryManager,
    specifier: &str,
    root: &Path,
    listener: &mut dyn Listener,
) -> Result<bool, KilibError> {
    let Some((library, member)) = split_specifier(specifier) else {
        return Ok(false);
    };
    let (resolver, catalog) = manager.split_mut();
    let Some(hit) = locate_member(catalog.flavor(), root, library, member)? else {
        tracing::debug!("'{}' not found below {}", specifier, root.display());
        return Ok(false);
    };

    let uri = resolver.relativize(&hit.location, root);
    if catalog.upsert(library, hit.kind, &uri) == Upsert::Unchanged {
        return Ok(false);
    }
    emit(
        listener,
        Notification::passed(format!("Found '{}' in '{}'", specifier, uri)).with_path(&hit.location),
    );
    Ok(true)
}

/// First library below `root` holding `member`, by search stage:
/// a subdirectory named after the library, then the whole root, then
/// legacy files whose names resemble the library or the member.
fn locate_member(
    flavor: Flavor,
    root: &Path,
    library: &str,
    member: &str,
) -> Result<Option<Hit>, KilibError> {
    let extension = flavor.legacy_extension();

    let library_dir = root.join(library);
    if library_dir.is_dir() {
        if let Some(hit) = find_modern(flavor, &library_dir, library, member)? {
            return Ok(Some(hit));
        }
        let any_legacy = wildcard(&format!("*.{}", extension))?;
        if let Some(hit) = find_legacy(flavor, &library_dir, &[any_legacy], member) {
            return Ok(Some(hit));
        }
    }

    if let Some(hit) = find_modern(flavor, root, library, member)? {
        return Ok(Some(hit));
    }
    let named = exact(&format!("{}.{}", library, extension))?;
    if let Some(hit) = find_legacy(flavor, root, &[named], member) {
        return Ok(Some(hit));
    }

    let escaped_library = glob::Pattern::escape(library);
    let escaped_member = glob::Pattern::escape(member);
    let similar = [
        wildcard(&format!("{}.{}", escaped_library, extension))?,
        wildcard(&format!("{}.{}", escaped_member, extension))?,
        wildcard(&format!("{}*.{}", escaped_library, extension))?,
        wildcard(&format!("{}*.{}", escaped_member, extension))?,
    ];
    Ok(find_legacy(flavor, root, &similar, member))
}

fn find_modern(
    flavor: Flavor,
    dir: &Path,
    library: &str,
    member: &str,
) -> Result<Option<Hit>, KilibError> {
    match flavor {
        Flavor::Footprint => {
            let file = exact(&format!("{}.{}", member, flavor.modern_extension()))?;
            Ok(find_file(dir, &[file])
                .and_then(|found| found.parent().map(Path::to_path_buf))
                .map(|location| Hit {
                    kind: LibraryKind::Modern,
                    location,
                }))
        }
        Flavor::Symbol => {
            let file = exact(&format!("{}.{}", library, flavor.modern_extension()))?;
            Ok(first_listing(flavor, LibraryKind::Modern, find_files(dir, &[file]), member))
        }
    }
}

fn find_legacy(flavor: Flavor, dir: &Path, patterns: &[glob::Pattern], member: &str) -> Option<Hit> {
    first_listing(flavor, LibraryKind::Legacy, find_files(dir, patterns), member)
}

fn first_listing(
    flavor: Flavor,
    kind: LibraryKind,
    candidates: Vec<PathBuf>,
    member: &str,
) -> Option<Hit> {
    candidates
        .into_iter()
        .find(|candidate| match flavor.list_members(&kind, candidate) {
            Ok(members) => members.iter().any(|m| m == member),
            Err(e) => {
                tracing::debug!("skipping {}: {}", candidate.display(), e);
                false
            }
        })
        .map(|location| Hit { kind, location })
}
