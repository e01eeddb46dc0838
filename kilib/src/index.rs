//! Library name → member names, read from disk.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{Level, LibraryCatalog};
use crate::error::KilibError;
use crate::notify::{emit, Listener, NoticeKind, Notification, Severity};
use crate::paths::PathResolver;

/// Splits `Lib:Member`. Anything but exactly two non-empty parts is malformed.
pub fn split_specifier(specifier: &str) -> Option<(&str, &str)> {
    let mut parts = specifier.split(':');
    let library = parts.next()?;
    let member = parts.next()?;
    if parts.next().is_some() || library.is_empty() || member.is_empty() {
        return None;
    }
    Some((library, member))
}

#[derive(Debug, Clone, Default)]
pub struct MemberIndex {
    libraries: BTreeMap<String, BTreeSet<String>>,
}

impl MemberIndex {
    /// Lists every catalog entry. Project entries come first, so a project
    /// library shadows a global one of the same name.
    pub fn build(catalog: &LibraryCatalog, resolver: &PathResolver, listener: &mut dyn Listener) -> Self {
        let flavor = catalog.flavor();
        let mut index = MemberIndex::default();
        let mut seen = BTreeSet::new();

        for (level, entry) in catalog.iter() {
            if !seen.insert(entry.name.as_str()) {
                emit(
                    listener,
                    Notification::new(
                        Severity::Warning,
                        NoticeKind::DuplicateLibrary { name: entry.name.clone() },
                        format!("Duplicate Libraries {}", entry.name),
                    ),
                );
                continue;
            }

            let location = resolver.resolve(&entry.uri);
            let members = match flavor.list_members(&entry.kind, &location) {
                Ok(members) => members,
                Err(KilibError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    emit(
                        listener,
                        Notification::failed(format!("'{}' doesn't exist", location.display()))
                            .with_path(&location),
                    );
                    Vec::new()
                }
                Err(e) => {
                    emit(
                        listener,
                        Notification::log(
                            Severity::Warning,
                            format!("Cannot list '{}': {}", location.display(), e),
                        )
                        .with_path(&location),
                    );
                    Vec::new()
                }
            };

            if members.is_empty() {
                emit(listener, library_error(level, &entry.name));
                continue;
            }
            tracing::debug!("{} '{}': {} members", level, entry.name, members.len());
            index.insert(&entry.name, members);
        }
        index
    }

    pub fn insert(&mut self, library: &str, members: impl IntoIterator<Item = String>) {
        self.libraries
            .entry(library.to_string())
            .or_default()
            .extend(members);
    }

    pub fn has_member(&self, specifier: &str) -> bool {
        let Some((library, member)) = split_specifier(specifier) else {
            return false;
        };
        self.libraries
            .get(library)
            .is_some_and(|members| members.contains(member))
    }

    pub fn contains_library(&self, library: &str) -> bool {
        self.libraries.contains_key(library)
    }

    pub fn members(&self, library: &str) -> Option<&BTreeSet<String>> {
        self.libraries.get(library)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

fn library_error(level: Level, name: &str) -> Notification {
    Notification::new(
        Severity::Error,
        NoticeKind::LibraryError { level, name: name.to_string() },
        format!("{} library '{}' has no members", level, name),
    )
}
