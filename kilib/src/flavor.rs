//! Footprint vs. symbol libraries.
//!
//! Both kinds of library are managed the same way; they differ in file names,
//! extensions and in how a library's members are listed. [`Flavor`] carries
//! those differences so the rest of the crate is written once.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::LibraryKind;
use crate::error::KilibError;
use crate::parser::{legacy, SExpParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Footprint,
    Symbol,
}

impl Flavor {
    pub fn label(self) -> &'static str {
        match self {
            Flavor::Footprint => "footprint",
            Flavor::Symbol => "symbol",
        }
    }

    pub fn table_file_name(self) -> &'static str {
        match self {
            Flavor::Footprint => "fp-lib-table",
            Flavor::Symbol => "sym-lib-table",
        }
    }

    pub fn table_header(self) -> &'static str {
        match self {
            Flavor::Footprint => "fp_lib_table",
            Flavor::Symbol => "sym_lib_table",
        }
    }

    pub fn legacy_extension(self) -> &'static str {
        match self {
            Flavor::Footprint => "mod",
            Flavor::Symbol => "lib",
        }
    }

    /// First token of the lines naming members in a legacy library.
    pub fn legacy_marker(self) -> &'static str {
        match self {
            Flavor::Footprint => "Li",
            Flavor::Symbol => "DEF",
        }
    }

    pub fn modern_extension(self) -> &'static str {
        match self {
            Flavor::Footprint => "kicad_mod",
            Flavor::Symbol => "kicad_sym",
        }
    }

    /// Modern footprint libraries are `.pretty` directories; everything else
    /// is a single file.
    pub fn is_directory_library(self, kind: &LibraryKind) -> bool {
        self == Flavor::Footprint && *kind == LibraryKind::Modern
    }

    /// Member names of the library stored at `location`.
    pub fn list_members(self, kind: &LibraryKind, location: &Path) -> Result<Vec<String>, KilibError> {
        match (self, kind) {
            (_, LibraryKind::Legacy) => {
                let content = std::fs::read_to_string(location)?;
                Ok(legacy::member_names(&content, self.legacy_marker()))
            }
            (Flavor::Footprint, LibraryKind::Modern) => list_footprint_directory(location),
            (Flavor::Symbol, LibraryKind::Modern) => list_symbol_file(location),
            (_, LibraryKind::Other(_)) => Ok(Vec::new()),
        }
    }

    /// Library that a member file picked by the user belongs to: its name,
    /// kind and on-disk location.
    pub fn library_of(self, member_file: &Path) -> Option<(String, LibraryKind, PathBuf)> {
        let extension = member_file.extension()?.to_str()?.to_ascii_lowercase();
        let stem = |path: &Path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        };
        if extension == self.legacy_extension() {
            return Some((stem(member_file)?, LibraryKind::Legacy, member_file.to_path_buf()));
        }
        if extension != self.modern_extension() {
            return None;
        }
        match self {
            Flavor::Footprint => {
                let library = member_file.parent()?;
                Some((stem(library)?, LibraryKind::Modern, library.to_path_buf()))
            }
            Flavor::Symbol => Some((stem(member_file)?, LibraryKind::Modern, member_file.to_path_buf())),
        }
    }
}

fn list_footprint_directory(dir: &Path) -> Result<Vec<String>, KilibError> {
    let mut members = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_footprint = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("kicad_mod"));
        if is_footprint && path.is_file() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                members.push(stem.to_string());
            }
        }
    }
    members.sort();
    Ok(members)
}

fn list_symbol_file(file: &Path) -> Result<Vec<String>, KilibError> {
    let content = std::fs::read_to_string(file)?;
    let library = SExpParser::new(&content).parse()?;
    Ok(library
        .get_all("symbol")
        .into_iter()
        .filter_map(|symbol| symbol.atom_at(1))
        .map(|name| match name.split_once(':') {
            Some((_, member)) => member.to_string(),
            None => name.to_string(),
        })
        .collect())
}
