//! kilib - KiCad library-table consistency tools
//!
//! Checks that every footprint and symbol referenced by a project's
//! schematics can be found in the project's library tables, repairs tables
//! whose paths went stale, and writes vendor part numbers and BOMs.
//!
//! # Quick Start
//!
//! ```no_run
//! use kilib::prelude::*;
//! use std::path::Path;
//!
//! let mut log: Vec<Notification> = Vec::new();
//! let manager = LibraryManager::open(
//!     Flavor::Footprint,
//!     Path::new("my_board"),
//!     &KicadPaths::from_env(),
//!     &mut log,
//! ).unwrap();
//!
//! let report = manager.check(&mut log).unwrap();
//! for missing in &report.missing {
//!     println!("missing: {}", missing);
//! }
//! ```
//!
//! # Features
//!
//! - **Library tables**: load, edit and save `fp-lib-table` / `sym-lib-table`
//! - **Checking**: every `Footprint` / `lib_id` in the schematics against the libraries
//! - **Repair**: relative paths, relocated libraries, libraries found by member
//! - **Part numbers**: Digi-Key, LCSC and MPN properties injected into schematics
//! - **Text replace**: regex mappings applied line by line to schematics
//! - **BOM** and **3D model path** checks

pub mod bom;
pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod flavor;
pub mod index;
pub mod models;
pub mod notify;
pub mod parser;
pub mod parts;
pub mod patch;
pub mod paths;
pub mod repair;
pub mod replace;
pub mod validate;

// Re-export main types
pub use bom::{compare_references, Bom, BomLine};
pub use catalog::{EntryField, Level, LibraryCatalog, LibraryEntry, LibraryKind};
pub use config::KicadPaths;
pub use crate::core::LibraryManager;
pub use error::KilibError;
pub use flavor::Flavor;
pub use index::MemberIndex;
pub use notify::{Listener, NoticeKind, Notification, Severity, Silent};
pub use parts::{PartRecord, PartTable, VendorField};
pub use paths::{PathResolver, Relative};
pub use repair::RepairOutcome;
pub use replace::{ReplaceList, Rewriter};
pub use validate::CheckReport;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Bom, CheckReport, Flavor, KicadPaths, KilibError, Level, LibraryKind, LibraryManager,
        Listener, Notification, PartRecord, PartTable, RepairOutcome, Severity, VendorField,
    };
}
