//! Location of the KiCad installation's shared data.
//!
//! The global library tables and the stock libraries live under one data
//! directory (`/usr/share/kicad` on Linux). Every derived directory can be
//! overridden on its own, from code, from a JSON file, or from the same
//! environment variables KiCad itself exports.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KilibError;

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "KICAD_DATA_DIR";

/// KiCad releases whose versioned path variables are understood.
pub const KICAD_VERSIONS: [u8; 4] = [6, 7, 8, 9];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KicadPaths {
    pub data_dir: PathBuf,
    pub footprint_dir: Option<PathBuf>,
    pub symbol_dir: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
}

impl Default for KicadPaths {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

#[cfg(target_os = "macos")]
fn default_data_dir() -> PathBuf {
    PathBuf::from("/Applications/KiCad/kicad.app/Contents/SharedSupport")
}

#[cfg(target_os = "windows")]
fn default_data_dir() -> PathBuf {
    PathBuf::from("C:/Program Files/KiCad/8.0/share/kicad")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_data_dir() -> PathBuf {
    PathBuf::from("/usr/share/kicad")
}

impl KicadPaths {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            footprint_dir: None,
            symbol_dir: None,
            model_dir: None,
            template_dir: None,
        }
    }

    /// Platform defaults, then `KICAD_DATA_DIR`, then the newest
    /// `KICADn_FOOTPRINT_DIR` / `KICADn_SYMBOL_DIR` / `KICADn_3DMODEL_DIR` set.
    pub fn from_env() -> Self {
        let mut paths = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::with_data_dir(dir),
            _ => Self::default(),
        };
        paths.footprint_dir = versioned_env("FOOTPRINT_DIR").or(paths.footprint_dir);
        paths.symbol_dir = versioned_env("SYMBOL_DIR").or(paths.symbol_dir);
        paths.model_dir = versioned_env("3DMODEL_DIR").or(paths.model_dir);
        paths
    }

    pub fn from_json_file(path: &Path) -> Result<Self, KilibError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KilibError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn footprints(&self) -> PathBuf {
        self.footprint_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("footprints"))
    }

    pub fn symbols(&self) -> PathBuf {
        self.symbol_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("symbols"))
    }

    pub fn models(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("3dmodels"))
    }

    /// Directory holding the global `fp-lib-table` / `sym-lib-table`.
    pub fn template(&self) -> PathBuf {
        self.template_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("template"))
    }
}

fn versioned_env(suffix: &str) -> Option<PathBuf> {
    KICAD_VERSIONS.iter().rev().find_map(|v| {
        std::env::var_os(format!("KICAD{}_{}", v, suffix))
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}
