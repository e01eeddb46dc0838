//! Throw-away KiCad projects for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use kilib::KicadPaths;
use tempfile::TempDir;

/// A temp directory holding `proj/` (the project), `libs/` (a library
/// tree outside the project) and `kicad/` (the installation data dir).
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("proj")).unwrap();
        fs::create_dir_all(dir.path().join("libs")).unwrap();
        fs::create_dir_all(dir.path().join("kicad/template")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project(&self) -> PathBuf {
        self.root().join("proj")
    }

    pub fn libs(&self) -> PathBuf {
        self.root().join("libs")
    }

    pub fn paths(&self) -> KicadPaths {
        KicadPaths::with_data_dir(self.root().join("kicad"))
    }

    /// Writes `content` to `relative` below the workspace root.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root().join(relative)).unwrap()
    }

    /// Empty modern footprint `name` in the `.pretty` directory `dir`.
    pub fn footprint(&self, dir: &str, name: &str) -> PathBuf {
        self.write(
            &format!("{}/{}.kicad_mod", dir, name),
            &format!("(footprint \"{}\" (version 20221018) (generator pcbnew)\n  (layer \"F.Cu\")\n)\n", name),
        )
    }
}

pub fn fp_table(entries: &[(&str, &str, &str)]) -> String {
    table("fp_lib_table", entries)
}

pub fn sym_table(entries: &[(&str, &str, &str)]) -> String {
    table("sym_lib_table", entries)
}

fn table(header: &str, entries: &[(&str, &str, &str)]) -> String {
    let mut out = format!("({}\n  (version 7)\n", header);
    for (name, kind, uri) in entries {
        out.push_str(&format!(
            "  (lib (name \"{}\")(type \"{}\")(uri \"{}\")(options \"\")(descr \"\"))\n",
            name, kind, uri
        ));
    }
    out.push_str(")\n");
    out
}

/// Legacy `.mod` library listing `members`.
pub fn legacy_mod(members: &[&str]) -> String {
    let mut out = String::from("PCBNEW-LibModule-V1  2020-01-01\n# encoding utf-8\nUnits mm\n$INDEX\n");
    for member in members {
        out.push_str(&format!("{}\n", member));
    }
    out.push_str("$EndINDEX\n");
    for member in members {
        out.push_str(&format!(
            "$MODULE {m}\nPo 0 0 0 15 00000000 00000000 ~~\nLi {m}\n$EndMODULE {m}\n",
            m = member
        ));
    }
    out.push_str("$EndLIBRARY\n");
    out
}

/// Modern `.kicad_sym` library defining `members`.
pub fn symbol_lib(members: &[&str]) -> String {
    let mut out = String::from("(kicad_symbol_lib (version 20220914) (generator kicad_symbol_editor)\n");
    for member in members {
        out.push_str(&format!(
            "  (symbol \"{m}\" (in_bom yes) (on_board yes)\n    (property \"Reference\" \"U\" (at 0 0 0))\n    (symbol \"{m}_0_1\" (rectangle (start -5 5) (end 5 -5)))\n  )\n",
            m = member
        ));
    }
    out.push_str(")\n");
    out
}

/// A placed symbol, as eeschema writes it.
pub fn placed(lib_id: &str, reference: &str, value: &str, footprint: &str, extra: &[(&str, &str)]) -> String {
    let mut out = format!(
        "  (symbol (lib_id \"{}\") (at 100 50 0) (unit 1)\n    (in_bom yes) (on_board yes)\n",
        lib_id
    );
    let mut id = 0;
    for (key, val) in [("Reference", reference), ("Value", value), ("Footprint", footprint)]
        .into_iter()
        .chain(extra.iter().copied())
    {
        out.push_str(&format!(
            "    (property \"{}\" \"{}\" (id {}) (at 101.6 48.26 0)\n      (effects (font (size 1.27 1.27)))\n    )\n",
            key, val, id
        ));
        id += 1;
    }
    out.push_str(&format!(
        "    (pin \"1\" (uuid 00000000-0000-0000-0000-{:012}))\n    (pin \"2\" (uuid 00000000-0000-0000-0000-{:012}))\n  )\n",
        reference.len(),
        reference.len() + 1
    ));
    out
}

/// Full schematic around `blocks`, with a library-symbol section whose
/// properties must not be mistaken for placed symbols.
pub fn schematic(blocks: &[String]) -> String {
    let mut out = String::from(
        "(kicad_sch (version 20230121) (generator eeschema)\n\
         \x20 (lib_symbols\n\
         \x20   (symbol \"Device:R\" (pin_numbers hide) (in_bom yes) (on_board yes)\n\
         \x20     (property \"Reference\" \"R\" (id 0) (at 2.032 0 90)\n\
         \x20     )\n\
         \x20     (property \"Footprint\" \"Nowhere:Nothing\" (id 2) (at -1.778 0 90)\n\
         \x20     )\n\
         \x20     (symbol \"R_0_1\" (rectangle (start -1.016 -2.54) (end 1.016 2.54)))\n\
         \x20     (symbol \"R_1_1\"\n\
         \x20       (pin passive line (at 0 3.81 270) (length 1.27)\n\
         \x20       )\n\
         \x20     )\n\
         \x20   )\n\
         \x20 )\n",
    );
    for block in blocks {
        out.push_str(block);
    }
    out.push_str(")\n");
    out
}
