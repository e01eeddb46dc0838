//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn kilib_cli() -> Command {
    cargo_bin_cmd!("kilib-cli")
}

/// A project in `<tmp>/proj` next to a library tree in `<tmp>/libs`.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("proj")).unwrap();
        fs::create_dir_all(dir.path().join("libs")).unwrap();
        Self { dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    fn footprint(&self, dir: &str, name: &str) {
        self.write(
            &format!("{}/{}.kicad_mod", dir, name),
            &format!("(footprint \"{}\" (version 20221018) (generator pcbnew)\n)\n", name),
        );
    }

    fn fp_table(&self, entries: &[(&str, &str)]) {
        let mut table = String::from("(fp_lib_table\n  (version 7)\n");
        for (name, uri) in entries {
            table.push_str(&format!(
                "  (lib (name \"{}\")(type \"KiCad\")(uri \"{}\")(options \"\")(descr \"\"))\n",
                name, uri
            ));
        }
        table.push_str(")\n");
        self.write("proj/fp-lib-table", &table);
    }

    /// `kilib-cli <args> --kicad-dir <tmp>/kicad`, isolated from the host install.
    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = kilib_cli();
        cmd.args(args)
            .arg("--kicad-dir")
            .arg(self.path("kicad"))
            .env_remove("KICAD_DATA_DIR")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn sheet(symbols: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("(kicad_sch (version 20230121) (generator eeschema)\n");
    for (reference, value, footprint) in symbols {
        out.push_str(&format!(
            "  (symbol (lib_id \"Device:R\") (at 100 50 0) (unit 1)\n\
             \x20   (property \"Reference\" \"{}\" (id 0) (at 101.6 48.26 0)\n\
             \x20   )\n\
             \x20   (property \"Value\" \"{}\" (id 1) (at 101.6 52.07 0)\n\
             \x20   )\n\
             \x20   (property \"Footprint\" \"{}\" (id 2) (at 100 50 0)\n\
             \x20   )\n\
             \x20   (pin \"1\" (uuid 00000000-0000-0000-0000-000000000001))\n\
             \x20 )\n",
            reference, value, footprint
        ));
    }
    out.push_str(")\n");
    out
}

fn proj(fixture: &Fixture) -> String {
    fixture.path("proj").to_string_lossy().into_owned()
}

#[test]
fn test_cli_help() {
    let mut cmd = kilib_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("KiCad"));
}

#[test]
fn test_cli_version() {
    let mut cmd = kilib_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_good_project() {
    let fx = Fixture::new();
    fx.footprint("proj/Local.pretty", "R_0603");
    fx.fp_table(&[("Local", "${KIPRJMOD}/Local.pretty")]);
    fx.write("proj/board.kicad_sch", &sheet(&[("R1", "10k", "Local:R_0603")]));

    fx.cmd(&["check", proj(&fx).as_str(), "--libraries", "footprints"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'board.kicad_sch' is Good"));
}

#[test]
fn test_cli_check_missing_fails() {
    let fx = Fixture::new();
    fx.footprint("proj/Local.pretty", "R_0603");
    fx.fp_table(&[("Local", "${KIPRJMOD}/Local.pretty")]);
    fx.write("proj/board.kicad_sch", &sheet(&[("U1", "X", "LibX:PartY")]));

    fx.cmd(&["check", proj(&fx).as_str(), "--libraries", "footprints"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("'U1':'LibX:PartY' was not found"))
        .stdout(predicate::str::contains("1 unresolved footprint references"));
}

#[test]
fn test_cli_check_json() {
    let fx = Fixture::new();
    fx.footprint("proj/Local.pretty", "R_0603");
    fx.fp_table(&[("Local", "${KIPRJMOD}/Local.pretty")]);
    fx.write(
        "proj/board.kicad_sch",
        &sheet(&[("U1", "X", "LibX:PartY"), ("U2", "X", "LibX:PartY")]),
    );

    let output = fx
        .cmd(&["check", proj(&fx).as_str(), "--libraries", "footprints", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["result"][0]["libraries"], "footprint");
    assert_eq!(json["result"][0]["report"]["missing"], serde_json::json!(["LibX:PartY"]));
    assert!(json["notifications"].as_array().unwrap().len() >= 2);
}

#[test]
fn test_cli_fix_relocates_library() {
    let fx = Fixture::new();
    fx.footprint("libs/new/Conn.pretty", "USB_C");
    fx.fp_table(&[("Conn", "${KIPRJMOD}/../libs/old/Conn.pretty")]);
    fx.write("proj/board.kicad_sch", &sheet(&[("J1", "USB", "Conn:USB_C")]));

    fx.cmd(&["fix", proj(&fx).as_str(), "--libraries", "footprints"])
        .assert()
        .success()
        .stdout(predicate::str::contains("relocated"));
    assert!(fx.read("proj/fp-lib-table").contains("${KIPRJMOD}/../libs/new/Conn.pretty"));
}

#[test]
fn test_cli_libs_lists_entries() {
    let fx = Fixture::new();
    fx.fp_table(&[("Local", "${KIPRJMOD}/Local.pretty")]);

    fx.cmd(&["libs", proj(&fx).as_str(), "--libraries", "footprints"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Local"))
        .stdout(predicate::str::contains("${KIPRJMOD}/Local.pretty"));
}

#[test]
fn test_cli_import_library() {
    let fx = Fixture::new();
    fx.footprint("libs/Conn.pretty", "USB_C");
    let member = fx.path("libs/Conn.pretty/USB_C.kicad_mod");

    fx.cmd(&["import", &*member.to_string_lossy(), "--project", proj(&fx).as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Conn -> ${KIPRJMOD}/../libs/Conn.pretty"));
    assert!(fx.read("proj/fp-lib-table").contains("(name \"Conn\")"));
}

#[test]
fn test_cli_patch_inserts_part_numbers() {
    let fx = Fixture::new();
    fx.write("proj/board.kicad_sch", &sheet(&[("R1", "10k", "R_0603")]));

    fx.cmd(&["patch", proj(&fx).as_str(), "--part", "10k;R_0603;D2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("patched with 1 properties"));
    assert!(fx
        .read("proj/board.kicad_sch")
        .contains("(property \"Digi-Key_PN\" \"D2\" (id 3)"));
    assert!(fx.path("proj/board.kicad_sch_old").exists());
}

#[test]
fn test_cli_patch_rejects_bad_part() {
    let fx = Fixture::new();

    fx.cmd(&["patch", proj(&fx).as_str(), "--part", ";R_0603"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("has no value"));
}

#[test]
fn test_cli_bom() {
    let fx = Fixture::new();
    fx.write(
        "proj/board.kicad_sch",
        &sheet(&[("R2", "10k", "R_0603"), ("R1", "10k", "R_0603")]),
    );

    fx.cmd(&["bom", proj(&fx).as_str()]).assert().success();
    assert!(fx.read("proj/bom.csv").contains("\"2\",\"R1,R2\",\"10k\""));
}

#[test]
fn test_cli_replace_rewrites_lines() {
    let fx = Fixture::new();
    fx.write("proj/board.kicad_sch", &sheet(&[("R1", "10k", "Old_Lib:R_0603")]));

    fx.cmd(&["replace", proj(&fx).as_str(), "--map", r"Old_Lib:(\w+)", "New_Lib:$1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'board.kicad_sch': 1 lines replaced"));
    let text = fx.read("proj/board.kicad_sch");
    assert!(text.contains("\"New_Lib:R_0603\""));
    assert!(!text.contains("Old_Lib"));
    assert!(fx.path("proj/board.kicad_sch_old").exists());
}

#[test]
fn test_cli_replace_rejects_bad_pattern() {
    let fx = Fixture::new();
    fx.write("proj/board.kicad_sch", &sheet(&[("R1", "10k", "R_0603")]));

    fx.cmd(&["replace", proj(&fx).as_str(), "--map", "(open", "x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("compiling replace patterns"));
    assert!(!fx.path("proj/board.kicad_sch_old").exists());
}

#[test]
fn test_cli_models_reports_absolute_paths() {
    let fx = Fixture::new();
    fx.write(
        "proj/board.kicad_pcb",
        "(kicad_pcb (version 20221018) (generator pcbnew)\n\
         \x20 (footprint \"R_0603\" (layer \"F.Cu\")\n\
         \x20   (fp_text reference \"R1\" (at 0 0) (layer \"F.SilkS\")\n\
         \x20   )\n\
         \x20   (model \"/opt/models/R_0603.wrl\"\n\
         \x20   )\n\
         \x20 )\n\
         )\n",
    );

    fx.cmd(&["models", proj(&fx).as_str()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("'R1': model '/opt/models/R_0603.wrl' is not relative"));
}

#[test]
fn test_cli_missing_project() {
    let fx = Fixture::new();

    fx.cmd(&["check", &*fx.path("nope").to_string_lossy()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}
