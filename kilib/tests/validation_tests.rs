//! Indexing libraries and checking schematics against them.

mod common;

use common::{fp_table, legacy_mod, placed, schematic, sym_table, symbol_lib, Workspace};
use kilib::prelude::*;
use kilib::NoticeKind;

fn open(ws: &Workspace, flavor: Flavor, log: &mut Vec<Notification>) -> LibraryManager {
    LibraryManager::open(flavor, &ws.project(), &ws.paths(), log).unwrap()
}

fn results(log: &[Notification], severity: Severity) -> Vec<&str> {
    log.iter()
        .filter(|n| n.is_result() && n.severity == severity)
        .map(|n| n.message.as_str())
        .collect()
}

#[test]
fn test_resolved_project_is_good() {
    let ws = Workspace::new();
    ws.footprint("proj/Local.pretty", "R_0603");
    ws.write("libs/old.mod", &legacy_mod(&["SOT23"]));
    ws.write(
        "proj/fp-lib-table",
        &fp_table(&[
            ("Local", "KiCad", "${KIPRJMOD}/Local.pretty"),
            ("Old", "Legacy", "${KIPRJMOD}/../libs/old.mod"),
        ]),
    );
    ws.write(
        "proj/board.kicad_sch",
        &schematic(&[
            placed("Device:R", "R1", "10k", "Local:R_0603", &[]),
            placed("Device:Q", "Q1", "BC847", "Old:SOT23", &[]),
            placed("power:GND", "#PWR01", "GND", "", &[]),
        ]),
    );

    let mut log = Vec::new();
    let manager = open(&ws, Flavor::Footprint, &mut log);
    let report = manager.check(&mut log).unwrap();

    assert!(report.passed(), "unexpected missing: {:?}", report.missing);
    assert_eq!(report.files.len(), 1);
    assert_eq!(results(&log, Severity::Info), vec!["'board.kicad_sch' is Good"]);
}

#[test]
fn test_shared_missing_specifier_reported_per_instance() {
    let ws = Workspace::new();
    ws.footprint("proj/Local.pretty", "R_0603");
    ws.write("proj/fp-lib-table", &fp_table(&[("Local", "KiCad", "${KIPRJMOD}/Local.pretty")]));
    ws.write(
        "proj/board.kicad_sch",
        &schematic(&[
            placed("Device:U", "U1", "X", "LibX:PartY", &[]),
            placed("Device:U", "U2", "X", "LibX:PartY", &[]),
            placed("Device:R", "R1", "10k", "Local:R_0603", &[]),
        ]),
    );

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Footprint, &mut log).check(&mut log).unwrap();

    assert_eq!(report.missing, vec!["LibX:PartY".to_string()]);
    let errors = results(&log, Severity::Error);
    assert!(errors.contains(&"'U1':'LibX:PartY' was not found in 'board.kicad_sch'"));
    assert!(errors.contains(&"'U2':'LibX:PartY' was not found in 'board.kicad_sch'"));
    assert_eq!(errors.iter().filter(|m| m.contains("was not found")).count(), 2);
}

#[test]
fn test_malformed_specifier_is_missing() {
    let ws = Workspace::new();
    ws.footprint("proj/Local.pretty", "R_0603");
    ws.write("proj/fp-lib-table", &fp_table(&[("Local", "KiCad", "${KIPRJMOD}/Local.pretty")]));
    ws.write(
        "proj/board.kicad_sch",
        &schematic(&[placed("Device:R", "R1", "10k", "R_0603", &[])]),
    );

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Footprint, &mut log).check(&mut log).unwrap();
    assert_eq!(report.missing, vec!["R_0603".to_string()]);
}

#[test]
fn test_duplicates_and_missing_libraries_are_notified() {
    let ws = Workspace::new();
    ws.footprint("proj/Local.pretty", "R_0603");
    ws.footprint("kicad/footprints/Local.pretty", "C_0603");
    ws.write("proj/fp-lib-table", &fp_table(&[
        ("Local", "KiCad", "${KIPRJMOD}/Local.pretty"),
        ("Gone", "KiCad", "${KIPRJMOD}/Gone.pretty"),
    ]));
    ws.write(
        "kicad/template/fp-lib-table",
        &fp_table(&[("Local", "KiCad", "${KICAD8_FOOTPRINT_DIR}/Local.pretty")]),
    );
    ws.write(
        "proj/board.kicad_sch",
        &schematic(&[
            placed("Device:R", "R1", "10k", "Local:R_0603", &[]),
            placed("Device:C", "C1", "1u", "Local:C_0603", &[]),
        ]),
    );

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Footprint, &mut log).check(&mut log).unwrap();

    // the project library shadows the global one
    assert_eq!(report.missing, vec!["Local:C_0603".to_string()]);
    assert!(log
        .iter()
        .any(|n| matches!(&n.kind, NoticeKind::DuplicateLibrary { name } if name == "Local")));
    assert!(log.iter().any(|n| matches!(
        &n.kind,
        NoticeKind::LibraryError { level: Level::Project, name } if name == "Gone"
    )));
    assert!(results(&log, Severity::Error)
        .iter()
        .any(|m| m.ends_with("Gone.pretty' doesn't exist")));
}

#[test]
fn test_symbol_flavor() {
    let ws = Workspace::new();
    ws.write("libs/Mine.kicad_sym", &symbol_lib(&["LDO", "OpAmp"]));
    ws.write(
        "libs/device.lib",
        "EESchema-LIBRARY Version 2.4\nDEF R R 0 0 N Y 1 F N\nENDDEF\n#\n#End Library\n",
    );
    ws.write(
        "proj/sym-lib-table",
        &sym_table(&[
            ("Mine", "KiCad", "${KIPRJMOD}/../libs/Mine.kicad_sym"),
            ("device", "Legacy", "${KIPRJMOD}/../libs/device.lib"),
        ]),
    );
    ws.write(
        "proj/board.kicad_sch",
        &schematic(&[
            placed("Mine:LDO", "U1", "AMS1117", "", &[]),
            placed("device:R", "R1", "10k", "", &[]),
            placed("Mine:Comparator", "U2", "LM393", "", &[]),
            placed("board-rescue:Fuse", "F1", "1A", "", &[]),
        ]),
    );

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Symbol, &mut log).check(&mut log).unwrap();

    assert_eq!(
        report.missing,
        vec!["Mine:Comparator".to_string(), "board-rescue:Fuse".to_string()]
    );
    assert!(log
        .iter()
        .any(|n| n.severity == Severity::Info && n.message.contains("rescued symbol 'board-rescue:Fuse'")));
}

#[test]
fn test_only_top_level_schematics_are_checked() {
    let ws = Workspace::new();
    ws.footprint("proj/Local.pretty", "R_0603");
    ws.write("proj/fp-lib-table", &fp_table(&[("Local", "KiCad", "${KIPRJMOD}/Local.pretty")]));
    ws.write("proj/a.kicad_sch", &schematic(&[placed("Device:R", "R1", "10k", "Local:R_0603", &[])]));
    ws.write("proj/sub/b.kicad_sch", &schematic(&[placed("Device:R", "R2", "1k", "LibX:PartY", &[])]));

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Footprint, &mut log).check(&mut log).unwrap();
    assert!(report.passed());
    assert_eq!(report.files.len(), 1);
}

#[test]
fn test_empty_catalog_refuses_to_check() {
    let ws = Workspace::new();
    ws.write("proj/board.kicad_sch", &schematic(&[placed("Device:R", "R1", "10k", "LibX:PartY", &[])]));

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Footprint, &mut log).check(&mut log).unwrap();
    assert!(report.files.is_empty());
    assert!(log
        .iter()
        .any(|n| n.severity == Severity::Warning && n.message.contains("nothing to check against")));
}

#[test]
fn test_unopenable_project_aborts() {
    let ws = Workspace::new();
    let missing = ws.root().join("does-not-exist");
    let result = LibraryManager::open(Flavor::Footprint, &missing, &ws.paths(), &mut Vec::new());
    assert!(matches!(result, Err(KilibError::ProjectNotFound(p)) if p == missing));
}

#[test]
fn test_truncated_schematic_is_checked_up_to_the_cut() {
    let ws = Workspace::new();
    ws.footprint("proj/Local.pretty", "R_0603");
    ws.write("proj/fp-lib-table", &fp_table(&[("Local", "KiCad", "${KIPRJMOD}/Local.pretty")]));
    let full = schematic(&[
        placed("Device:R", "R1", "10k", "LibX:PartY", &[]),
        placed("Device:R", "R2", "10k", "Local:R_0603", &[]),
    ]);
    let cut = full.find("\"R2\"").unwrap();
    ws.write("proj/board.kicad_sch", &full[..cut]);

    let mut log = Vec::new();
    let report = open(&ws, Flavor::Footprint, &mut log).check(&mut log).unwrap();
    assert_eq!(report.missing, vec!["LibX:PartY".to_string()]);
}
