//! 3D model paths in board files.
//!
//! A footprint's `(model "...")` path that does not start with a path
//! variable only works on the machine that placed it. These are reported
//! and can be rewritten relative to the project.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::KilibError;
use crate::notify::{emit, Listener, Notification};
use crate::parser::line::scan_sexp;
use crate::patch::{join_like, rewrite_file};
use crate::paths::PathResolver;
use crate::validate::project_files;

pub const BOARD_EXTENSION: &str = "kicad_pcb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelFinding {
    pub designator: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardCheck {
    pub file: PathBuf,
    pub findings: Vec<ModelFinding>,
}

impl BoardCheck {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }
}

enum BoardLine {
    Footprint,
    Reference(String),
    Model(String),
}

fn scan_board_line(line: &str) -> Option<BoardLine> {
    if !line.trim_start().starts_with('(') {
        return None;
    }
    let sexp = scan_sexp(line)?;
    match sexp.head()? {
        "footprint" | "module" => Some(BoardLine::Footprint),
        "fp_text" if sexp.atom_at(1) == Some("reference") => {
            Some(BoardLine::Reference(sexp.atom_at(2)?.to_string()))
        }
        "property" if sexp.atom_at(1) == Some("Reference") => {
            Some(BoardLine::Reference(sexp.atom_at(2)?.to_string()))
        }
        "model" => Some(BoardLine::Model(sexp.atom_at(1)?.to_string())),
        _ => None,
    }
}

/// Model paths without a leading path variable, with their footprint's
/// reference designator.
pub fn scan_board(content: &str) -> Vec<ModelFinding> {
    let mut findings = Vec::new();
    let mut designator = String::new();
    for line in content.lines() {
        match scan_board_line(line) {
            Some(BoardLine::Footprint) => designator.clear(),
            Some(BoardLine::Reference(reference)) => designator = reference,
            Some(BoardLine::Model(path)) if !path.starts_with('$') => findings.push(ModelFinding {
                designator: designator.clone(),
                path,
            }),
            _ => {}
        }
    }
    findings
}

fn check_board(path: &Path, listener: &mut dyn Listener) -> Option<BoardCheck> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            emit(listener, Notification::file_access("read", path, &e));
            return None;
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let findings = scan_board(&content);
    for finding in &findings {
        emit(
            listener,
            Notification::failed(format!(
                "'{}': model '{}' is not relative in '{}'",
                finding.designator, finding.path, file_name
            ))
            .with_path(path),
        );
    }
    if findings.is_empty() {
        emit(listener, Notification::passed(format!("'{}' is Good", file_name)).with_path(path));
    }
    Some(BoardCheck {
        file: path.to_path_buf(),
        findings,
    })
}

/// Checks every board directly inside `project_dir`. Unreadable boards are
/// reported and left out.
pub fn check_boards(project_dir: &Path, listener: &mut dyn Listener) -> Result<Vec<BoardCheck>, KilibError> {
    Ok(project_files(project_dir, BOARD_EXTENSION)?
        .iter()
        .filter_map(|board| check_board(board, listener))
        .collect())
}

/// Rewrites non-relative model paths of one board's text. Conversions are
/// memoized per distinct path in `memo`.
pub fn rewrite_board(
    content: &str,
    resolver: &PathResolver,
    library_root: &str,
    memo: &mut HashMap<String, String>,
) -> (String, usize) {
    let mut rewritten = 0;
    let mut out: Vec<String> = Vec::new();
    for line in content.lines() {
        if let Some(BoardLine::Model(path)) = scan_board_line(line) {
            if !path.starts_with('$') {
                let relative = memo
                    .entry(path.clone())
                    .or_insert_with(|| resolver.to_relative(&path, library_root).or_original(&path));
                if *relative != path && line.contains(path.as_str()) {
                    out.push(line.replacen(path.as_str(), relative.as_str(), 1));
                    rewritten += 1;
                    continue;
                }
            }
        }
        out.push(line.to_string());
    }
    (join_like(content, out), rewritten)
}

/// Rewrites the boards of the resolver's project, then checks them again.
pub fn fix_boards(
    resolver: &PathResolver,
    library_root: &Path,
    listener: &mut dyn Listener,
) -> Result<Vec<BoardCheck>, KilibError> {
    let project_dir = resolver.project_dir();
    let library_root = crate::paths::to_slash(library_root);
    let mut memo = HashMap::new();

    for board in project_files(project_dir, BOARD_EXTENSION)? {
        let content = match std::fs::read_to_string(&board) {
            Ok(content) => content,
            Err(e) => {
                emit(listener, Notification::file_access("read", &board, &e));
                continue;
            }
        };
        let (text, rewritten) = rewrite_board(&content, resolver, &library_root, &mut memo);
        if rewritten == 0 {
            continue;
        }
        if rewrite_file(&board, &text, listener) {
            tracing::info!("{}: {} model paths rewritten", board.display(), rewritten);
        }
    }
    check_boards(project_dir, listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KicadPaths;
    use crate::notify::Severity;
    use crate::paths::to_slash;

    const BOARD: &str = r#"(kicad_pcb (version 20221018) (generator pcbnew)
  (footprint "Connector:USB_C" (layer "F.Cu")
    (fp_text reference "J30" (at 0 -3) (layer "F.SilkS")
    (model "/home/u/libs/3d/USB_C.wrl"
      (offset (xyz 0 0 0))
    )
  )
  (footprint "Resistor_SMD:R_0603" (layer "F.Cu")
    (property "Reference" "R1" (at 0 -1.4 0) (layer "F.SilkS")
    (model "${KICAD6_3DMODEL_DIR}/Resistor_SMD.3dshapes/R_0603.wrl"
    )
  )
)
"#;

    #[test]
    fn test_scan_board() {
        assert_eq!(
            scan_board(BOARD),
            vec![ModelFinding {
                designator: "J30".into(),
                path: "/home/u/libs/3d/USB_C.wrl".into(),
            }]
        );
    }

    #[test]
    fn test_rewrite_board_memoizes() {
        let resolver = PathResolver::new(Path::new("/home/u/proj"), &KicadPaths::default());
        let mut memo = HashMap::new();
        let (text, count) = rewrite_board(BOARD, &resolver, "/home/u/libs", &mut memo);
        assert_eq!(count, 1);
        assert!(text.contains(r#"(model "${KIPRJMOD}/../libs/3d/USB_C.wrl""#));
        assert!(scan_board(&text).is_empty());
        assert_eq!(memo.len(), 1);
    }
    #[test]
    fn test_unreadable_board_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.kicad_pcb"), [0xff, 0xfe, b'(', 0x80]).unwrap();
        std::fs::write(dir.path().join("b.kicad_pcb"), BOARD).unwrap();

        let mut seen: Vec<Notification> = Vec::new();
        let checks = check_boards(dir.path(), &mut seen).unwrap();
        assert_eq!(checks.len(), 1);
        assert!(checks[0].file.ends_with("b.kicad_pcb"));
        assert_eq!(checks[0].findings.len(), 1);
        assert!(seen
            .iter()
            .any(|n| n.severity == Severity::Warning && n.path.as_deref() == Some(&*dir.path().join("a.kicad_pcb"))));
    }

    #[test]
    fn test_fix_boards_goes_past_unreadable_board() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("a.kicad_pcb"), [0xff, 0xfe]).unwrap();
        let board = BOARD.replace("/home/u/libs", &to_slash(&dir.path().join("libs")));
        std::fs::write(project.join("b.kicad_pcb"), board).unwrap();

        let resolver = PathResolver::new(&project, &KicadPaths::default());
        let mut seen: Vec<Notification> = Vec::new();
        let checks = fix_boards(&resolver, dir.path(), &mut seen).unwrap();
        assert_eq!(checks.len(), 1);
        assert!(checks[0].passed());
        let text = std::fs::read_to_string(project.join("b.kicad_pcb")).unwrap();
        assert!(text.contains(r#"(model "${KIPRJMOD}/../libs/3d/USB_C.wrl""#));
        assert_eq!(std::fs::read(project.join("a.kicad_pcb")).unwrap(), vec![0xff, 0xfe]);
    }
}
