//! Bill of materials grouped by value and footprint.

use std::cmp::Ordering;
use std::path::Path;

use serde::Serialize;

use crate::error::KilibError;
use crate::notify::{emit, Listener, Notification, Severity};
use crate::parts::{scan_placed_symbols, PlacedSymbol, VendorField};
use crate::validate::{project_files, SCHEMATIC_EXTENSION};

pub const BOM_HEADER: &str = r#""Qty","Designators","Value","Digi-Key_PN","LCSC","MPN""#;

/// Natural order of designators: `C1 < R1 < R2 < R10`.
///
/// Equal letter prefixes (upper-cased) with numbers on both sides compare
/// numerically, otherwise the prefixes decide. Designators without letters
/// compare as raw strings, so `"12" < "3"`.
pub fn compare_references(a: &str, b: &str) -> Ordering {
    let (letters_a, number_a) = split_reference(a);
    let (letters_b, number_b) = split_reference(b);
    if letters_a.is_empty() || letters_b.is_empty() {
        return a.cmp(b);
    }
    let by_letters = letters_a.cmp(&letters_b);
    match (number_a, number_b) {
        (Some(x), Some(y)) if by_letters == Ordering::Equal => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => by_letters.then_with(|| a.cmp(b)),
    }
}

fn split_reference(reference: &str) -> (String, Option<u64>) {
    let letters = reference
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();
    let digits: String = reference.chars().filter(|c| c.is_ascii_digit()).collect();
    (letters, digits.parse().ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BomLine {
    pub value: String,
    pub footprint: String,
    pub digikey: String,
    pub lcsc: String,
    pub mpn: String,
    /// Distinct designators in natural order.
    pub references: Vec<String>,
}

impl BomLine {
    pub fn quantity(&self) -> usize {
        self.references.len()
    }

    pub fn render(&self) -> String {
        [
            self.quantity().to_string(),
            self.references.join(","),
            self.value.clone(),
            self.digikey.clone(),
            self.lcsc.clone(),
            self.mpn.clone(),
        ]
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Bom {
    lines: Vec<BomLine>,
}

impl Bom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a placed symbol. Symbols without designator, value or
    /// footprint are left out.
    pub fn add(&mut self, placed: PlacedSymbol) {
        let part = placed.part;
        if placed.designator.is_empty() || part.value.is_empty() || part.footprint.is_empty() {
            return;
        }
        let line = match self
            .lines
            .iter()
            .position(|l| l.value == part.value && l.footprint == part.footprint)
        {
            Some(i) => &mut self.lines[i],
            None => {
                self.lines.push(BomLine {
                    value: part.value.clone(),
                    footprint: part.footprint.clone(),
                    digikey: part.code(VendorField::DigiKey).to_string(),
                    lcsc: part.code(VendorField::Lcsc).to_string(),
                    mpn: part.code(VendorField::Mpn).to_string(),
                    references: Vec::new(),
                });
                let last = self.lines.len() - 1;
                &mut self.lines[last]
            }
        };
        if !line.references.contains(&placed.designator) {
            line.references.push(placed.designator);
            line.references.sort_by(|a, b| compare_references(a, b));
        }
    }

    pub fn add_schematic(&mut self, content: &str) {
        for placed in scan_placed_symbols(content) {
            self.add(placed);
        }
    }

    /// BOM of every schematic directly inside `schematic_dir`.
    pub fn generate(schematic_dir: &Path, listener: &mut dyn Listener) -> Result<Self, KilibError> {
        let mut bom = Bom::new();
        for file in project_files(schematic_dir, SCHEMATIC_EXTENSION)? {
            match std::fs::read_to_string(&file) {
                Ok(content) => bom.add_schematic(&content),
                Err(e) => emit(
                    listener,
                    Notification::log(
                        Severity::Warning,
                        format!("Cannot read '{}': {}", file.display(), e),
                    )
                    .with_path(&file),
                ),
            }
        }
        tracing::info!("{} BOM lines from {}", bom.lines.len(), schematic_dir.display());
        Ok(bom)
    }

    /// Lines ordered by their lowest designator.
    pub fn lines(&self) -> Vec<&BomLine> {
        let mut lines: Vec<&BomLine> = self.lines.iter().collect();
        lines.sort_by(|a, b| match (a.references.first(), b.references.first()) {
            (Some(x), Some(y)) => compare_references(x, y),
            _ => Ordering::Equal,
        });
        lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::from(BOM_HEADER);
        out.push('\n');
        for line in self.lines() {
            out.push_str(&line.render());
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path, listener: &mut dyn Listener) -> Result<(), KilibError> {
        std::fs::write(path, self.render())?;
        emit(
            listener,
            Notification::passed(format!("BOM written to '{}'", path.display())).with_path(path),
        );
        Ok(())
    }
}
