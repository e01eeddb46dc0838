//! Vendor part numbers keyed by component value and footprint.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::notify::{emit, Listener, Notification, Severity};
use crate::parser::{scan_line, LineForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorField {
    DigiKey,
    Lcsc,
    Mpn,
}

impl VendorField {
    pub const ALL: [VendorField; 3] = [VendorField::DigiKey, VendorField::Lcsc, VendorField::Mpn];

    /// Schematic property name.
    pub fn key(self) -> &'static str {
        match self {
            VendorField::DigiKey => "Digi-Key_PN",
            VendorField::Lcsc => "LCSC",
            VendorField::Mpn => "MPN",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    pub value: String,
    pub footprint: String,
    #[serde(default)]
    pub digikey: String,
    #[serde(default)]
    pub lcsc: String,
    #[serde(default)]
    pub mpn: String,
}

impl PartRecord {
    pub fn new(value: impl Into<String>, footprint: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            footprint: footprint.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, field: VendorField, code: impl Into<String>) -> Self {
        self.set_code(field, code);
        self
    }

    pub fn code(&self, field: VendorField) -> &str {
        match field {
            VendorField::DigiKey => &self.digikey,
            VendorField::Lcsc => &self.lcsc,
            VendorField::Mpn => &self.mpn,
        }
    }

    pub fn set_code(&mut self, field: VendorField, code: impl Into<String>) {
        let code = code.into();
        match field {
            VendorField::DigiKey => self.digikey = code,
            VendorField::Lcsc => self.lcsc = code,
            VendorField::Mpn => self.mpn = code,
        }
    }

    pub fn has_codes(&self) -> bool {
        VendorField::ALL.iter().any(|f| !self.code(*f).is_empty())
    }

    fn same_key(&self, other: &PartRecord) -> bool {
        self.value == other.value && self.footprint == other.footprint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartMatch {
    Exact,
    ValueOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartTable {
    parts: Vec<PartRecord>,
}

impl PartTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartRecord> {
        self.parts.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PartRecord> {
        self.parts.get(index)
    }

    /// Appends `record` unless its `(value, footprint)` is already present.
    pub fn add(&mut self, record: PartRecord) -> bool {
        if self.parts.iter().any(|p| p.same_key(&record)) {
            return false;
        }
        self.parts.push(record);
        true
    }

    pub fn update(&mut self, index: usize, record: PartRecord) -> bool {
        match self.parts.get_mut(index) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<PartRecord> {
        (index < self.parts.len()).then(|| self.parts.remove(index))
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }

    /// Exact `(value, footprint)` match, else the first record with `value`.
    pub fn lookup(&self, value: &str, footprint: &str) -> Option<(&PartRecord, PartMatch)> {
        if let Some(exact) = self
            .parts
            .iter()
            .find(|p| p.value == value && p.footprint == footprint)
        {
            return Some((exact, PartMatch::Exact));
        }
        self.parts
            .iter()
            .find(|p| p.value == value)
            .map(|p| (p, PartMatch::ValueOnly))
    }

    /// Harvests parts from placed symbols that already carry a vendor code.
    /// Returns how many records were added or replaced.
    pub fn import_from_schematics(
        &mut self,
        files: &[PathBuf],
        overwrite: bool,
        listener: &mut dyn Listener,
    ) -> usize {
        let mut imported = 0;
        for file in files {
            let content = match std::fs::read_to_string(file) {
                Ok(content) => content,
                Err(e) => {
                    emit(
                        listener,
                        Notification::log(
                            Severity::Warning,
                            format!("Cannot read '{}': {}", file.display(), e),
                        )
                        .with_path(file),
                    );
                    continue;
                }
            };
            for placed in scan_placed_symbols(&content) {
                let record = placed.part;
                if record.value.is_empty() || record.footprint.is_empty() || !record.has_codes() {
                    continue;
                }
                match self.parts.iter_mut().find(|p| p.same_key(&record)) {
                    Some(existing) if overwrite && *existing != record => {
                        *existing = record;
                        imported += 1;
                    }
                    Some(_) => {}
                    None => {
                        self.parts.push(record);
                        imported += 1;
                    }
                }
            }
        }
        tracing::info!("imported {} parts from {} schematics", imported, files.len());
        imported
    }
}

impl FromIterator<PartRecord> for PartTable {
    fn from_iter<I: IntoIterator<Item = PartRecord>>(iter: I) -> Self {
        let mut table = PartTable::new();
        for record in iter {
            table.add(record);
        }
        table
    }
}

/// Properties of one placed symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacedSymbol {
    pub designator: String,
    pub part: PartRecord,
}

impl PlacedSymbol {
    fn is_blank(&self) -> bool {
        self.designator.is_empty() && self.part.value.is_empty() && self.part.footprint.is_empty()
    }
}

/// Placed symbols of a schematic, each emitted at its first pin or, for
/// symbols without pins, where the next instance starts.
pub fn scan_placed_symbols(content: &str) -> Vec<PlacedSymbol> {
    let mut placed = Vec::new();
    let mut in_instances = false;
    let mut current = PlacedSymbol::default();
    let mut flush = |current: &mut PlacedSymbol| {
        let symbol = std::mem::take(current);
        if !symbol.is_blank() {
            placed.push(symbol);
        }
    };

    for line in content.lines() {
        match scan_line(line) {
            Some(LineForm::Instance { .. }) => {
                flush(&mut current);
                in_instances = true;
            }
            Some(LineForm::Property(property)) if in_instances => match property.key.as_str() {
                "Reference" => current.designator = property.value,
                "Value" => current.part.value = property.value,
                "Footprint" => current.part.footprint = property.value,
                key => {
                    if let Some(field) = VendorField::from_key(key) {
                        current.part.set_code(field, property.value);
                    }
                }
            },
            Some(LineForm::Pin { .. }) => flush(&mut current),
            _ => {}
        }
    }
    flush(&mut current);
    placed
}
