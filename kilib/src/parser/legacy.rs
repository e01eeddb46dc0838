//! KiCad 4-5 legacy library files.
//!
//! Legacy libraries are single text files. A footprint library (`.mod`)
//! names each module on an `Li <name>` line; a symbol library (`.lib`)
//! opens each symbol with `DEF <name> <reference> ...`.

/// Member names declared on lines whose first token is `marker`.
pub fn member_names(content: &str, marker: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            if fields.next()? != marker {
                return None;
            }
            let name = fields.next()?.trim_matches('"');
            // `DEF ~GND` marks a symbol whose name is hidden on the sheet.
            let name = name.strip_prefix('~').unwrap_or(name);
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}
