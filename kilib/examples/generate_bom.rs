//! Write `bom.csv` for the schematics of a project directory.

use kilib::prelude::*;
use std::path::Path;

fn main() -> Result<(), KilibError> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let dir = Path::new(&dir);

    // Print notifications as they arrive instead of collecting them.
    let mut print = |n: Notification| println!("{}", n.message);
    let bom = Bom::generate(dir, &mut print)?;
    if bom.is_empty() {
        println!("No placed parts with value and footprint found.");
        return Ok(());
    }
    bom.write(&dir.join("bom.csv"), &mut print)?;
    Ok(())
}
