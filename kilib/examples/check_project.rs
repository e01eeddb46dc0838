//! Check a project's footprints and symbols against its library tables.

use kilib::prelude::*;
use std::path::Path;

fn main() -> Result<(), KilibError> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let dir = Path::new(&dir);
    let paths = KicadPaths::from_env();

    let mut missing_total = 0;
    for flavor in [Flavor::Footprint, Flavor::Symbol] {
        let mut log: Vec<Notification> = Vec::new();
        let manager = LibraryManager::open(flavor, dir, &paths, &mut log)?;
        let report = manager.check(&mut log)?;

        println!("{} libraries: {}", flavor.label(), manager.catalog().len());
        for notice in log.iter().filter(|n| n.is_result()) {
            println!("  [{:?}] {}", notice.severity, notice.message);
        }
        missing_total += report.missing.len();
    }

    if missing_total > 0 {
        println!("\n{} unresolved references.", missing_total);
        std::process::exit(1);
    }
    println!("\nAll references resolved.");
    Ok(())
}
