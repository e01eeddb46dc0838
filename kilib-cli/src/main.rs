//! kilib CLI - check and repair KiCad library tables from the command line.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kilib::models::{check_boards, fix_boards};
use kilib::patch;
use kilib::validate::{project_files, SCHEMATIC_EXTENSION};
use kilib::{
    Bom, Flavor, KicadPaths, LibraryManager, Listener, Notification, PartRecord, PartTable,
    PathResolver, ReplaceList, Severity, VendorField,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kilib")]
#[command(about = "KiCad library table checker and repair tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// KiCad installation data directory (overrides KICAD_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    kicad_dir: Option<PathBuf>,

    /// JSON file with KiCad installation paths
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "human")]
    format: OutputFormat,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every footprint / symbol used by the schematics is in a library
    Check {
        /// Project directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Which library tables to check against
        #[arg(short, long, value_enum, default_value = "all")]
        libraries: Libraries,
    },

    /// Repair the project library table
    Fix {
        /// Project directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Directory searched for moved or missing libraries (default: the project's parent)
        #[arg(long, value_name = "DIR")]
        search_root: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "all")]
        libraries: Libraries,
    },

    /// List the libraries of the project and global tables
    Libs {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        #[arg(short, long, value_enum, default_value = "all")]
        libraries: Libraries,
    },

    /// Add the library holding a footprint or symbol file to the project table
    Import {
        /// A .kicad_mod, .mod, .kicad_sym or .lib file
        #[arg(value_name = "FILE")]
        member_file: PathBuf,

        /// Project directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        project: PathBuf,

        /// Library tree the file lives in (default: the project's parent)
        #[arg(long, value_name = "DIR")]
        library_root: Option<PathBuf>,
    },

    /// Write vendor part numbers into the schematics
    Patch {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Part as "value;footprint;digikey;lcsc;mpn" (trailing fields optional)
        #[arg(long = "part", value_name = "PART")]
        parts: Vec<String>,

        /// Also collect parts from symbols that already carry vendor codes
        #[arg(long)]
        from_schematics: bool,

        /// Collected parts replace parts given with --part
        #[arg(long)]
        overwrite: bool,
    },

    /// Write a bill of materials
    Bom {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Output file (default: DIR/bom.csv)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Apply regex replacements to each line of a schematic, or of every schematic in a directory
    Replace {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Pattern and replacement text ($1 refers to a group); repeatable
        #[arg(long = "map", required = true, num_args = 2, value_names = ["PATTERN", "REPLACEMENT"])]
        map: Vec<String>,
    },

    /// Check 3D model paths in board files
    Models {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Rewrite absolute model paths relative to the project
        #[arg(long)]
        fix: bool,

        /// Library tree the models live in (default: the project's parent)
        #[arg(long, value_name = "DIR")]
        library_root: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Libraries {
    Footprints,
    Symbols,
    All,
}

impl Libraries {
    fn flavors(self) -> &'static [Flavor] {
        match self {
            Libraries::Footprints => &[Flavor::Footprint],
            Libraries::Symbols => &[Flavor::Symbol],
            Libraries::All => &[Flavor::Footprint, Flavor::Symbol],
        }
    }
}

/// Prints check results as they arrive, or collects everything for JSON.
struct Output {
    format: OutputFormat,
    notifications: Vec<Notification>,
}

impl Output {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            notifications: Vec::new(),
        }
    }

    fn is_human(&self) -> bool {
        matches!(self.format, OutputFormat::Human)
    }

    fn finish(self, result: serde_json::Value) -> Result<()> {
        if let OutputFormat::Json = self.format {
            let output = json!({
                "notifications": self.notifications,
                "result": result,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Ok(())
    }
}

impl Listener for Output {
    fn notify(&mut self, notification: Notification) {
        match self.format {
            OutputFormat::Human if notification.is_result() => {
                let mark = match notification.severity {
                    Severity::Error => "FAIL",
                    _ => " ok ",
                };
                println!("[{}] {}", mark, notification.message);
            }
            OutputFormat::Human => {}
            OutputFormat::Json => self.notifications.push(notification),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit code 0 when everything resolved, 1 when findings remain.
fn run(cli: Cli) -> Result<i32> {
    let paths = kicad_paths(&cli.global)?;
    let mut out = Output::new(cli.global.format);

    let (code, result) = match cli.command {
        Commands::Check { dir, libraries } => handle_check(&project_dir(&dir)?, libraries, &paths, &mut out)?,
        Commands::Fix {
            dir,
            search_root,
            libraries,
        } => {
            let dir = project_dir(&dir)?;
            let search_root = library_root(&dir, search_root)?;
            handle_fix(&dir, &search_root, libraries, &paths, &mut out)?
        }
        Commands::Libs { dir, libraries } => handle_libs(&project_dir(&dir)?, libraries, &paths, &mut out)?,
        Commands::Import {
            member_file,
            project,
            library_root: root,
        } => {
            let project = project_dir(&project)?;
            let root = library_root(&project, root)?;
            handle_import(&member_file, &project, &root, &paths, &mut out)?
        }
        Commands::Patch {
            dir,
            parts,
            from_schematics,
            overwrite,
        } => handle_patch(&project_dir(&dir)?, &parts, from_schematics, overwrite, &mut out)?,
        Commands::Bom { dir, output } => handle_bom(&project_dir(&dir)?, output, &mut out)?,
        Commands::Replace { path, map } => handle_replace(&path, &map, &mut out)?,
        Commands::Models {
            dir,
            fix,
            library_root: root,
        } => {
            let dir = project_dir(&dir)?;
            let root = library_root(&dir, root)?;
            handle_models(&dir, fix, &root, &paths, &mut out)?
        }
    };

    out.finish(result)?;
    Ok(code)
}

fn kicad_paths(global: &GlobalArgs) -> Result<KicadPaths> {
    let mut paths = match &global.config {
        Some(file) => KicadPaths::from_json_file(file)
            .with_context(|| format!("loading config {}", file.display()))?,
        None => KicadPaths::from_env(),
    };
    if let Some(dir) = &global.kicad_dir {
        paths.data_dir = dir.clone();
    }
    tracing::debug!("KiCad data directory: {}", paths.data_dir.display());
    Ok(paths)
}

fn project_dir(dir: &Path) -> Result<PathBuf> {
    dir.canonicalize()
        .with_context(|| format!("project directory {} not found", dir.display()))
}

fn library_root(project: &Path, root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => root
            .canonicalize()
            .with_context(|| format!("library root {} not found", root.display())),
        None => Ok(project.parent().unwrap_or(project).to_path_buf()),
    }
}

fn open(flavor: Flavor, dir: &Path, paths: &KicadPaths, out: &mut Output) -> Result<LibraryManager> {
    LibraryManager::open(flavor, dir, paths, out)
        .with_context(|| format!("opening {} libraries of {}", flavor.label(), dir.display()))
}

fn handle_check(
    dir: &Path,
    libraries: Libraries,
    paths: &KicadPaths,
    out: &mut Output,
) -> Result<(i32, serde_json::Value)> {
    let mut missing = 0;
    let mut results = Vec::new();
    for &flavor in libraries.flavors() {
        let manager = open(flavor, dir, paths, out)?;
        let report = manager.check(out)?;
        if out.is_human() && !report.missing.is_empty() {
            println!("{} unresolved {} references", report.missing.len(), flavor.label());
        }
        missing += report.missing.len();
        results.push(json!({ "libraries": flavor.label(), "report": report }));
    }
    Ok((i32::from(missing > 0), json!(results)))
}

fn handle_fix(
    dir: &Path,
    search_root: &Path,
    libraries: Libraries,
    paths: &KicadPaths,
    out: &mut Output,
) -> Result<(i32, serde_json::Value)> {
    let mut remaining = 0;
    let mut results = Vec::new();
    for &flavor in libraries.flavors() {
        let mut manager = open(flavor, dir, paths, out)?;
        let outcome = manager.repair(&[], search_root, out)?;
        if out.is_human() && !outcome.changed() {
            println!("{} table unchanged", flavor.label());
        }
        remaining += outcome.remaining.len();
        results.push(json!({ "libraries": flavor.label(), "outcome": outcome }));
    }
    Ok((i32::from(remaining > 0), json!(results)))
}

fn handle_libs(
    dir: &Path,
    libraries: Libraries,
    paths: &KicadPaths,
    out: &mut Output,
) -> Result<(i32, serde_json::Value)> {
    let mut results = Vec::new();
    for &flavor in libraries.flavors() {
        let manager = open(flavor, dir, paths, out)?;
        for (level, entry) in manager.catalog().iter() {
            if out.is_human() {
                println!("{}\t{}\t{}\t{}\t{}", flavor.label(), level, entry.name, entry.kind, entry.uri);
            }
            results.push(json!({ "libraries": flavor.label(), "level": level, "entry": entry }));
        }
    }
    Ok((0, json!(results)))
}

fn handle_import(
    member_file: &Path,
    project: &Path,
    library_root: &Path,
    paths: &KicadPaths,
    out: &mut Output,
) -> Result<(i32, serde_json::Value)> {
    let member_file = member_file
        .canonicalize()
        .with_context(|| format!("{} not found", member_file.display()))?;
    let flavor = if Flavor::Footprint.library_of(&member_file).is_some() {
        Flavor::Footprint
    } else {
        Flavor::Symbol
    };
    let mut manager = open(flavor, project, paths, out)?;
    match manager.import_library(&member_file, library_root, out) {
        Some(entry) => {
            if out.is_human() {
                println!("{} -> {}", entry.name, entry.uri);
            }
            Ok((0, json!(entry)))
        }
        None => Ok((1, serde_json::Value::Null)),
    }
}

/// Parses `value;footprint;digikey;lcsc;mpn`.
fn parse_part(text: &str) -> Result<PartRecord> {
    let fields: Vec<&str> = text.split(';').map(str::trim).collect();
    if fields.len() > 2 + VendorField::ALL.len() {
        bail!("too many fields in part '{}'", text);
    }
    if fields[0].is_empty() {
        bail!("part '{}' has no value", text);
    }
    let mut record = PartRecord::new(fields[0], fields.get(1).copied().unwrap_or(""));
    for (field, code) in VendorField::ALL.into_iter().zip(fields.iter().skip(2)) {
        record.set_code(field, *code);
    }
    Ok(record)
}

fn handle_patch(
    dir: &Path,
    texts: &[String],
    from_schematics: bool,
    overwrite: bool,
    out: &mut Output,
) -> Result<(i32, serde_json::Value)> {
    let mut parts = PartTable::new();
    for text in texts {
        let record = parse_part(text)?;
        if !parts.add(record) {
            tracing::warn!("duplicate part '{}' ignored", text);
        }
    }
    if from_schematics {
        let files = project_files(dir, SCHEMATIC_EXTENSION)?;
        parts.import_from_schematics(&files, overwrite, out);
    }

    let patched = patch::apply(&parts, dir, out)?;
    if out.is_human() && patched.is_empty() {
        println!("nothing to patch");
    }
    Ok((0, json!(patched)))
}

fn handle_bom(dir: &Path, output: Option<PathBuf>, out: &mut Output) -> Result<(i32, serde_json::Value)> {
    let bom = Bom::generate(dir, out)?;
    let output = output.unwrap_or_else(|| dir.join("bom.csv"));
    bom.write(&output, out)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok((0, json!(bom.lines())))
}

fn handle_replace(path: &Path, map: &[String], out: &mut Output) -> Result<(i32, serde_json::Value)> {
    let files = if path.is_dir() {
        project_files(&project_dir(path)?, SCHEMATIC_EXTENSION)?
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        bail!("{} not found", path.display());
    };

    let mut list = ReplaceList::new();
    for pair in map.chunks(2) {
        if let [from, to] = pair {
            if !list.add(from.as_str(), to.as_str()) {
                tracing::warn!("duplicate pattern '{}' ignored", from);
            }
        }
    }
    let rewriter = list.compile().context("compiling replace patterns")?;
    let replaced = rewriter.replace_in_files(&files, out);
    if out.is_human() && replaced.is_empty() {
        println!("no line matched");
    }
    Ok((0, json!(replaced)))
}

fn handle_models(
    dir: &Path,
    fix: bool,
    library_root: &Path,
    paths: &KicadPaths,
    out: &mut Output,
) -> Result<(i32, serde_json::Value)> {
    let checks = if fix {
        let resolver = PathResolver::new(dir, paths);
        fix_boards(&resolver, library_root, out)?
    } else {
        check_boards(dir, out)?
    };
    let failed = checks.iter().any(|c| !c.passed());
    Ok((i32::from(failed), json!(checks)))
}
