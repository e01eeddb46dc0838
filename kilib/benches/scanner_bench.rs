use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kilib::flavor::Flavor;
use kilib::index::MemberIndex;
use kilib::parser::scan_line;
use kilib::validate::scan_schematic;
use kilib::{compare_references, KicadPaths, PathResolver};
use std::path::Path;

fn synthetic_schematic(symbols: usize) -> String {
    let mut out = String::from("(kicad_sch (version 20230121) (generator eeschema)\n");
    for i in 0..symbols {
        out.push_str(&format!(
            "  (symbol (lib_id \"Device:R\") (at 100 50 0) (unit 1)\n\
             \x20   (property \"Reference\" \"R{i}\" (id 0) (at 101.6 48.26 0)\n\
             \x20   )\n\
             \x20   (property \"Value\" \"10k\" (id 1) (at 101.6 52.07 0)\n\
             \x20   )\n\
             \x20   (property \"Footprint\" \"Resistor_SMD:R_{size}\" (id 2) (at 100 50 0)\n\
             \x20   )\n\
             \x20   (pin \"1\" (uuid 00000000-0000-0000-0000-000000000001))\n\
             \x20 )\n",
            i = i,
            size = if i % 2 == 0 { "0603" } else { "0805" }
        ));
    }
    out.push_str(")\n");
    out
}

fn bench_scan_schematic(c: &mut Criterion) {
    let content = synthetic_schematic(500);
    let mut index = MemberIndex::default();
    index.insert("Resistor_SMD", vec!["R_0603".to_string()]);

    c.bench_function("scan_schematic_500", |b| {
        b.iter(|| scan_schematic(Flavor::Footprint, black_box(&content), &index));
    });
}

fn bench_scan_line(c: &mut Criterion) {
    let line = r#"    (property "Footprint" "Resistor_SMD:R_0603" (id 2) (at 100 50 0)"#;
    c.bench_function("scan_line_property", |b| b.iter(|| scan_line(black_box(line))));
}

fn bench_to_relative(c: &mut Criterion) {
    let resolver = PathResolver::new(Path::new("/home/u/work/boards/proj"), &KicadPaths::default());
    c.bench_function("to_relative", |b| {
        b.iter(|| {
            resolver.to_relative(
                black_box("/home/u/work/libs/vendor/Conn.pretty"),
                black_box("/home/u/work/libs"),
            )
        });
    });
}

fn bench_sort_references(c: &mut Criterion) {
    let refs: Vec<String> = (0..1000).rev().map(|i| format!("R{}", i)).collect();
    c.bench_function("sort_references_1000", |b| {
        b.iter(|| {
            let mut sorted = refs.clone();
            sorted.sort_by(|x, y| compare_references(x, y));
            sorted
        });
    });
}

criterion_group!(
    benches,
    bench_scan_schematic,
    bench_scan_line,
    bench_to_relative,
    bench_sort_references
);
criterion_main!(benches);
