use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use movie_normalize::{
    engine::Engine,
    frame::{LoadOptions, RawTable},
    mapping::resolve,
    normalize::normalize,
};
use tempfile::TempDir;

fn generate_tmdb_export(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("tmdb.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(
        file,
        "id,title,release_date,runtime,genres,vote_average,vote_count,popularity,overview"
    )
    .expect("header");
    for i in 0..rows {
        let genres = match i % 3 {
            0 => "\"['Action', 'Drama']\"",
            1 => "Comedy|Romance",
            _ => "",
        };
        let runtime = if i % 7 == 0 { String::new() } else { (80 + i % 90).to_string() };
        // every tenth row repeats its predecessor's title and year
        let title_seed = if i % 10 == 9 { i - 1 } else { i };
        writeln!(
            file,
            "{i},Movie {title_seed},20{:02}-0{}-15,{runtime},{genres},{}.{},\"{},{:03}\",{}.5,Plot {i}",
            title_seed % 25,
            1 + title_seed % 9,
            1 + i % 9,
            i % 10,
            1 + i % 50,
            i % 1000,
            i % 300,
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_normalize(c: &mut Criterion) {
    let (temp_dir, csv_path) = generate_tmdb_export(50_000);
    let engine = Engine::builtin();
    let raw = RawTable::load(&csv_path, &LoadOptions::default()).expect("load csv");
    let mapping = resolve(engine.registry(), raw.columns(), "tmdb", None);

    let mut group = c.benchmark_group("normalize");

    group.bench_function("normalize_in_memory", |b| {
        b.iter(|| normalize(&raw, &mapping));
    });

    group.bench_function("load_detect_normalize", |b| {
        b.iter_batched(
            LoadOptions::default,
            |options| {
                engine
                    .load_and_map(&csv_path, &options, None, None)
                    .expect("load and map");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
    drop(temp_dir);
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
