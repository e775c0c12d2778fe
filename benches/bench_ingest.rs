use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use moviekg::{
    GraphBackend, LoadOptions, QueryIntent, RawRow, RdfStore, SecondaryTarget, SqliteGraph,
    compute_stats, load_all, run_intent,
};

const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);
const GENRES: [&str; 8] = [
    "Drama", "Crime", "Thriller", "Sci-Fi", "Action", "Comedy", "Mystery", "Western",
];

fn bench_scales() -> &'static [usize] {
    &[100, 1_000, 5_000]
}

/// Deterministic synthetic catalogue: 1 director per 8 movies, 1-3 genres each.
fn synthetic_rows(movies: usize) -> Vec<RawRow> {
    (0..movies)
        .map(|i| {
            let genres: Vec<&str> = (0..1 + i % 3)
                .map(|g| GENRES[(i + g * 3) % GENRES.len()])
                .collect();
            RawRow {
                line: i as u64 + 2,
                movie_id: Some(i.to_string()),
                title: Some(format!("Movie {i}")),
                year: Some((1950 + i % 70).to_string()),
                genres: Some(genres.join("|")),
                director: Some(format!("Director {}", i / 8)),
                rating: Some(format!("{:.1}", 5.0 + (i % 50) as f64 / 10.0)),
            }
        })
        .collect()
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &movies in bench_scales() {
        let rows = synthetic_rows(movies);
        group.bench_function(BenchmarkId::new("rdf", movies), |b| {
            b.iter(|| {
                let rdf = RdfStore::in_memory().expect("rdf");
                load_all(&rows, &rdf, SecondaryTarget::Absent, &LoadOptions::default())
                    .expect("load")
            });
        });
        group.bench_function(BenchmarkId::new("property_graph", movies), |b| {
            b.iter(|| {
                let graph = SqliteGraph::open_in_memory().expect("graph");
                load_all(&rows, &graph, SecondaryTarget::Absent, &LoadOptions::default())
                    .expect("load")
            });
        });
        group.bench_function(BenchmarkId::new("dual", movies), |b| {
            b.iter(|| {
                let rdf = RdfStore::in_memory().expect("rdf");
                let graph = SqliteGraph::open_in_memory().expect("graph");
                load_all(
                    &rows,
                    &rdf,
                    SecondaryTarget::Store(&graph),
                    &LoadOptions::default(),
                )
                .expect("load")
            });
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let rows = synthetic_rows(1_000);
    let rdf = RdfStore::in_memory().expect("rdf");
    let graph = SqliteGraph::open_in_memory().expect("graph");
    load_all(
        &rows,
        &rdf,
        SecondaryTarget::Store(&graph),
        &LoadOptions::default(),
    )
    .expect("load");

    let backends: [&dyn GraphBackend; 2] = [&rdf, &graph];
    for backend in backends {
        group.bench_function(BenchmarkId::new("stats", backend.name()), |b| {
            b.iter(|| compute_stats(backend).expect("stats"));
        });
        group.bench_function(BenchmarkId::new("genre_breakdown", backend.name()), |b| {
            b.iter(|| run_intent(backend, &QueryIntent::GenreBreakdown).expect("query"));
        });
    }
    group.finish();
}

criterion_group!(
    name = ingest_benches;
    config = Criterion::default();
    targets = bench_load, bench_queries
);
criterion_main!(ingest_benches);
