//! Criterion benchmarks for onion-index.
//!
//! Covers text analysis, query parsing, committing a batch of pages and
//! searching a committed index.

use std::hint::black_box;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use onion_index::analysis::analyzer::{Analyzer, SimpleAnalyzer};
use onion_index::config::IndexConfig;
use onion_index::document::Document;
use onion_index::query::parser::QueryParser;
use onion_index::service::IndexHandle;
use tempfile::TempDir;

const WORDS: &[&str] = &[
    "market", "forum", "mirror", "onion", "service", "index", "directory", "wiki", "mail",
    "hosting", "archive", "library", "search", "news", "chat", "board", "shop", "paste",
];

/// Generate crawled pages for benchmarking.
fn generate_pages(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let body: Vec<&str> = (0..60).map(|j| WORDS[(i * 7 + j * 13) % WORDS.len()]).collect();
            let host = format!("h{}.onion", i % 50);
            Document::page(
                format!("http://{host}/{i}"),
                host,
                format!("{} {}", WORDS[i % WORDS.len()], WORDS[(i + 3) % WORDS.len()]),
                body.join(" "),
            )
        })
        .collect()
}

fn open_index(dir: &TempDir) -> IndexHandle {
    IndexHandle::open(&IndexConfig::new(dir.path())).unwrap()
}

fn bench_analysis(c: &mut Criterion) {
    let analyzer = SimpleAnalyzer::default();
    let text: String = (0..500).map(|i| WORDS[i % WORDS.len()]).collect::<Vec<_>>().join(" ");

    let mut group = c.benchmark_group("analysis");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("simple_analyzer", |b| {
        b.iter(|| black_box(analyzer.analyze(black_box(&text))))
    });
    group.finish();
}

fn bench_query_parser(c: &mut Criterion) {
    let parser = QueryParser::new();
    let query = r#"+market -forum PageTitle:"onion mirror" Hostname:h1.onion sea*"#;
    c.bench_function("parse_query", |b| {
        b.iter(|| black_box(parser.parse(black_box(query)).unwrap()))
    });
}

fn bench_add_persist(c: &mut Criterion) {
    let pages = generate_pages(500);

    let mut group = c.benchmark_group("indexing");
    group.sample_size(10);
    group.throughput(Throughput::Elements(pages.len() as u64));
    group.bench_function("add_persist_500", |b| {
        b.iter_batched(
            || TempDir::new().unwrap(),
            |dir| {
                let handle = open_index(&dir);
                for page in &pages {
                    handle.add(page).unwrap();
                }
                black_box(handle.persist().unwrap());
                handle.close().unwrap();
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let handle = open_index(&dir);
    // Several commits so searches span more than one segment.
    for chunk in generate_pages(2000).chunks(400) {
        for page in chunk {
            handle.add(page).unwrap();
        }
        handle.persist().unwrap();
    }

    let mut group = c.benchmark_group("search");
    let queries = [
        "market",
        "market AND forum",
        "\"onion service\"",
        "arch*",
        "Hostname:h7.onion",
    ];
    for query in queries {
        group.bench_function(query, |b| {
            b.iter(|| black_box(handle.search(black_box(query)).unwrap()))
        });
    }
    group.finish();
    handle.close().unwrap();
}

criterion_group!(benches, bench_analysis, bench_query_parser, bench_add_persist, bench_search);
criterion_main!(benches);
