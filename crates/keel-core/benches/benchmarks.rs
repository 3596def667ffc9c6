use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use keel_core::analysis::AnalysisEngine;
use keel_core::cfg::ControlFlowData;
use keel_core::tree::{Declaration, SourceFile};
use serde_json::{Value, json};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

fn constant(value: i64) -> Value {
    json!({ "kind": "constant", "value": { "int": value } })
}

/// `count` classes, each with a primary constructor, a property and a
/// function whose loop body ends in an early return.
fn generate_declarations(count: usize) -> Value {
    let declarations: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "kind": "class",
                "name": format!("Entity{i}"),
                "primary_constructor": [
                    { "name": "id", "type_ref": { "name": "Int" } }
                ],
                "declarations": [
                    {
                        "kind": "property",
                        "name": "visits",
                        "mutable": true,
                        "type_ref": { "name": "Int" },
                        "initializer": constant(0)
                    },
                    {
                        "kind": "function",
                        "name": "score",
                        "return_type": { "name": "Int" },
                        "body": {
                            "kind": "block",
                            "statements": [
                                {
                                    "kind": "local_variable",
                                    "name": "total",
                                    "mutable": true,
                                    "initializer": { "kind": "name", "name": "id" }
                                },
                                {
                                    "kind": "while",
                                    "condition": {
                                        "kind": "binary",
                                        "operator": "lt",
                                        "left": { "kind": "name", "name": "total" },
                                        "right": constant(100)
                                    },
                                    "body": {
                                        "kind": "assign",
                                        "target": { "kind": "name", "name": "total" },
                                        "value": {
                                            "kind": "binary",
                                            "operator": "plus",
                                            "left": { "kind": "name", "name": "total" },
                                            "right": { "kind": "name", "name": "visits" }
                                        }
                                    }
                                },
                                {
                                    "kind": "return",
                                    "value": { "kind": "name", "name": "total" }
                                }
                            ]
                        }
                    }
                ]
            })
        })
        .collect();
    json!({ "declarations": declarations })
}

fn read_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("{}/{}", FIXTURES_DIR, path))
        .unwrap_or_else(|_| panic!("Failed to read fixture: {}", path))
}

fn bench_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("loading");

    let source = generate_declarations(100).to_string();
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("deserialize_100_classes", |b| {
        b.iter(|| SourceFile::from_json(black_box("generated.keel.json"), black_box(&source)))
    });

    group.finish();
}

fn bench_control_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_flow");

    let file = SourceFile::from_value("generated.keel.json", generate_declarations(1))
        .expect("generated tree is valid");
    let Declaration::Class(class) = &file.declarations[0] else {
        panic!("expected a class");
    };
    let Some(Declaration::Function(function)) = class.declarations.get(1) else {
        panic!("expected a function");
    };
    let body = function.body.as_ref().expect("function has a body");

    group.bench_function("build_loop_body", |b| {
        b.iter(|| ControlFlowData::build(black_box(function.id), black_box(body)))
    });

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");

    let engine = AnalysisEngine::new();

    for name in ["delegation", "namespaces", "returns"] {
        let path = format!("resolve/{name}.keel.json");
        let file = SourceFile::from_json(&path, &read_fixture(&path)).expect("valid fixture");
        group.bench_function(format!("fixture_{name}"), |b| {
            b.iter(|| engine.analyze(black_box(&file)))
        });
    }

    for size in [10, 50, 100, 500] {
        let file = SourceFile::from_value("generated.keel.json", generate_declarations(size))
            .expect("generated tree is valid");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("classes", size), &file, |b, file| {
            b.iter(|| engine.analyze(black_box(file)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_loading, bench_control_flow, bench_analysis);
criterion_main!(benches);
