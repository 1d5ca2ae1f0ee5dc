#![allow(missing_docs)]

//! Benchmarks for the built-in canonicalizers.
//!
//! Canonicalization sits on the content registration hot path, so these
//! benchmarks track its cost per artifact type at a few schema sizes.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tabula_core::ArtifactType;
use tabula_registry::CanonicalizerRegistry;

fn avro_record(field_count: usize) -> Vec<u8> {
    let fields: Vec<String> = (0..field_count)
        .map(|i| format!("{{\"name\": \"field_{i}\", \"type\": \"string\", \"doc\": \"column {i}\"}}"))
        .collect();
    format!(
        "{{\"type\": \"record\", \"name\": \"Bench\", \"namespace\": \"com.example\", \"fields\": [{}]}}",
        fields.join(", ")
    )
    .into_bytes()
}

fn json_document(key_count: usize) -> Vec<u8> {
    let entries: Vec<String> = (0..key_count)
        .map(|i| format!("\"key_{i}\": {{\"index\": {i}, \"label\": \"value {i}\"}}"))
        .collect();
    format!("{{ {} }}", entries.join(", ")).into_bytes()
}

fn protobuf_file(message_count: usize) -> Vec<u8> {
    let messages: Vec<String> = (0..message_count)
        .map(|i| {
            format!(
                "// message number {i}\nmessage Bench{i} {{\n  string name = 1;\n  int64 value = 2;\n}}\n"
            )
        })
        .collect();
    format!("syntax = \"proto3\";\n\npackage bench;\n\n{}", messages.join("\n")).into_bytes()
}

fn canonicalize_benchmark(c: &mut Criterion) {
    let registry = CanonicalizerRegistry::builtin();
    let mut group = c.benchmark_group("canonicalize");

    for field_count in [4_usize, 32, 256] {
        let schema = avro_record(field_count);
        group.bench_function(format!("avro_{field_count}_fields"), |b| {
            b.iter(|| {
                let canonical = registry.canonical_form(&ArtifactType::avro(), &schema);
                black_box(canonical);
            });
        });
    }

    for key_count in [4_usize, 32, 256] {
        let document = json_document(key_count);
        group.bench_function(format!("json_{key_count}_keys"), |b| {
            b.iter(|| {
                let canonical = registry.canonical_form(&ArtifactType::json(), &document);
                black_box(canonical);
            });
        });
    }

    for message_count in [1_usize, 8, 64] {
        let proto = protobuf_file(message_count);
        group.bench_function(format!("protobuf_{message_count}_messages"), |b| {
            b.iter(|| {
                let canonical = registry.canonical_form(&ArtifactType::protobuf(), &proto);
                black_box(canonical);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, canonicalize_benchmark);
criterion_main!(benches);
