use criterion::{Criterion, criterion_group, criterion_main};
use contract_qa::embeddings::chunking::{ChunkingConfig, split_text};
use std::fmt::Write;
use std::hint::black_box;

/// Roughly forty pages of numbered contract clauses
fn contract_text() -> String {
    let mut text = String::new();
    for section in 1..=40 {
        let _ = writeln!(text, "Section {section}. Obligations of the Parties\n");
        for clause in 1..=12 {
            let _ = writeln!(
                text,
                "Clause {section}.{clause} The Supplier shall deliver the services described in \
                 Schedule {clause} with reasonable skill and care. The Customer shall pay each \
                 undisputed invoice within thirty days. Confidential Information disclosed under \
                 this clause remains the property of the disclosing party."
            );
        }
        text.push('\n');
    }
    text
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let content = contract_text();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| split_text(black_box(&content), black_box(&config)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
