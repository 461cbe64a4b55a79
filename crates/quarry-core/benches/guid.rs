//! Benchmarks for GUID generation and hashing.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use quarry_core::Guid;
use quarry_core::alloc::HashSet;

fn bench_generate(c: &mut Criterion) {
    c.bench_function("guid_generate", |b| b.iter(|| black_box(Guid::generate())));
}

fn bench_parse(c: &mut Criterion) {
    let text = Guid::generate().to_string();
    c.bench_function("guid_parse", |b| {
        b.iter(|| black_box(text.as_str()).parse::<Guid>())
    });
}

fn bench_set_lookup(c: &mut Criterion) {
    let guids: Vec<Guid> = (0..10_000).map(|_| Guid::generate()).collect();
    let set: HashSet<Guid> = guids.iter().copied().collect();
    c.bench_function("guid_set_lookup_10k", |b| {
        b.iter(|| guids.iter().filter(|g| set.contains(black_box(*g))).count())
    });
}

criterion_group!(benches, bench_generate, bench_parse, bench_set_lookup);
criterion_main!(benches);
