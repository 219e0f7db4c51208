use criterion::{criterion_group, criterion_main, Criterion};

use helpers::index::TestIndex;
use scisearch::{
    base::MAX_PAGE_SIZE,
    builder::BuilderOptions,
    search::{search, Model, QueryTerm, SearchOptions},
};

fn criterion_benchmark(c: &mut Criterion) {
    const NUM_DOCS: usize = 10_000;

    let data = TestIndex::new(100, NUM_DOCS, 5., 10, None, BuilderOptions::default());
    let index = data.open(MAX_PAGE_SIZE);

    let query = vec![QueryTerm::new("t0", 1.2), QueryTerm::new("t5", 2.3)];

    for (name, model) in [
        ("existential", Model::Existential),
        ("vsm", Model::Vsm),
        ("bm25", Model::Bm25),
    ] {
        let options = SearchOptions {
            model,
            ..Default::default()
        };
        c.bench_function(name, |b| {
            b.iter(|| search(&index, query.clone(), &options).unwrap())
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(100);
    targets = criterion_benchmark
}
criterion_main!(benches);
