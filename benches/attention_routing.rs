use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use remedy::adapters::embeddings::HashEmbeddingProvider;
use remedy::domain::models::{RouterConfig, StrategyOption};
use remedy::domain::ports::NullDecisionSink;
use remedy::services::{
    blend_parameters, canonical_strategies, softmax, AttentionRouter, DecisionLedger,
    EmbeddingCache, RouteRequest,
};

const ERRORS: [&str; 4] = [
    "Error: Cannot find module 'chart.js' imported from src/Dashboard.tsx",
    "SyntaxError: Unexpected token '}' (42:7)",
    "TypeError: Cannot read properties of undefined (reading 'map')",
    "Error: Invalid configuration: missing VITE_API_URL",
];

fn build_router(dimension: usize) -> AttentionRouter {
    let embeddings = Arc::new(EmbeddingCache::with_settings(
        Arc::new(HashEmbeddingProvider::new(dimension)),
        10_000,
        Duration::from_secs(3600),
        Duration::from_secs(5),
        dimension,
    ));
    let ledger = Arc::new(DecisionLedger::new(
        Arc::new(NullDecisionSink),
        Duration::from_secs(60),
        10_000,
    ));
    AttentionRouter::new(embeddings, ledger, &RouterConfig::default())
}

fn bench_route(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("route_canonical_catalog");

    for dimension in [64usize, 384, 1536] {
        let router = build_router(dimension);
        let catalog: Vec<StrategyOption> = canonical_strategies();

        group.bench_with_input(
            BenchmarkId::from_parameter(dimension),
            &dimension,
            |b, _| {
                let mut i = 0usize;
                b.to_async(&runtime).iter(|| {
                    i = (i + 1) % ERRORS.len();
                    let request = RouteRequest::new(ERRORS[i], "repair", "dashboard")
                        .with_default_strategy("logic-fix");
                    let options = catalog.clone();
                    let router = &router;
                    async move { black_box(router.route(&request, options).await) }
                });
            },
        );
    }
    group.finish();
}

fn bench_softmax_blend(c: &mut Criterion) {
    let catalog = canonical_strategies();
    let logits: Vec<f64> = (0..catalog.len()).map(|i| i as f64 * 0.37 - 0.5).collect();

    c.bench_function("softmax_blend_catalog", |b| {
        b.iter(|| {
            let weights = softmax(black_box(&logits));
            black_box(blend_parameters(&catalog, &weights, 0))
        });
    });
}

criterion_group!(benches, bench_route, bench_softmax_blend);
criterion_main!(benches);
