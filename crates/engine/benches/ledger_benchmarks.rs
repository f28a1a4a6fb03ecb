use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use serde_json::json;

use emporium_core::{ActorId, AggregateId, Percent};
use emporium_engine::Emporium;
use emporium_inventory::StockCause;
use emporium_sales::SalesOrderStatus;

fn seeded_engine(products: usize, stock_per_product: i64) -> (Emporium, Vec<emporium_catalog::ProductId>) {
    let engine = Emporium::in_memory();
    let staff = ActorId::new();
    let now = Utc::now();

    let product_ids: Vec<_> = (0..products)
        .map(|i| {
            let product_id = engine
                .directory()
                .create_product(
                    format!("SKU-{i:04}"),
                    format!("Product {i}"),
                    "apparel",
                    10_00 + i as u64,
                    staff,
                    now,
                )
                .unwrap();
            engine
                .ledger()
                .adjust(product_id, stock_per_product, StockCause::Manual, staff, now)
                .unwrap();
            product_id
        })
        .collect();

    (engine, product_ids)
}

/// Reserve/release round-trips on a single hot product stream.
fn bench_ledger_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_roundtrip");
    group.throughput(Throughput::Elements(1));

    group.bench_function("reserve_then_release", |b| {
        let (engine, product_ids) = seeded_engine(1, 1_000_000_000);
        let product_id = product_ids[0];
        let staff = ActorId::new();
        let now = Utc::now();

        b.iter(|| {
            let order_id = AggregateId::new();
            engine
                .ledger()
                .reserve(black_box(product_id), order_id, 1, staff, now)
                .unwrap();
            engine
                .ledger()
                .release(black_box(product_id), order_id, 1, staff, now)
                .unwrap();
        });
    });

    group.finish();
}

/// Checkout plus confirmation across a growing stream (stream replay cost).
fn bench_order_confirmation(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_confirmation");

    group.bench_function("create_and_confirm", |b| {
        let (engine, product_ids) = seeded_engine(1, 1_000_000_000);
        let product_id = product_ids[0];
        let staff = ActorId::new();
        let now = Utc::now();

        b.iter(|| {
            let receipt = engine
                .orders()
                .create_order(staff, &[(product_id, 1)], now)
                .unwrap();
            engine
                .orders()
                .transition(receipt.order_id, SalesOrderStatus::Confirmed, staff, now)
                .unwrap();
        });
    });

    group.finish();
}

/// Rule application across catalogs of different sizes.
fn bench_rule_application(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_application");

    for catalog_size in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(catalog_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(catalog_size),
            &catalog_size,
            |b, &catalog_size| {
                let (engine, _) = seeded_engine(catalog_size, 100);
                let staff = ActorId::new();
                let now = Utc::now();
                let rule_id = engine
                    .directory()
                    .create_rule(
                        "apparel 10%",
                        "category",
                        json!({ "category": "apparel" }),
                        Percent::new(10).unwrap(),
                        2,
                        None,
                        staff,
                        now,
                    )
                    .unwrap();

                b.iter(|| {
                    let outcome = engine.rules().apply_rule(black_box(rule_id), staff, now).unwrap();
                    black_box(outcome);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ledger_roundtrip,
    bench_order_confirmation,
    bench_rule_application
);
criterion_main!(benches);
