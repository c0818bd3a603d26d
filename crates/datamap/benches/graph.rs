//! Benchmark graph and flat materialization over in-memory result sets.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use datamap::{Command, Entity, InsertQuery, MappingRepository, MemoryCursor, SqlServerDialect, map_graph, row};

#[derive(Debug, Default, Entity)]
struct Order {
    #[orm(id, column = "ID")]
    id: i64,
    #[orm(column = "OrderName")]
    name: String,
    #[orm(has_many)]
    items: Vec<OrderItem>,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "OrderItems")]
struct OrderItem {
    #[orm(id, auto_increment, return_value, column = "OrderItemID")]
    id: i64,
    #[orm(column = "ItemDescription")]
    description: String,
    #[orm(column = "Price")]
    price: f64,
}

/// `roots` orders with `children` items each, sorted by order.
fn joined(roots: i64, children: i64) -> MemoryCursor {
    let mut cursor = MemoryCursor::new(["ID", "OrderName", "OrderItemID", "ItemDescription", "Price"]);
    for order in 0..roots {
        for item in 0..children {
            cursor.push_row(row![
                order,
                format!("Order{order}"),
                order * children + item,
                "item",
                item as f64 * 1.5,
            ]);
        }
    }
    cursor
}

fn bench_map_graph(c: &mut Criterion) {
    let repo = MappingRepository::new();
    let mut group = c.benchmark_group("graph/map_graph");

    for roots in [10, 100, 1000] {
        let cursor = joined(roots, 5);
        group.bench_with_input(BenchmarkId::from_parameter(roots), &cursor, |b, cursor| {
            b.iter(|| {
                let orders: Vec<Order> = map_graph(&repo, cursor.clone()).unwrap();
                black_box(orders);
            });
        });
    }

    group.finish();
}

fn bench_flat_query(c: &mut Criterion) {
    let repo = MappingRepository::new();
    let mut group = c.benchmark_group("graph/flat_query");

    for rows in [10, 1000] {
        let cursor = joined(rows, 1);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &cursor, |b, cursor| {
            b.iter(|| {
                let items: Vec<OrderItem> =
                    datamap::row::query(&repo, cursor.clone()).unwrap();
                black_box(items);
            });
        });
    }

    group.finish();
}

fn bench_insert_generation(c: &mut Criterion) {
    let repo = MappingRepository::new();
    let map = repo.column_map::<OrderItem>().unwrap();
    let entity = OrderItem {
        id: 0,
        description: "Red car".into(),
        price: 100.35,
    };
    let mut command = Command::new("");
    let binder = datamap::Binder::new(repo.converters());
    binder.bind_insert(&mut command, &map, &entity).unwrap();

    c.bench_function("graph/insert_generation", |b| {
        b.iter(|| {
            let sql = InsertQuery::new(&SqlServerDialect, map.columns(), &command, map.table_name())
                .generate()
                .unwrap();
            black_box(sql);
        });
    });
}

criterion_group!(benches, bench_map_graph, bench_flat_query, bench_insert_generation);
criterion_main!(benches);
