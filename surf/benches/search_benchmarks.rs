use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use surf::backends::memory::{MemoryObjectStore, MemoryTable, MemoryTableStore, MemoryTreeStore};
use surf::decode::{proto, AttributeValue, DefaultDecoderFactory, Record};
use surf::search::chunks::split_into_n_chunks;
use surf::search::{
    BucketSearchInput, BucketSearcher, MatchLevel, RecursiveSearcher, RegexMatcher, SearchInput,
    TableSearchInput, TableSearcher,
};

fn nested_message(depth: usize) -> Vec<u8> {
    let mut msg = vec![0x12, 11];
    msg.extend_from_slice(b"hello world");
    for _ in 0..depth {
        let mut outer = vec![0x08, 0x96, 0x01, 0x1a, msg.len() as u8];
        outer.extend_from_slice(&msg);
        msg = outer;
    }
    msg
}

fn bench_proto_sniff(c: &mut Criterion) {
    let mut group = c.benchmark_group("Proto Sniff");
    for depth in [0, 2, 4] {
        let blob = nested_message(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &blob, |b, blob| {
            b.iter(|| black_box(proto::parse_unknown(blob)));
        });
    }
    group.finish();
}

fn bench_chunking(c: &mut Criterion) {
    let items: Vec<usize> = (0..10_000).collect();
    c.bench_function("split_into_64_chunks", |b| {
        b.iter(|| black_box(split_into_n_chunks(&items, 64)));
    });
}

fn bench_bucket_fan_out(c: &mut Criterion) {
    let mut store = MemoryObjectStore::new().with_page_size(100);
    for bucket in 0..20 {
        store = store.with_bucket(
            format!("bucket-{}", bucket),
            (0..1_000).map(|i| format!("data/{}/object-{}.json", i % 10, i)),
        );
    }
    let searcher = BucketSearcher::new(store, RegexMatcher::default());

    let mut group = c.benchmark_group("Bucket Fan-out");
    for parallel in [1, 4, 8] {
        let input = BucketSearchInput::new("", "", r"object-\d+7\.json", parallel, true);
        group.bench_with_input(BenchmarkId::from_parameter(parallel), &input, |b, input| {
            b.iter(|| black_box(searcher.search(input).unwrap()));
        });
    }
    group.finish();
}

fn bench_tree_walk(c: &mut Criterion) {
    let store = MemoryTreeStore::new(
        (0..2_000).map(|i| format!("secret/team-{}/service-{}/key-{}", i % 13, i % 97, i)),
    );
    let searcher = RecursiveSearcher::new(store, RegexMatcher::default());

    c.bench_function("tree_walk_parallel_8", |b| {
        b.iter(|| black_box(searcher.search(&SearchInput::new("key-1", "", 8)).unwrap()));
    });
}

fn bench_table_scan(c: &mut Criterion) {
    let mut table = MemoryTable::new("events", ["id"]);
    for i in 0..2_000 {
        let record: Record = [
            ("id".to_string(), AttributeValue::String(format!("evt-{}", i))),
            ("payload".to_string(), AttributeValue::Binary(nested_message(i % 3))),
        ]
        .into_iter()
        .collect();
        table = table.with_item(record);
    }
    let store = MemoryTableStore::new().with_table(table).with_page_size(250);
    let searcher = TableSearcher::new(store, RegexMatcher::default(), DefaultDecoderFactory::default());
    let input = TableSearchInput::new("events", "hello", MatchLevel::Object, 4).unwrap();

    c.bench_function("table_scan_object_level", |b| {
        b.iter(|| black_box(searcher.search(&input).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_proto_sniff,
    bench_chunking,
    bench_bucket_fan_out,
    bench_tree_walk,
    bench_table_scan
);
criterion_main!(benches);
