//! Filter Engine Benchmarks
//!
//! ## Benchmark Groups
//!
//! - `filter_match/*`: single filter pass over N records
//! - `filter_preselect/*`: LatestById pre-selection over N records with K distinct ids
//! - `filter_order/*`: total ordering of N records
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench filter_benchmarks
//! cargo bench --bench filter_benchmarks -- "filter_match"
//! ```

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rstream_core::{
    filter_records, order_records, DescribedSerialization, OrderRecordsBy, RecordFilter,
    RecordsToFilterCriteria, RecordsToFilterSelectionStrategy, SerializedPayload,
    SerializerRepresentation, StreamRecord, StreamRecordMetadata, StringSerializedIdentifier, Tag,
    TypeRepresentation, VersionMatchStrategy, VersionedType,
};
use std::time::Duration;

// =============================================================================
// Test Utilities - All allocation happens here, outside timed loops
// =============================================================================

fn versioned(name: &str) -> VersionedType {
    VersionedType::new(TypeRepresentation::new(name, "1")).unwrap()
}

fn make_records(count: usize, distinct_ids: usize) -> Vec<StreamRecord> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let id_type = versioned("std::string::String");
    (0..count)
        .map(|i| {
            let object_type = if i % 3 == 0 { versioned("Invoice") } else { versioned("Order") };
            let tags = if i % 2 == 0 {
                vec![Tag::new("env", "prod"), Tag::flag("hot")]
            } else {
                vec![Tag::new("env", "dev")]
            };
            StreamRecord {
                internal_record_id: i as u64 + 1,
                metadata: StreamRecordMetadata::new(
                    Some(StringSerializedIdentifier::new(
                        format!("\"id-{}\"", i % distinct_ids),
                        id_type.clone(),
                    )),
                    object_type.clone(),
                    tags,
                    SerializerRepresentation::JSON,
                    base + ChronoDuration::milliseconds((count - i) as i64),
                    None,
                )
                .unwrap(),
                payload: DescribedSerialization {
                    payload_type: object_type,
                    serializer: SerializerRepresentation::JSON,
                    payload: SerializedPayload::String("{}".into()),
                },
            }
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn filter_match_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_match");
    let filter = RecordFilter::builder()
        .object_types([TypeRepresentation::unversioned("Order")])
        .tags([Tag::new("env", "prod")])
        .build()
        .unwrap();
    let criteria = RecordsToFilterCriteria::default();

    for count in [100usize, 1_000, 10_000] {
        let records = make_records(count, count / 10);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("type_and_tag", count), &records, |b, records| {
            b.iter(|| black_box(filter_records(records, &filter, &criteria).unwrap()));
        });
    }
    group.finish();
}

fn filter_preselect_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_preselect");
    let criteria =
        RecordsToFilterCriteria::new(RecordsToFilterSelectionStrategy::LatestById, VersionMatchStrategy::Any);
    let filter = RecordFilter::all();

    for distinct in [10usize, 100, 1_000] {
        let records = make_records(10_000, distinct);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("latest_by_id", distinct), &records, |b, records| {
            b.iter(|| black_box(filter_records(records, &filter, &criteria).unwrap()));
        });
    }
    group.finish();
}

fn filter_order_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_order");
    let records = make_records(10_000, 1_000);
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("timestamp_descending", |b| {
        b.iter_batched(
            || records.clone(),
            |mut batch| {
                order_records(&mut batch, OrderRecordsBy::TimestampDescending).unwrap();
                black_box(batch)
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(
    name = filter;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(20);
    targets = filter_match_benchmarks, filter_preselect_benchmarks, filter_order_benchmarks
);

criterion_main!(filter);
