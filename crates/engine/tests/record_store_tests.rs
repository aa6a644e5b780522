//! Record store integration tests
//!
//! Exercise puts and reads through a `Stream` over the in-memory engine,
//! including partitioned streams where reads fan out across locators.

use rstream_core::{
    impl_stream_type, serialize_id, ExistingRecordStrategy, ExistingStreamEncounteredStrategy, OrderRecordsBy,
    PayloadSerializer, RecordFilter, RecordNotFoundStrategy, RecordsToFilterCriteria,
    RecordsToFilterSelectionStrategy, SerializationKind, StreamObject, Tag, TagMatchStrategy, TypeRepresentation,
    VersionMatchStrategy,
};
use rstream_engine::{PutOptions, RecordLocation, Stream};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    amount: u64,
    priority: bool,
}

impl_stream_type!(Order, "shop::Order", "2");

impl StreamObject for Order {
    type Id = String;

    fn id(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn tags(&self) -> Vec<Tag> {
        if self.priority {
            vec![Tag::flag("priority")]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Refund {
    order_id: String,
}

impl_stream_type!(Refund, "shop::Refund", "1");

impl StreamObject for Refund {
    type Id = String;

    fn id(&self) -> Option<String> {
        Some(self.order_id.clone())
    }
}

fn order(id: &str, amount: u64) -> Order {
    Order {
        id: id.into(),
        amount,
        priority: false,
    }
}

fn create(stream: Stream) -> Stream {
    stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();
    stream
}

fn single() -> Stream {
    create(Stream::in_memory("orders").unwrap())
}

fn partitioned(n: u32) -> Stream {
    create(Stream::builder("orders").partitions(n).build().unwrap())
}

fn id(s: &str) -> String {
    s.to_string()
}

mod writes {
    use super::*;

    #[test]
    fn test_prune_keeps_retention_count_newest() {
        let stream = single();
        for amount in 0..5 {
            stream
                .put_with_options(&order("a", amount), &PutOptions::prune_by_id(2))
                .unwrap();
        }
        let all = stream
            .get_all_records_by_id(&id("a"), OrderRecordsBy::InternalRecordIdAscending, RecordNotFoundStrategy::Throw)
            .unwrap();
        let ids: Vec<u64> = all.iter().map(|r| r.record.internal_record_id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_prune_with_zero_retention_keeps_new_record() {
        let stream = single();
        stream.put(&order("a", 1)).unwrap();
        let report = stream
            .put_with_options(&order("a", 2), &PutOptions::prune_by_id(0))
            .unwrap();
        assert_eq!(report.result.pruned_record_ids, vec![1]);
        let latest: Option<Order> = stream
            .get_latest_object_by_id(&id("a"), RecordNotFoundStrategy::Throw)
            .unwrap();
        assert_eq!(latest.unwrap().amount, 2);
    }

    #[test]
    fn test_prune_by_id_and_type_leaves_other_types() {
        let stream = single();
        stream.put(&Refund { order_id: id("a") }).unwrap();
        stream
            .put_with_options(&order("a", 1), &PutOptions::prune_by_id_and_type(1))
            .unwrap();
        stream
            .put_with_options(&order("a", 2), &PutOptions::prune_by_id_and_type(1))
            .unwrap();

        let all = stream
            .get_all_metadata_by_id(&id("a"), OrderRecordsBy::InternalRecordIdAscending, RecordNotFoundStrategy::Throw)
            .unwrap();
        let types: Vec<&str> = all
            .iter()
            .map(|m| m.metadata.object_type.with_version().name.as_str())
            .collect();
        assert_eq!(types, vec!["shop::Refund", "shop::Order"]);
    }

    #[test]
    fn test_throw_if_found_writes_nothing() {
        let stream = single();
        stream.put(&order("a", 1)).unwrap();
        let err = stream
            .put_with_options(&order("a", 2), &PutOptions::with_strategy(ExistingRecordStrategy::ThrowIfFoundById))
            .unwrap_err();
        assert!(matches!(err, rstream_core::StreamError::RecordAlreadyExists { .. }));
        assert_eq!(
            stream
                .get_all_records_by_id(&id("a"), OrderRecordsBy::InternalRecordIdAscending, RecordNotFoundStrategy::Throw)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_do_not_write_if_found_returns_no_location() {
        let stream = single();
        let options = PutOptions::with_strategy(ExistingRecordStrategy::DoNotWriteIfFoundById);
        assert!(stream.put_with_options(&order("a", 1), &options).unwrap().location().is_some());
        let report = stream.put_with_options(&order("a", 2), &options).unwrap();
        assert_eq!(report.location(), None);
        assert_eq!(report.result.existing_record_ids, vec![1]);
    }

    #[test]
    fn test_unknown_strategies_rejected_before_engine() {
        let stream = single();
        let options = PutOptions {
            version_match_strategy: VersionMatchStrategy::Unknown,
            ..PutOptions::default()
        };
        assert!(stream.put_with_options(&order("a", 1), &options).unwrap_err().is_invalid_argument());
        assert!(stream
            .put_with_options(&order("a", 1), &PutOptions::prune_by_id(-1))
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_put_without_stream_fails() {
        let stream = Stream::in_memory("orders").unwrap();
        assert!(stream.put(&order("a", 1)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_blank_tag_rejected() {
        let stream = single();
        let options = PutOptions {
            tags: vec![Tag::flag(" ")],
            ..PutOptions::default()
        };
        assert!(stream.put_with_options(&order("a", 1), &options).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_prune_before_internal_record_id() {
        let stream = single();
        for amount in 0..4 {
            stream.put(&order("a", amount)).unwrap();
        }
        let locator = stream.locators()[0].clone();
        assert_eq!(stream.prune_before_internal_record_id(&locator, 3).unwrap(), 2);
        let remaining = stream
            .get_internal_record_ids(&RecordFilter::all(), &Default::default(), RecordNotFoundStrategy::Throw)
            .unwrap();
        assert_eq!(
            remaining,
            vec![RecordLocation::new(locator.clone(), 3), RecordLocation::new(locator, 4)]
        );
    }
}

mod reads {
    use super::*;

    #[test]
    fn test_latest_by_id_with_tags() {
        let stream = single();
        stream
            .put(&Order {
                priority: true,
                ..order("a", 1)
            })
            .unwrap();
        stream.put(&order("a", 2)).unwrap();

        let latest = stream
            .get_latest_record_by_id(&id("a"), &[], RecordNotFoundStrategy::Throw)
            .unwrap()
            .unwrap();
        assert_eq!(latest.record.internal_record_id, 2);

        let tagged = stream
            .get_latest_metadata_by_id(&id("a"), &[Tag::flag("priority")], RecordNotFoundStrategy::Throw)
            .unwrap()
            .unwrap();
        assert_eq!(tagged.internal_record_id, 1);
    }

    #[test]
    fn test_empty_reads_follow_not_found_strategy() {
        let stream = single();
        assert!(stream
            .get_all_records_by_id(&id("x"), OrderRecordsBy::InternalRecordIdAscending, RecordNotFoundStrategy::ReturnDefault)
            .unwrap()
            .is_empty());
        assert!(stream
            .get_all_metadata_by_id(&id("x"), OrderRecordsBy::InternalRecordIdAscending, RecordNotFoundStrategy::Throw)
            .unwrap_err()
            .is_not_found());
        assert!(stream
            .get_latest_record(&RecordFilter::all(), &Default::default(), RecordNotFoundStrategy::Throw)
            .unwrap_err()
            .is_not_found());
        assert!(stream
            .get_all_records_by_id(&id("x"), OrderRecordsBy::Unspecified, RecordNotFoundStrategy::ReturnDefault)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_does_any_exist_by_id() {
        let stream = single();
        stream.put(&order("a", 1)).unwrap();
        assert!(stream.does_any_exist_by_id(&id("a"), &[]).unwrap());
        assert!(!stream.does_any_exist_by_id(&id("b"), &[]).unwrap());
        assert!(!stream.does_any_exist_by_id(&id("a"), &[Tag::flag("priority")]).unwrap());
    }

    #[test]
    fn test_latest_by_id_selection() {
        let stream = single();
        stream.put(&order("a", 1)).unwrap();
        stream.put(&order("b", 1)).unwrap();
        stream.put(&order("a", 2)).unwrap();

        let criteria = RecordsToFilterCriteria::new(RecordsToFilterSelectionStrategy::LatestById, VersionMatchStrategy::Any);
        let records = stream
            .get_records(&RecordFilter::all(), &criteria, OrderRecordsBy::InternalRecordIdAscending)
            .unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.record.internal_record_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_filter_by_object_type_and_version() {
        let stream = single();
        stream.put(&order("a", 1)).unwrap();
        stream.put(&Refund { order_id: id("a") }).unwrap();

        let any_version = RecordFilter::builder()
            .object_types([TypeRepresentation::unversioned("shop::Order")])
            .build()
            .unwrap();
        assert_eq!(
            stream
                .get_metadatas(&any_version, &Default::default(), OrderRecordsBy::InternalRecordIdAscending)
                .unwrap()
                .len(),
            1
        );

        let wrong_version = RecordFilter::builder()
            .object_types([TypeRepresentation::new("shop::Order", "1")])
            .version_match_strategy(VersionMatchStrategy::SpecifiedVersion)
            .build()
            .unwrap();
        assert!(stream
            .get_metadatas(&wrong_version, &Default::default(), OrderRecordsBy::InternalRecordIdAscending)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_tag_match_any() {
        let stream = single();
        stream
            .put_with_options(
                &order("a", 1),
                &PutOptions {
                    tags: vec![Tag::new("region", "eu")],
                    ..PutOptions::default()
                },
            )
            .unwrap();
        stream.put(&order("b", 1)).unwrap();

        let filter = RecordFilter::builder()
            .tags([Tag::new("region", "eu"), Tag::new("region", "us")])
            .tag_match_strategy(TagMatchStrategy::RecordContainsAnyQueryTag)
            .build()
            .unwrap();
        let found = stream
            .get_distinct_string_serialized_ids(&filter, &Default::default())
            .unwrap();
        assert_eq!(found, vec![serialize_id(&id("a")).unwrap()]);
    }

    #[test]
    fn test_distinct_ids_are_typed() {
        let stream = single();
        stream.put(&order("a", 1)).unwrap();
        stream.put(&order("a", 2)).unwrap();
        stream.put(&order("b", 1)).unwrap();
        stream
            .put_with_id(&7u64, &order("c", 1), &PutOptions::default())
            .unwrap();

        let ids: Vec<String> = stream
            .get_distinct_ids(&RecordFilter::all(), &Default::default())
            .unwrap();
        assert_eq!(ids, vec![id("a"), id("b")]);
        let numeric: Vec<u64> = stream
            .get_distinct_ids(&RecordFilter::all(), &Default::default())
            .unwrap();
        assert_eq!(numeric, vec![7]);
    }
}

mod partitions {
    use super::*;

    #[test]
    fn test_same_id_always_lands_on_one_locator() {
        let stream = partitioned(4);
        let first = stream.put(&order("a", 1)).unwrap().unwrap();
        let second = stream.put(&order("a", 2)).unwrap().unwrap();
        assert_eq!(first.locator, second.locator);
        assert_eq!(second.internal_record_id, first.internal_record_id + 1);
    }

    #[test]
    fn test_fan_out_reads_see_every_partition() {
        let stream = partitioned(4);
        let names: Vec<String> = (0..40).map(|i| format!("order-{i}")).collect();
        for name in &names {
            stream.put(&order(name, 1)).unwrap();
        }

        let records = stream
            .get_records(&RecordFilter::all(), &Default::default(), OrderRecordsBy::TimestampAscending)
            .unwrap();
        assert_eq!(records.len(), names.len());
        for pair in records.windows(2) {
            assert!(pair[0].record.metadata.timestamp_utc <= pair[1].record.metadata.timestamp_utc);
        }

        let used: std::collections::HashSet<_> = records.iter().map(|r| r.locator.clone()).collect();
        assert!(used.len() > 1);

        let mut ids: Vec<String> = stream
            .get_distinct_ids(&RecordFilter::all(), &Default::default())
            .unwrap();
        ids.sort();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_latest_record_across_partitions() {
        let stream = partitioned(3);
        for i in 0..10 {
            stream.put(&order(&format!("order-{i}"), i)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let latest = stream
            .get_latest_record(&RecordFilter::all(), &Default::default(), RecordNotFoundStrategy::Throw)
            .unwrap()
            .unwrap();
        let object: Order = PayloadSerializer::deserialize(&latest.record.payload).unwrap();
        assert_eq!(object.amount, 9);
    }
}

mod serializers {
    use super::*;

    #[test]
    fn test_message_pack_round_trip() {
        let stream = create(Stream::builder("orders").message_pack().build().unwrap());
        stream.put(&order("a", 42)).unwrap();

        let record = stream
            .get_latest_record_by_id(&id("a"), &[], RecordNotFoundStrategy::Throw)
            .unwrap()
            .unwrap();
        assert_eq!(record.record.metadata.serializer.kind, SerializationKind::MessagePack);
        let back: Order = rmp_serde::from_slice(match &record.record.payload.payload {
            rstream_core::SerializedPayload::Binary(bytes) => bytes.as_slice(),
            other => panic!("expected binary payload, got {other:?}"),
        })
        .unwrap();
        assert_eq!(back, order("a", 42));
    }

    #[test]
    fn test_ids_serialize_identically_across_codecs() {
        let json = create(Stream::in_memory("a").unwrap());
        let msgpack = create(Stream::builder("b").message_pack().build().unwrap());
        json.put(&order("x", 1)).unwrap();
        msgpack.put(&order("x", 1)).unwrap();

        let a = json
            .get_latest_metadata_by_id(&id("x"), &[], RecordNotFoundStrategy::Throw)
            .unwrap()
            .unwrap();
        let b = msgpack
            .get_latest_metadata_by_id(&id("x"), &[], RecordNotFoundStrategy::Throw)
            .unwrap()
            .unwrap();
        assert_eq!(a.metadata.string_serialized_id, b.metadata.string_serialized_id);
    }
}
