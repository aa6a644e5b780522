//! End to end: configuration file to a working stream

use rstream::{
    ClaimRequest, ExistingStreamEncounteredStrategy, HandlingStatus, OrderRecordsBy, RecordFilter, RecordLocation,
    SerializationKind, Stream, StreamConfig, CONFIG_FILE_NAME,
};
use rstream_storage::MemoryStreamEngine;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_configured_stream_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let config = StreamConfig {
        partitions: 3,
        serializer: "msgpack".into(),
        ..StreamConfig::named("invoices")
    };
    config.write_to_file(&path).unwrap();

    let loaded = StreamConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let stream = Stream::open(&loaded, Arc::new(MemoryStreamEngine::new())).unwrap();
    assert_eq!(stream.locators().len(), 3);
    stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();

    for i in 0..9u64 {
        stream
            .put_with_id(&format!("invoice-{i}"), &i, &Default::default())
            .unwrap();
    }
    let records = stream
        .get_records(&RecordFilter::all(), &Default::default(), OrderRecordsBy::TimestampAscending)
        .unwrap();
    assert_eq!(records.len(), 9);
    assert!(records
        .iter()
        .all(|r| r.record.metadata.serializer.kind == SerializationKind::MessagePack));

    let claim = stream.try_handle("mail", &ClaimRequest::new()).unwrap();
    let location = RecordLocation::from(claim.record().unwrap());
    stream.complete(&location, "mail", None).unwrap();
    assert_eq!(stream.get_handling_status(&location, "mail").unwrap(), HandlingStatus::Completed);
}

#[test]
fn test_bad_config_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "name = \"x\"\npartitions = 0\n").unwrap();
    assert!(StreamConfig::from_file(&path).unwrap_err().is_invalid_argument());
}
