//! In-memory backing engine
//!
//! Each resource locator is one partition holding a records relation and a
//! handling-entries relation. Partitions live in a DashMap so different
//! locators never contend; within a partition an RwLock makes every
//! operation atomic. Put evaluates its plan, appends and prunes under a
//! single write lock, so readers see either none or all of it.
//!
//! # Ids
//!
//! Record ids and handling entry ids are per-partition counters starting at
//! 1. Record id 0 is never assigned; it is reserved for stream-wide
//! blocking entries.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rstream_concurrency::LocalMutex;
use rstream_core::{
    filter_records, order_records, plan_put, DescribedSerialization, DistributedMutex, ExistingRecordStrategy,
    ExistingStreamEncounteredStrategy, ExistingStreamNotEncounteredStrategy, HandlingEntry, LocatedMetadata,
    LocatedRecord, NewHandlingEntry, OrderRecordsBy, PutRecordResult, RecordFilter, RecordsToFilterCriteria,
    ResourceLocator, StandardOp, StandardOutput, StandardStreamEngine, StreamError, StreamRecord,
    StreamRecordMetadata, StreamResult, StringSerializedIdentifier, VersionMatchStrategy, BLOCKING_CONCERN,
    BLOCKING_RECORD_ID,
};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Storage for one resource locator
#[derive(Debug)]
pub struct Partition {
    /// Records keyed by internal id, ascending
    records: BTreeMap<u64, StreamRecord>,
    /// Handling entries in id order
    handling: Vec<HandlingEntry>,
    next_record_id: u64,
    next_entry_id: u64,
    /// Timestamp of the newest handling entry
    last_entry_timestamp: Option<DateTime<Utc>>,
}

impl Partition {
    /// Create an empty partition
    pub fn new() -> Self {
        Partition {
            records: BTreeMap::new(),
            handling: Vec::new(),
            next_record_id: 1,
            next_entry_id: 1,
            last_entry_timestamp: None,
        }
    }

    /// Number of records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of handling entries
    pub fn handling_entry_count(&self) -> usize {
        self.handling.len()
    }

    fn matching(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
    ) -> StreamResult<Vec<&StreamRecord>> {
        let all: Vec<&StreamRecord> = self.records.values().collect();
        filter_records(&all, filter, criteria)
    }

    /// Entry timestamps never go backwards even if the wall clock does
    fn next_entry_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_entry_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_entry_timestamp = Some(ts);
        ts
    }

    fn remove_records(&mut self, ids: &[u64]) -> usize {
        let removed: FxHashSet<u64> = ids.iter().copied().filter(|id| self.records.remove(id).is_some()).collect();
        if !removed.is_empty() {
            self.handling.retain(|e| !removed.contains(&e.internal_record_id));
        }
        removed.len()
    }

    fn append_entries(&mut self, entries: Vec<NewHandlingEntry>) -> StreamResult<Vec<u64>> {
        // check every entry before assigning any id so a batch is all-or-nothing
        for entry in &entries {
            let is_blocking = entry.concern == BLOCKING_CONCERN && entry.internal_record_id == BLOCKING_RECORD_ID;
            if !is_blocking && !self.records.contains_key(&entry.internal_record_id) {
                return Err(StreamError::record_not_found(format!(
                    "internal record id {}",
                    entry.internal_record_id
                )));
            }
        }

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.next_entry_id;
            self.next_entry_id += 1;
            let timestamp_utc = self.next_entry_timestamp();
            self.handling.push(HandlingEntry {
                internal_handling_entry_id: id,
                internal_record_id: entry.internal_record_id,
                concern: entry.concern,
                status: entry.status,
                tags: entry.tags,
                details: entry.details,
                timestamp_utc,
            });
            ids.push(id);
        }
        Ok(ids)
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::new()
    }
}

/// A real, process-local [`StandardStreamEngine`]
///
/// Shared across threads through `Arc`; claims are serialized by the
/// embedded [`LocalMutex`].
pub struct MemoryStreamEngine {
    partitions: DashMap<ResourceLocator, Arc<RwLock<Partition>>>,
    mutex: LocalMutex,
}

impl MemoryStreamEngine {
    /// Create an engine with no streams
    pub fn new() -> Self {
        MemoryStreamEngine {
            partitions: DashMap::new(),
            mutex: LocalMutex::new(),
        }
    }

    /// Number of locators with storage
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Records stored on a locator, if it exists
    pub fn record_count(&self, locator: &ResourceLocator) -> Option<usize> {
        self.partition(locator).map(|p| p.read().record_count())
    }

    /// Handling entries stored on a locator, if it exists
    pub fn handling_entry_count(&self, locator: &ResourceLocator) -> Option<usize> {
        self.partition(locator).map(|p| p.read().handling_entry_count())
    }

    /// The claim mutex, for contention statistics
    pub fn local_mutex(&self) -> &LocalMutex {
        &self.mutex
    }

    // The DashMap guard is dropped before the partition lock is taken so a
    // slow partition never blocks access to others on the same shard.
    fn partition(&self, locator: &ResourceLocator) -> Option<Arc<RwLock<Partition>>> {
        self.partitions.get(locator).map(|p| Arc::clone(p.value()))
    }

    fn existing_partition(&self, locator: &ResourceLocator) -> StreamResult<Arc<RwLock<Partition>>> {
        self.partition(locator).ok_or_else(|| StreamError::StreamNotFound {
            locator: locator.to_string(),
        })
    }

    fn create_stream(
        &self,
        locator: ResourceLocator,
        strategy: ExistingStreamEncounteredStrategy,
    ) -> StreamResult<StandardOutput> {
        use dashmap::mapref::entry::Entry;
        match self.partitions.entry(locator) {
            Entry::Occupied(entry) => match strategy {
                ExistingStreamEncounteredStrategy::Skip => {
                    debug!(target: "rstream::engine", locator = %entry.key(), "Stream exists, skipping create");
                    Ok(StandardOutput::Unit)
                }
                _ => Err(StreamError::StreamAlreadyExists {
                    locator: entry.key().to_string(),
                }),
            },
            Entry::Vacant(entry) => {
                info!(target: "rstream::engine", locator = %entry.key(), "Created stream");
                entry.insert(Arc::new(RwLock::new(Partition::new())));
                Ok(StandardOutput::Unit)
            }
        }
    }

    fn delete_stream(
        &self,
        locator: ResourceLocator,
        strategy: ExistingStreamNotEncounteredStrategy,
    ) -> StreamResult<StandardOutput> {
        match self.partitions.remove(&locator) {
            Some(_) => {
                info!(target: "rstream::engine", locator = %locator, "Deleted stream");
                Ok(StandardOutput::Unit)
            }
            None => match strategy {
                ExistingStreamNotEncounteredStrategy::Skip => {
                    debug!(target: "rstream::engine", locator = %locator, "Stream missing, skipping delete");
                    Ok(StandardOutput::Unit)
                }
                _ => Err(StreamError::StreamNotFound {
                    locator: locator.to_string(),
                }),
            },
        }
    }

    fn put_record(
        &self,
        locator: ResourceLocator,
        mut metadata: StreamRecordMetadata,
        payload: DescribedSerialization,
        existing_record_strategy: ExistingRecordStrategy,
        record_retention_count: Option<i64>,
        version_match_strategy: VersionMatchStrategy,
    ) -> StreamResult<StandardOutput> {
        let partition = self.existing_partition(&locator)?;
        let mut partition = partition.write();

        let existing: Vec<&StreamRecord> = partition.records.values().collect();
        let plan = plan_put(
            &existing,
            &metadata,
            existing_record_strategy,
            record_retention_count,
            version_match_strategy,
        )?;

        if !plan.write {
            debug!(
                target: "rstream::engine",
                locator = %locator,
                strategy = %existing_record_strategy,
                existing = plan.existing_record_ids.len(),
                "Skipped write, matching record exists"
            );
            return Ok(StandardOutput::Put(PutRecordResult {
                internal_record_id: None,
                existing_record_ids: plan.existing_record_ids,
                pruned_record_ids: Vec::new(),
            }));
        }

        let id = partition.next_record_id;
        partition.next_record_id += 1;
        // write timestamps follow id order within a partition
        if let Some((_, newest)) = partition.records.iter().next_back() {
            if newest.metadata.timestamp_utc > metadata.timestamp_utc {
                metadata.timestamp_utc = newest.metadata.timestamp_utc;
            }
        }
        partition.records.insert(
            id,
            StreamRecord {
                internal_record_id: id,
                metadata,
                payload,
            },
        );
        let pruned = partition.remove_records(&plan.prune_record_ids);

        debug!(
            target: "rstream::engine",
            locator = %locator,
            internal_record_id = id,
            pruned,
            "Appended record"
        );
        Ok(StandardOutput::Put(PutRecordResult {
            internal_record_id: Some(id),
            existing_record_ids: plan.existing_record_ids,
            pruned_record_ids: plan.prune_record_ids,
        }))
    }

    fn get_records(
        &self,
        locator: ResourceLocator,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
        order: OrderRecordsBy,
    ) -> StreamResult<Vec<LocatedRecord>> {
        let Some(partition) = self.partition(&locator) else {
            return Ok(Vec::new());
        };
        let partition = partition.read();
        let mut records: Vec<LocatedRecord> = partition
            .matching(filter, criteria)?
            .into_iter()
            .map(|r| LocatedRecord {
                locator: locator.clone(),
                record: r.clone(),
            })
            .collect();
        order_records(&mut records, order)?;
        Ok(records)
    }

    fn matching_ids(
        &self,
        locator: &ResourceLocator,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
    ) -> StreamResult<Vec<u64>> {
        let Some(partition) = self.partition(locator) else {
            return Ok(Vec::new());
        };
        let partition = partition.read();
        Ok(partition
            .matching(filter, criteria)?
            .into_iter()
            .map(|r| r.internal_record_id)
            .collect())
    }

    fn distinct_ids(
        &self,
        locator: &ResourceLocator,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
    ) -> StreamResult<Vec<StringSerializedIdentifier>> {
        let Some(partition) = self.partition(locator) else {
            return Ok(Vec::new());
        };
        let partition = partition.read();
        let mut seen = FxHashSet::default();
        let mut ids = Vec::new();
        for record in partition.matching(filter, criteria)? {
            if let Some(id) = &record.metadata.string_serialized_id {
                if seen.insert(id.clone()) {
                    ids.push(id.clone());
                }
            }
        }
        Ok(ids)
    }

    fn prune_before(&self, locator: &ResourceLocator, internal_record_id: u64) -> StreamResult<StandardOutput> {
        let partition = self.existing_partition(locator)?;
        let mut partition = partition.write();
        let doomed: Vec<u64> = partition.records.range(..internal_record_id).map(|(id, _)| *id).collect();
        let removed = partition.remove_records(&doomed);
        info!(
            target: "rstream::engine",
            locator = %locator,
            before = internal_record_id,
            removed,
            "Pruned records"
        );
        Ok(StandardOutput::Count(removed as u64))
    }

    fn handling_entries(
        &self,
        locator: &ResourceLocator,
        internal_record_ids: &[u64],
        concern: Option<&str>,
    ) -> Vec<HandlingEntry> {
        let Some(partition) = self.partition(locator) else {
            return Vec::new();
        };
        let partition = partition.read();
        let wanted: FxHashSet<u64> = internal_record_ids.iter().copied().collect();
        partition
            .handling
            .iter()
            .filter(|e| wanted.is_empty() || wanted.contains(&e.internal_record_id))
            .filter(|e| concern.map_or(true, |c| e.concern == c))
            .cloned()
            .collect()
    }
}

impl Default for MemoryStreamEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardStreamEngine for MemoryStreamEngine {
    fn execute(&self, op: StandardOp) -> StreamResult<StandardOutput> {
        op.validate()?;
        match op {
            StandardOp::CreateStream { locator, strategy } => self.create_stream(locator, strategy),
            StandardOp::DeleteStream { locator, strategy } => self.delete_stream(locator, strategy),
            StandardOp::StreamExists { locator } => Ok(StandardOutput::Bool(self.partitions.contains_key(&locator))),
            StandardOp::PutRecord {
                locator,
                metadata,
                payload,
                existing_record_strategy,
                record_retention_count,
                version_match_strategy,
            } => self.put_record(
                locator,
                metadata,
                payload,
                existing_record_strategy,
                record_retention_count,
                version_match_strategy,
            ),
            StandardOp::GetRecords {
                locator,
                filter,
                criteria,
                order,
            } => Ok(StandardOutput::Records(self.get_records(locator, &filter, &criteria, order)?)),
            StandardOp::GetMetadatas {
                locator,
                filter,
                criteria,
                order,
            } => {
                let metadatas: Vec<LocatedMetadata> = self
                    .get_records(locator, &filter, &criteria, order)?
                    .into_iter()
                    .map(LocatedRecord::into_metadata)
                    .collect();
                Ok(StandardOutput::Metadatas(metadatas))
            }
            StandardOp::GetLatestRecord {
                locator,
                filter,
                criteria,
            } => {
                let latest = self
                    .get_records(locator, &filter, &criteria, OrderRecordsBy::InternalRecordIdDescending)?
                    .into_iter()
                    .next();
                Ok(StandardOutput::MaybeRecord(latest))
            }
            StandardOp::GetInternalRecordIds {
                locator,
                filter,
                criteria,
            } => Ok(StandardOutput::RecordIds(self.matching_ids(&locator, &filter, &criteria)?)),
            StandardOp::GetDistinctIds {
                locator,
                filter,
                criteria,
            } => Ok(StandardOutput::Identifiers(self.distinct_ids(&locator, &filter, &criteria)?)),
            StandardOp::PruneBeforeInternalRecordId {
                locator,
                internal_record_id,
            } => self.prune_before(&locator, internal_record_id),
            StandardOp::GetHandlingEntries {
                locator,
                internal_record_ids,
                concern,
            } => Ok(StandardOutput::HandlingEntries(self.handling_entries(
                &locator,
                &internal_record_ids,
                concern.as_deref(),
            ))),
            StandardOp::PutHandlingEntries { locator, entries } => {
                let partition = self.existing_partition(&locator)?;
                let count = entries.len();
                let ids = partition.write().append_entries(entries)?;
                debug!(target: "rstream::engine", locator = %locator, count, "Appended handling entries");
                Ok(StandardOutput::HandlingEntryIds(ids))
            }
        }
    }

    fn mutex(&self) -> &dyn DistributedMutex {
        &self.mutex
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
