//! Record store operations on a [`Stream`]
//!
//! Writes route to the locator that owns the record's business id. Reads
//! keyed by id touch that one locator; filter reads fan out to every
//! locator and merge, ordered by the requested `OrderRecordsBy` with
//! (timestamp or id, locator, internal id) as the total order.
//!
//! Every strategy argument is validated before the first engine call.

use chrono::Utc;
use rstream_core::{
    order_records, require_utc, serialize_id, ClaimedRecord, DescribedSerialization, ExistingRecordStrategy,
    LocatedMetadata, LocatedRecord, OrderRecordsBy, PayloadSerializer, PutRecordResult, RecordFilter,
    RecordNotFoundStrategy, RecordsToFilterCriteria, ResourceLocator, StandardOp, StreamError, StreamObject,
    StreamRecordMetadata, StreamResult, StreamType, StringSerializedIdentifier, Tag, TypeRepresentation,
    TypeSelectionStrategy, VersionMatchStrategy, VersionedType,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::stream::Stream;

/// Where a record lives: its locator and locator-scoped id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordLocation {
    /// Locator holding the record
    pub locator: ResourceLocator,
    /// Locator-scoped record id
    pub internal_record_id: u64,
}

impl RecordLocation {
    /// Location of a record
    pub fn new(locator: ResourceLocator, internal_record_id: u64) -> Self {
        Self {
            locator,
            internal_record_id,
        }
    }
}

impl From<&ClaimedRecord> for RecordLocation {
    fn from(claim: &ClaimedRecord) -> Self {
        Self::new(claim.locator.clone(), claim.record.internal_record_id)
    }
}

impl From<&LocatedRecord> for RecordLocation {
    fn from(record: &LocatedRecord) -> Self {
        Self::new(record.locator.clone(), record.record.internal_record_id)
    }
}

/// Policy for one Put
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// What to do when records with the same id already exist
    pub existing_record_strategy: ExistingRecordStrategy,
    /// Retention for pruning strategies; must be absent otherwise
    pub record_retention_count: Option<i64>,
    /// How ids and types of existing records are compared
    pub version_match_strategy: VersionMatchStrategy,
    /// Whether the stamped object type is the declared or the runtime type
    pub type_selection_strategy: TypeSelectionStrategy,
    /// Tags added to the object's own tags
    pub tags: Vec<Tag>,
}

impl PutOptions {
    /// Keep at most `count` records per id, the new one included
    pub fn prune_by_id(count: i64) -> Self {
        Self {
            existing_record_strategy: ExistingRecordStrategy::PruneIfFoundById,
            record_retention_count: Some(count),
            ..Self::default()
        }
    }

    /// Keep at most `count` records per id and object type
    pub fn prune_by_id_and_type(count: i64) -> Self {
        Self {
            existing_record_strategy: ExistingRecordStrategy::PruneIfFoundByIdAndType,
            record_retention_count: Some(count),
            ..Self::default()
        }
    }

    /// Use a given existing-record strategy without retention
    pub fn with_strategy(strategy: ExistingRecordStrategy) -> Self {
        Self {
            existing_record_strategy: strategy,
            ..Self::default()
        }
    }

    fn validate(&self) -> StreamResult<()> {
        self.existing_record_strategy
            .validate_retention(self.record_retention_count)?;
        self.version_match_strategy.validate()?;
        self.type_selection_strategy.validate()?;
        rstream_core::validate_tags(&self.tags)
    }
}

/// What a Put did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReport {
    /// Locator the record was routed to
    pub locator: ResourceLocator,
    /// Engine result
    pub result: PutRecordResult,
}

impl PutReport {
    /// Location of the new record, if one was written
    pub fn location(&self) -> Option<RecordLocation> {
        self.result
            .internal_record_id
            .map(|id| RecordLocation::new(self.locator.clone(), id))
    }
}

fn when_not_found<T>(strategy: RecordNotFoundStrategy, what: impl FnOnce() -> String, empty: T) -> StreamResult<T> {
    match strategy {
        RecordNotFoundStrategy::Throw => Err(StreamError::record_not_found(what())),
        _ => Ok(empty),
    }
}

fn stamped_type<T: StreamType>(object: &T, strategy: TypeSelectionStrategy) -> StreamResult<VersionedType> {
    let repr: TypeRepresentation = match strategy {
        TypeSelectionStrategy::UseDeclaredType => T::type_representation(),
        TypeSelectionStrategy::UseRuntimeType => object.runtime_type_representation().ok_or_else(|| {
            StreamError::invalid_argument(format!(
                "runtime type of {} cannot be determined",
                T::type_representation()
            ))
        })?,
        TypeSelectionStrategy::Unknown => {
            return Err(StreamError::invalid_argument("type selection strategy is Unknown"))
        }
    };
    VersionedType::new(repr)
}

impl Stream {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Append an object, always writing a new record
    ///
    /// Returns the new record's location.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for bad tags or a non-UTC object timestamp
    /// and `StreamNotFound` if the stream has no storage.
    pub fn put<T: StreamObject + Serialize>(&self, object: &T) -> StreamResult<Option<RecordLocation>> {
        Ok(self.put_with_options(object, &PutOptions::default())?.location())
    }

    /// Append an object under an explicit policy
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for inconsistent options, a missing id when
    /// the strategy needs one, or an undeterminable runtime type;
    /// `RecordAlreadyExists` for throw-if-found strategies.
    pub fn put_with_options<T: StreamObject + Serialize>(
        &self,
        object: &T,
        options: &PutOptions,
    ) -> StreamResult<PutReport> {
        options.validate()?;
        let id = object.id().as_ref().map(serialize_id).transpose()?;
        let object_timestamp = object
            .object_timestamp()
            .map(|ts| require_utc(ts, "object timestamp"))
            .transpose()?;
        let mut tags = object.tags();
        tags.extend(options.tags.iter().cloned());

        let object_type = stamped_type(object, options.type_selection_strategy)?;
        let payload = self.serializer().describe(object, object_type.clone())?;
        self.put_described(id, object_type, payload, tags, object_timestamp, options)
    }

    /// Append an object under an explicit business id
    ///
    /// # Errors
    ///
    /// Same as [`Stream::put_with_options`].
    pub fn put_with_id<TId, TObject>(&self, id: &TId, object: &TObject, options: &PutOptions) -> StreamResult<PutReport>
    where
        TId: Serialize + StreamType,
        TObject: Serialize + StreamType,
    {
        options.validate()?;
        let id = serialize_id(id)?;
        let object_type = stamped_type(object, options.type_selection_strategy)?;
        let payload = self.serializer().describe(object, object_type.clone())?;
        self.put_described(Some(id), object_type, payload, options.tags.clone(), None, options)
    }

    fn put_described(
        &self,
        id: Option<StringSerializedIdentifier>,
        object_type: VersionedType,
        payload: DescribedSerialization,
        tags: Vec<Tag>,
        object_timestamp_utc: Option<chrono::DateTime<Utc>>,
        options: &PutOptions,
    ) -> StreamResult<PutReport> {
        let locator = self.resolver().locator_for_id(id.as_ref()).clone();
        let metadata = StreamRecordMetadata::new(
            id,
            object_type,
            tags,
            payload.serializer,
            Utc::now(),
            object_timestamp_utc,
        )?;
        let result = self
            .execute(StandardOp::PutRecord {
                locator: locator.clone(),
                metadata,
                payload,
                existing_record_strategy: options.existing_record_strategy,
                record_retention_count: options.record_retention_count,
                version_match_strategy: options.version_match_strategy,
            })?
            .into_put("PutRecord")?;

        debug!(
            target: "rstream::store",
            stream = %self.name(),
            locator = %locator,
            internal_record_id = ?result.internal_record_id,
            pruned = result.pruned_record_ids.len(),
            "Put record"
        );
        Ok(PutReport { locator, result })
    }

    /// Delete every record below `internal_record_id` on one locator,
    /// together with its handling entries
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns `StreamNotFound` if the locator has no storage.
    pub fn prune_before_internal_record_id(
        &self,
        locator: &ResourceLocator,
        internal_record_id: u64,
    ) -> StreamResult<u64> {
        let removed = self
            .execute(StandardOp::PruneBeforeInternalRecordId {
                locator: locator.clone(),
                internal_record_id,
            })?
            .into_count("PruneBeforeInternalRecordId")?;
        debug!(
            target: "rstream::store",
            stream = %self.name(),
            locator = %locator,
            before = internal_record_id,
            removed,
            "Pruned records"
        );
        Ok(removed)
    }

    // ========================================================================
    // Reads by id
    // ========================================================================

    fn id_filter(id: StringSerializedIdentifier, tags: &[Tag]) -> StreamResult<RecordFilter> {
        RecordFilter::builder()
            .ids([id])
            .tags(tags.iter().cloned())
            .build()
    }

    /// Newest record with this id, optionally also carrying `tags`
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` when nothing matches and `not_found` is
    /// `Throw`; `InvalidArgument` for an `Unknown` strategy.
    pub fn get_latest_record_by_id<TId: Serialize + StreamType>(
        &self,
        id: &TId,
        tags: &[Tag],
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Option<LocatedRecord>> {
        not_found.validate()?;
        let id = serialize_id(id)?;
        let locator = self.resolver().locator_for_id(Some(&id)).clone();
        let filter = Self::id_filter(id.clone(), tags)?;
        let record = self
            .execute(StandardOp::GetLatestRecord {
                locator,
                filter,
                criteria: RecordsToFilterCriteria::default(),
            })?
            .into_maybe_record("GetLatestRecord")?;
        match record {
            Some(record) => Ok(Some(record)),
            None => when_not_found(not_found, || format!("no record with id {}", id), None),
        }
    }

    /// Metadata of the newest record with this id
    ///
    /// # Errors
    ///
    /// Same as [`Stream::get_latest_record_by_id`].
    pub fn get_latest_metadata_by_id<TId: Serialize + StreamType>(
        &self,
        id: &TId,
        tags: &[Tag],
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Option<LocatedMetadata>> {
        Ok(self
            .get_latest_record_by_id(id, tags, not_found)?
            .map(LocatedRecord::into_metadata))
    }

    /// The newest object with this id, deserialized
    ///
    /// `ReturnDefault` yields `None` when nothing matches.
    ///
    /// # Errors
    ///
    /// Same as [`Stream::get_latest_record_by_id`], plus `Serialization` if
    /// the payload does not decode into `TObject`.
    pub fn get_latest_object_by_id<TId, TObject>(
        &self,
        id: &TId,
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Option<TObject>>
    where
        TId: Serialize + StreamType,
        TObject: DeserializeOwned,
    {
        self.get_latest_record_by_id(id, &[], not_found)?
            .map(|r| PayloadSerializer::deserialize(&r.record.payload))
            .transpose()
    }

    /// Every record with this id, in the requested order
    ///
    /// # Errors
    ///
    /// Same as [`Stream::get_latest_record_by_id`], plus `InvalidArgument`
    /// for `Unspecified` order.
    pub fn get_all_records_by_id<TId: Serialize + StreamType>(
        &self,
        id: &TId,
        order: OrderRecordsBy,
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Vec<LocatedRecord>> {
        not_found.validate()?;
        order.validate()?;
        let id = serialize_id(id)?;
        let locator = self.resolver().locator_for_id(Some(&id)).clone();
        let records = self
            .execute(StandardOp::GetRecords {
                locator,
                filter: Self::id_filter(id.clone(), &[])?,
                criteria: RecordsToFilterCriteria::default(),
                order,
            })?
            .into_records("GetRecords")?;
        if records.is_empty() {
            return when_not_found(not_found, || format!("no record with id {}", id), records);
        }
        Ok(records)
    }

    /// Metadata of every record with this id, in the requested order
    ///
    /// # Errors
    ///
    /// Same as [`Stream::get_all_records_by_id`].
    pub fn get_all_metadata_by_id<TId: Serialize + StreamType>(
        &self,
        id: &TId,
        order: OrderRecordsBy,
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Vec<LocatedMetadata>> {
        not_found.validate()?;
        order.validate()?;
        let id = serialize_id(id)?;
        let locator = self.resolver().locator_for_id(Some(&id)).clone();
        let metadatas = self
            .execute(StandardOp::GetMetadatas {
                locator,
                filter: Self::id_filter(id.clone(), &[])?,
                criteria: RecordsToFilterCriteria::default(),
                order,
            })?
            .into_metadatas("GetMetadatas")?;
        if metadatas.is_empty() {
            return when_not_found(not_found, || format!("no record with id {}", id), metadatas);
        }
        Ok(metadatas)
    }

    /// Whether any record has this id, optionally also carrying `tags`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for bad tags.
    pub fn does_any_exist_by_id<TId: Serialize + StreamType>(&self, id: &TId, tags: &[Tag]) -> StreamResult<bool> {
        let id = serialize_id(id)?;
        let locator = self.resolver().locator_for_id(Some(&id)).clone();
        let ids = self
            .execute(StandardOp::GetInternalRecordIds {
                locator,
                filter: Self::id_filter(id, tags)?,
                criteria: RecordsToFilterCriteria::default(),
            })?
            .into_record_ids("GetInternalRecordIds")?;
        Ok(!ids.is_empty())
    }

    // ========================================================================
    // Filter reads (fan out across locators)
    // ========================================================================

    /// Records matching a filter across every locator
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` strategies or `Unspecified`
    /// order.
    pub fn get_records(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
        order: OrderRecordsBy,
    ) -> StreamResult<Vec<LocatedRecord>> {
        filter.validate()?;
        criteria.validate()?;
        order.validate()?;
        let mut all = Vec::new();
        for locator in self.locators() {
            let records = self
                .execute(StandardOp::GetRecords {
                    locator: locator.clone(),
                    filter: filter.clone(),
                    criteria: *criteria,
                    order,
                })?
                .into_records("GetRecords")?;
            all.extend(records);
        }
        order_records(&mut all, order)?;
        Ok(all)
    }

    /// Metadata of records matching a filter across every locator
    ///
    /// # Errors
    ///
    /// Same as [`Stream::get_records`].
    pub fn get_metadatas(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
        order: OrderRecordsBy,
    ) -> StreamResult<Vec<LocatedMetadata>> {
        filter.validate()?;
        criteria.validate()?;
        order.validate()?;
        let mut all = Vec::new();
        for locator in self.locators() {
            let metadatas = self
                .execute(StandardOp::GetMetadatas {
                    locator: locator.clone(),
                    filter: filter.clone(),
                    criteria: *criteria,
                    order,
                })?
                .into_metadatas("GetMetadatas")?;
            all.extend(metadatas);
        }
        order_records(&mut all, order)?;
        Ok(all)
    }

    /// The newest matching record across every locator
    ///
    /// Newest is by write timestamp, then locator, then internal id.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` when nothing matches and `not_found` is
    /// `Throw`; `InvalidArgument` for `Unknown` strategies.
    pub fn get_latest_record(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Option<LocatedRecord>> {
        not_found.validate()?;
        filter.validate()?;
        criteria.validate()?;
        let mut latest = Vec::new();
        for locator in self.locators() {
            if let Some(record) = self
                .execute(StandardOp::GetLatestRecord {
                    locator: locator.clone(),
                    filter: filter.clone(),
                    criteria: *criteria,
                })?
                .into_maybe_record("GetLatestRecord")?
            {
                latest.push(record);
            }
        }
        order_records(&mut latest, OrderRecordsBy::TimestampDescending)?;
        match latest.into_iter().next() {
            Some(record) => Ok(Some(record)),
            None => when_not_found(not_found, || "no record matches the filter".to_string(), None),
        }
    }

    /// Locations of matching records, by locator then ascending id
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` when nothing matches and `not_found` is
    /// `Throw`; `InvalidArgument` for `Unknown` strategies.
    pub fn get_internal_record_ids(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
        not_found: RecordNotFoundStrategy,
    ) -> StreamResult<Vec<RecordLocation>> {
        not_found.validate()?;
        filter.validate()?;
        criteria.validate()?;
        let mut locations = Vec::new();
        for locator in self.locators() {
            let ids = self
                .execute(StandardOp::GetInternalRecordIds {
                    locator: locator.clone(),
                    filter: filter.clone(),
                    criteria: *criteria,
                })?
                .into_record_ids("GetInternalRecordIds")?;
            locations.extend(ids.into_iter().map(|id| RecordLocation::new(locator.clone(), id)));
        }
        if locations.is_empty() {
            return when_not_found(not_found, || "no record matches the filter".to_string(), locations);
        }
        Ok(locations)
    }

    /// Distinct business ids of matching records, in serialized form
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` strategies.
    pub fn get_distinct_string_serialized_ids(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
    ) -> StreamResult<Vec<StringSerializedIdentifier>> {
        filter.validate()?;
        criteria.validate()?;
        let mut ids: Vec<StringSerializedIdentifier> = Vec::new();
        for locator in self.locators() {
            let found = self
                .execute(StandardOp::GetDistinctIds {
                    locator: locator.clone(),
                    filter: filter.clone(),
                    criteria: *criteria,
                })?
                .into_identifiers("GetDistinctIds")?;
            for id in found {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Distinct business ids of matching records, deserialized
    ///
    /// Ids of other identifier types are skipped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` strategies and
    /// `Serialization` if a stored id does not decode.
    pub fn get_distinct_ids<TId: DeserializeOwned + StreamType>(
        &self,
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
    ) -> StreamResult<Vec<TId>> {
        let wanted = TId::type_representation();
        let mut ids = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for id in self.get_distinct_string_serialized_ids(filter, criteria)? {
            if id.identifier_type.without_version().name != wanted.name || !seen.insert(id.id.clone()) {
                continue;
            }
            ids.push(rstream_core::deserialize_id(&id)?);
        }
        Ok(ids)
    }
}
