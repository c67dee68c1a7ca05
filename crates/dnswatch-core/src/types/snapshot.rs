//! Read-only view of the watch state for the HTTP read model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Record, StaticRecord, WatchState, Zone};

/// A static or name-server record as published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    /// Owner name
    pub name: String,
    /// Record type, upper-cased
    #[serde(rename = "type")]
    pub record_type: String,
    /// TTL
    pub ttl: u32,
    /// Record content
    pub content: String,
}

impl From<&StaticRecord> for RecordView {
    fn from(record: &StaticRecord) -> Self {
        Self {
            name: record.name.clone(),
            record_type: record.record_type.to_ascii_uppercase(),
            ttl: record.ttl,
            content: record.content.clone(),
        }
    }
}

/// A dynamic or negative record with its effective alive flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRecordView {
    /// Dynamic group the record belongs to
    pub group: String,
    /// Owner name
    pub name: String,
    /// Record type, upper-cased
    #[serde(rename = "type")]
    pub record_type: String,
    /// TTL
    pub ttl: u32,
    /// Record content
    pub content: String,
    /// Effective alive flag
    pub alive: bool,
    /// True for a negative (fallback) record
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negative: bool,
}

impl DynamicRecordView {
    fn dynamic(group: &str, record: &Record) -> Self {
        Self {
            group: group.to_string(),
            name: record.name().to_string(),
            record_type: record.record_type().to_ascii_uppercase(),
            ttl: record.ttl(),
            content: record.content().to_string(),
            alive: record.effective_alive(),
            negative: false,
        }
    }

    fn negative(group: &str, record: &StaticRecord, alive: bool) -> Self {
        Self {
            group: group.to_string(),
            name: record.name.clone(),
            record_type: record.record_type.to_ascii_uppercase(),
            ttl: record.ttl,
            content: record.content.clone(),
            alive,
            negative: true,
        }
    }
}

/// One zone as published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneView {
    /// Primary name server
    pub primary_name_server: String,
    /// Administrative e-mail
    pub email: String,
    /// NS records
    pub name_servers: Vec<RecordView>,
    /// Static records
    pub static_records: Vec<RecordView>,
    /// Dynamic records followed by each group's negative records
    pub dynamic_records: Vec<DynamicRecordView>,
}

impl ZoneView {
    /// Capture the current state of a zone.
    ///
    /// Each group's negative records are alive iff no dynamic record of
    /// the group is alive after applying force-down.
    #[must_use]
    pub fn capture(zone: &Zone) -> Self {
        let mut dynamic_records = Vec::new();
        for (name, group) in &zone.dynamic_groups {
            let before = dynamic_records.len();
            dynamic_records.extend(
                group
                    .records
                    .iter()
                    .map(|r| DynamicRecordView::dynamic(name, r)),
            );
            // Decide from the captured flags so the views stay consistent.
            let negative_alive = !dynamic_records[before..].iter().any(|v| v.alive);
            dynamic_records.extend(
                group
                    .negative_records
                    .iter()
                    .map(|r| DynamicRecordView::negative(name, r, negative_alive)),
            );
        }
        Self {
            primary_name_server: zone.primary_name_server.clone(),
            email: zone.email.clone(),
            name_servers: zone.name_servers.iter().map(RecordView::from).collect(),
            static_records: zone.static_records.iter().map(RecordView::from).collect(),
            dynamic_records,
        }
    }

    /// Records a resolver would currently answer with
    pub fn active(&self) -> impl Iterator<Item = &DynamicRecordView> {
        self.dynamic_records.iter().filter(|r| r.alive)
    }
}

/// Published state of every zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSnapshot {
    /// Zones by name
    pub zones: BTreeMap<String, ZoneView>,
}

impl WatchSnapshot {
    /// Find a record view by zone, owner name and content
    #[must_use]
    pub fn find(&self, zone: &str, name: &str, content: &str) -> Option<&DynamicRecordView> {
        self.zones
            .get(zone)?
            .dynamic_records
            .iter()
            .find(|r| r.name == name && r.content == content)
    }
}

impl WatchState {
    /// Capture a read-only snapshot of every zone
    #[must_use]
    pub fn snapshot(&self) -> WatchSnapshot {
        WatchSnapshot {
            zones: self
                .zones()
                .map(|zone| (zone.name.clone(), ZoneView::capture(zone)))
                .collect(),
        }
    }
}
