//! Zones, dynamic groups and the process-wide watch state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, WatchError};
use crate::types::Record;

/// A record published as configured, without liveness control.
///
/// Used for name-server records and static records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRecord {
    /// Owner name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,
    /// TTL
    pub ttl: u32,
    /// Record content
    pub content: String,
}

impl StaticRecord {
    /// Create a static record
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        ttl: u32,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            ttl,
            content: content.into(),
        }
    }
}

/// Fallback record of a dynamic group.
///
/// Reported alive exactly when every dynamic record of its group is dead.
pub type NegativeRecord = StaticRecord;

/// Dynamic records that fail over together, plus their fallbacks
#[derive(Debug, Default)]
pub struct DynamicGroup {
    /// Records under liveness control
    pub records: Vec<Arc<Record>>,
    /// Records activated when all of `records` are dead
    pub negative_records: Vec<NegativeRecord>,
}

impl DynamicGroup {
    /// Returns true if no record of the group is alive for readers.
    ///
    /// Forced-down records count as dead.
    #[must_use]
    pub fn all_dead(&self) -> bool {
        !self.records.iter().any(|r| r.effective_alive())
    }
}

/// A DNS zone
#[derive(Debug, Default)]
pub struct Zone {
    /// Zone name
    pub name: String,
    /// Primary name server (SOA MNAME)
    pub primary_name_server: String,
    /// Administrative e-mail (SOA RNAME)
    pub email: String,
    /// NS records
    pub name_servers: Vec<StaticRecord>,
    /// Records published as configured
    pub static_records: Vec<StaticRecord>,
    /// Dynamic groups by name
    pub dynamic_groups: BTreeMap<String, DynamicGroup>,
}

impl Zone {
    /// Create an empty zone
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Dynamic group by name, created on first use
    pub fn group_mut(&mut self, name: &str) -> &mut DynamicGroup {
        self.dynamic_groups.entry(name.to_string()).or_default()
    }

    /// All dynamic records of the zone
    pub fn records(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.dynamic_groups.values().flat_map(|g| g.records.iter())
    }
}

/// Every zone the watcher is responsible for.
///
/// Built once from configuration; afterwards only the atomics inside each
/// [`Record`] change.
#[derive(Debug, Default)]
pub struct WatchState {
    zones: BTreeMap<String, Zone>,
}

impl WatchState {
    /// Create an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a zone
    pub fn insert_zone(&mut self, zone: Zone) {
        self.zones.insert(zone.name.clone(), zone);
    }

    /// Zone by name
    pub fn zone(&self, name: &str) -> Result<&Zone> {
        self.zones
            .get(name)
            .ok_or_else(|| WatchError::UnknownZone(name.to_string()))
    }

    /// All zones, ordered by name
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// All dynamic records across all zones
    pub fn records(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.zones.values().flat_map(Zone::records)
    }

    /// Number of dynamic records
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    /// Set the force-down override on every dynamic record of `zone` that
    /// matches name, type (case-insensitive) and content.
    ///
    /// Returns the number of records changed.
    pub fn set_force_down(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
        content: &str,
        force_down: bool,
    ) -> Result<usize> {
        let mut changed = 0;
        for record in self.zone(zone)?.records() {
            if record.name() == name
                && record.record_type().eq_ignore_ascii_case(record_type)
                && record.content() == content
            {
                record.set_force_down(force_down);
                changed += 1;
            }
        }
        if changed == 0 {
            return Err(WatchError::RecordNotFound {
                zone: zone.to_string(),
                name: name.to_string(),
                record_type: record_type.to_string(),
                content: content.to_string(),
            });
        }
        Ok(changed)
    }
}
