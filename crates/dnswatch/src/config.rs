//! Watcher configuration: loading, validation and state construction.

use dnswatch_core::{
    NegativeRecord, NotifyTrigger, Protocol, Record, RegexFlags, StaticRecord, TargetSpec,
    WatchState, Zone, DEFAULT_HTTP_METHOD,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::ConfigError;
use crate::notifier::NotifierConfig;

/// File format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML
    Toml,
    /// JSON
    Json,
    /// YAML
    Yaml,
}

impl ConfigFormat {
    /// Format named by the file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Format name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

/// Root of the watcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Scheduler tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Notification templates
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Zones by name
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneConfig>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            notifier: NotifierConfig::default(),
            zones: BTreeMap::new(),
        }
    }
}

/// One zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Primary name server
    #[serde(default)]
    pub primary_name_server: String,

    /// Administrative e-mail
    #[serde(default)]
    pub email: String,

    /// NS records
    #[serde(default)]
    pub name_servers: Vec<StaticRecord>,

    /// Records published as configured
    #[serde(default)]
    pub static_records: Vec<StaticRecord>,

    /// Dynamic groups by name
    #[serde(default)]
    pub dynamic_groups: BTreeMap<String, DynamicGroupConfig>,
}

/// Records failing over together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicGroupConfig {
    /// Records under liveness control
    #[serde(default)]
    pub dynamic_records: Vec<DynamicRecordConfig>,

    /// Fallbacks published while every dynamic record is dead
    #[serde(default)]
    pub negative_records: Vec<NegativeRecord>,
}

/// A record under liveness control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRecordConfig {
    /// Owner name
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,

    /// TTL
    pub ttl: u32,

    /// Record content
    pub content: String,

    /// Evaluate every this many ticks
    #[serde(default = "default_watch_interval")]
    pub watch_interval: u32,

    /// Rule over target names, e.g. `%(web) && !%(maint)`
    pub eval_rule: String,

    /// When to notify
    #[serde(default)]
    pub notify_triggers: Vec<NotifyTrigger>,

    /// Alive value published before the first cycle
    #[serde(default)]
    pub alive: bool,

    /// Start forced down
    #[serde(default)]
    pub force_down: bool,

    /// Probed targets
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// One probe target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Name used in the record's rule
    pub name: String,

    /// Probe protocol
    pub protocol: Protocol,

    /// Host, `host:port` or URL
    pub dest: String,

    /// HTTP method
    #[serde(default = "default_http_method")]
    pub http_method: String,

    /// Accepted HTTP status patterns
    #[serde(default)]
    pub http_status: Vec<String>,

    /// Content pattern
    #[serde(default)]
    pub regex: Option<String>,

    /// Content pattern flags
    #[serde(default)]
    pub regex_flags: RegexFlags,

    /// Maximum response bytes inspected
    #[serde(default)]
    pub res_size: Option<usize>,

    /// Additional attempts after the first
    #[serde(default)]
    pub retry: u32,

    /// Pause between failed attempts in milliseconds
    #[serde(default)]
    pub retry_wait_ms: u64,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Accept invalid TLS certificates
    #[serde(default)]
    pub tls_skip_verify: bool,
}

impl TargetConfig {
    /// Probe configuration for this target
    #[must_use]
    pub fn to_spec(&self) -> TargetSpec {
        let mut spec = TargetSpec::new(&self.name, self.protocol, &self.dest)
            .http_method(&self.http_method)
            .http_status(self.http_status.iter().cloned())
            .regex_flags(self.regex_flags)
            .retry(self.retry)
            .retry_wait(Duration::from_millis(self.retry_wait_ms))
            .timeout(Duration::from_millis(self.timeout_ms))
            .tls_skip_verify(self.tls_skip_verify);
        spec.regex.clone_from(&self.regex);
        spec.res_size = self.res_size;
        spec
    }
}

impl WatcherConfig {
    /// Load configuration, choosing the format by file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, format)
    }

    /// Parse configuration text
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let parsed = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| ConfigError::Parse {
            format: format.as_str(),
            reason,
        })
    }

    /// Scheduler tick period
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Check everything state construction relies on.
    ///
    /// All problems are reported together. Rule syntax is not checked here:
    /// a record with a broken rule is still watched and always dead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.tick_ms == 0 {
            problems.push("tick_ms must be greater than 0".to_string());
        }
        for (zone_name, zone) in &self.zones {
            if zone_name.is_empty() {
                problems.push("zone name must not be empty".to_string());
            }
            for record in zone.name_servers.iter().chain(&zone.static_records) {
                check_static(&mut problems, zone_name, record);
            }
            for (group_name, group) in &zone.dynamic_groups {
                let at = format!("{zone_name}/{group_name}");
                if group_name.is_empty() {
                    problems.push(format!("{zone_name}: dynamic group name must not be empty"));
                }
                for record in &group.negative_records {
                    check_static(&mut problems, &at, record);
                }
                for record in &group.dynamic_records {
                    check_dynamic(&mut problems, &at, record);
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Build the watch state.
    ///
    /// Logs rule parse errors, and warns when a record's worst-case probe
    /// time exceeds its watch period.
    #[must_use]
    pub fn build_state(&self) -> WatchState {
        let mut state = WatchState::new();
        for (zone_name, zone_config) in &self.zones {
            let mut zone = Zone::new(zone_name);
            zone.primary_name_server.clone_from(&zone_config.primary_name_server);
            zone.email.clone_from(&zone_config.email);
            zone.name_servers.clone_from(&zone_config.name_servers);
            zone.static_records.clone_from(&zone_config.static_records);

            for (group_name, group_config) in &zone_config.dynamic_groups {
                let group = zone.group_mut(group_name);
                group
                    .negative_records
                    .clone_from(&group_config.negative_records);
                for record_config in &group_config.dynamic_records {
                    let record = self.build_record(zone_name, group_name, record_config);
                    group.records.push(Arc::new(record));
                }
            }
            state.insert_zone(zone);
        }
        state
    }

    fn build_record(&self, zone: &str, group: &str, config: &DynamicRecordConfig) -> Record {
        let mut builder = Record::builder(&config.name, &config.record_type, &config.content)
            .location(zone, group)
            .ttl(config.ttl)
            .rule(&config.eval_rule)
            .watch_interval(config.watch_interval)
            .alive(config.alive)
            .force_down(config.force_down)
            .targets(config.targets.iter().map(TargetConfig::to_spec));
        for trigger in &config.notify_triggers {
            builder = builder.notify_trigger(*trigger);
        }
        let record = builder.build();

        if let Err(e) = record.rule() {
            error!(
                zone,
                record = %record.name(),
                content = %record.content(),
                rule = %record.rule_source(),
                error = %e,
                "unparsable rule, record will always be dead"
            );
        }

        let period = self.tick().saturating_mul(record.watch_interval());
        let worst = record
            .targets()
            .iter()
            .map(|t| t.spec().worst_case())
            .max()
            .unwrap_or_default();
        if worst > period {
            warn!(
                zone,
                record = %record.name(),
                content = %record.content(),
                worst_case_ms = u64::try_from(worst.as_millis()).unwrap_or(u64::MAX),
                period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
                "worst-case probe time exceeds watch period, cycles will be skipped"
            );
        }
        record
    }
}

fn check_static(problems: &mut Vec<String>, at: &str, record: &StaticRecord) {
    if record.name.is_empty() || record.record_type.is_empty() || record.content.is_empty() {
        problems.push(format!("{at}: record needs name, type and content"));
    }
    if record.ttl == 0 {
        problems.push(format!("{at}: {} ttl must be greater than 0", record.name));
    }
}

fn check_dynamic(problems: &mut Vec<String>, at: &str, record: &DynamicRecordConfig) {
    let id = format!("{at}: {} {} {}", record.name, record.record_type, record.content);
    if record.name.is_empty() || record.record_type.is_empty() || record.content.is_empty() {
        problems.push(format!("{id}: record needs name, type and content"));
    }
    if record.ttl == 0 {
        problems.push(format!("{id}: ttl must be greater than 0"));
    }
    if record.watch_interval == 0 {
        problems.push(format!("{id}: watch_interval must be greater than 0"));
    }
    if record.eval_rule.trim().is_empty() {
        problems.push(format!("{id}: eval_rule must not be empty"));
    }
    if record.targets.is_empty() {
        problems.push(format!("{id}: at least one target is required"));
    }
    let mut seen = HashSet::new();
    for target in &record.targets {
        if target.name.is_empty() {
            problems.push(format!("{id}: target name must not be empty"));
        } else if !seen.insert(target.name.as_str()) {
            problems.push(format!("{id}: duplicate target name {}", target.name));
        }
        if target.dest.is_empty() {
            problems.push(format!("{id}: target {} needs a dest", target.name));
        }
    }
}

// Default value functions for serde.
const fn default_tick_ms() -> u64 {
    1000
}

const fn default_watch_interval() -> u32 {
    dnswatch_core::DEFAULT_WATCH_INTERVAL
}

const fn default_timeout_ms() -> u64 {
    3000
}

fn default_http_method() -> String {
    String::from(DEFAULT_HTTP_METHOD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TOML: &str = r#"
tick_ms = 500

[notifier]
subject = "%(name) is %(current)"

[zones."example.com."]
primary_name_server = "ns1.example.com."
email = "hostmaster.example.com."
name_servers = [{ name = "example.com.", type = "NS", ttl = 3600, content = "ns1.example.com." }]

[[zones."example.com.".dynamic_groups.web.dynamic_records]]
name = "www.example.com."
type = "A"
ttl = 60
content = "192.0.2.10"
watch_interval = 5
eval_rule = "%(http) && %(ping)"
notify_triggers = ["changed", "latestDown"]

[[zones."example.com.".dynamic_groups.web.dynamic_records.targets]]
name = "http"
protocol = "httpRegexp"
dest = "http://192.0.2.10/health"
http_status = ["200"]
regex = "OK"
retry = 2
retry_wait_ms = 100

[[zones."example.com.".dynamic_groups.web.dynamic_records.targets]]
name = "ping"
protocol = "icmp"
dest = "192.0.2.10"

[[zones."example.com.".dynamic_groups.web.negative_records]]
name = "www.example.com."
type = "A"
ttl = 60
content = "198.51.100.1"
"#;

    #[test]
    fn test_parse_toml() {
        let config = WatcherConfig::parse(TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.tick(), Duration::from_millis(500));
        assert_eq!(config.notifier.subject, "%(name) is %(current)");
        assert!(config.notifier.body.contains("%(previous)"));

        let zone = &config.zones["example.com."];
        let record = &zone.dynamic_groups["web"].dynamic_records[0];
        assert_eq!(
            record.notify_triggers,
            vec![NotifyTrigger::Changed, NotifyTrigger::LatestDown]
        );
        let http = record.targets[0].to_spec();
        assert_eq!(http.protocol, Protocol::HttpRegex);
        assert_eq!(http.http_method, "GET");
        assert_eq!(http.retry_wait, Duration::from_millis(100));
        assert_eq!(http.regex.as_deref(), Some("OK"));
        let ping = record.targets[1].to_spec();
        assert_eq!(ping.timeout, Duration::from_secs(3));
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_build_state() {
        let config = WatcherConfig::parse(TOML, ConfigFormat::Toml).unwrap();
        let state = config.build_state();
        let zone = state.zone("example.com.").unwrap();
        assert_eq!(zone.primary_name_server, "ns1.example.com.");
        assert_eq!(zone.name_servers.len(), 1);

        let record = zone.records().next().unwrap();
        assert_eq!(record.zone(), "example.com.");
        assert_eq!(record.group(), "web");
        assert_eq!(record.watch_interval(), 5);
        assert_eq!(record.targets().len(), 2);
        assert!(record.rule().is_ok());
        assert_eq!(zone.dynamic_groups["web"].negative_records.len(), 1);
    }

    #[test]
    fn test_formats_agree() {
        let toml_config = WatcherConfig::parse(TOML, ConfigFormat::Toml).unwrap();
        let json = serde_json::to_string(&toml_config).unwrap();
        let yaml = serde_yaml::to_string(&toml_config).unwrap();
        assert_eq!(
            WatcherConfig::parse(&json, ConfigFormat::Json).unwrap(),
            toml_config
        );
        assert_eq!(
            WatcherConfig::parse(&yaml, ConfigFormat::Yaml).unwrap(),
            toml_config
        );
    }

    #[test]
    fn test_load_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML.as_bytes()).unwrap();
        let config = WatcherConfig::load(file.path()).unwrap();
        assert_eq!(config.zones.len(), 1);

        let err = WatcherConfig::load("dnswatch.ini").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));

        let err = WatcherConfig::load("/nonexistent/dnswatch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_default_matches_empty_file() {
        let config = WatcherConfig::default();
        assert_eq!(config.tick(), Duration::from_secs(1));
        assert_eq!(WatcherConfig::parse("", ConfigFormat::Toml).unwrap(), config);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = WatcherConfig::parse("{", ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().starts_with("cannot parse JSON configuration"));
    }

    #[test]
    fn test_validation_collects_problems() {
        let yaml = r#"
tick_ms: 0
zones:
  example.com.:
    dynamic_groups:
      web:
        dynamic_records:
          - name: www.example.com.
            type: A
            ttl: 0
            content: 192.0.2.10
            watch_interval: 0
            eval_rule: "%(a) &&"
            targets:
              - { name: a, protocol: tcp, dest: "192.0.2.10:80" }
              - { name: a, protocol: tcp, dest: "" }
"#;
        let config = WatcherConfig::parse(yaml, ConfigFormat::Yaml).unwrap();
        let ConfigError::Invalid(problems) = config.validate().unwrap_err() else {
            panic!("expected validation failure");
        };
        assert!(problems.iter().any(|p| p.contains("tick_ms")));
        assert!(problems.iter().any(|p| p.contains("ttl must")));
        assert!(problems.iter().any(|p| p.contains("watch_interval")));
        assert!(problems.iter().any(|p| p.contains("duplicate target name a")));
        assert!(problems.iter().any(|p| p.contains("needs a dest")));
        // Rule syntax is left to the record.
        assert!(!problems.iter().any(|p| p.contains("eval_rule")));
    }

    #[test]
    fn test_broken_rule_still_builds() {
        let json = r#"{
            "zones": { "example.com.": { "dynamic_groups": { "web": { "dynamic_records": [{
                "name": "www.example.com.", "type": "A", "ttl": 60, "content": "192.0.2.10",
                "eval_rule": "%(a) &&",
                "targets": [{ "name": "a", "protocol": "carrier-pigeon", "dest": "loft" }]
            }]}}}}
        }"#;
        let config = WatcherConfig::parse(json, ConfigFormat::Json).unwrap();
        tokio_test::assert_ok!(config.validate());
        let state = config.build_state();
        let record = state.records().next().unwrap();
        assert!(record.rule().is_err());
        assert!(!record.verdict());
        assert_eq!(record.targets()[0].spec().protocol, Protocol::Unknown);
        assert_eq!(record.watch_interval(), dnswatch_core::DEFAULT_WATCH_INTERVAL);
    }
}
