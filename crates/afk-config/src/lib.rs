//! afk-config
//!
//! Layered YAML configuration for the away mover.
//!
//! - YAML documents are merged in order: earlier docs are base, later docs
//!   override (maps deep-merge, everything else replaces).
//! - The merged document is canonicalized to JSON and hashed (SHA-256) so a
//!   run can log exactly which configuration it used.
//! - The `afk:` section deserializes into [`AfkConfig`]. Unknown keys are
//!   rejected; every key has a default.

use std::collections::BTreeMap;
use std::fs;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use afk_policy::{MuteThresholds, PolicyResolver, WorkSchedule};
use afk_schemas::ChannelId;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

/// Top-level document. Other sections belong to other bot modules and are
/// ignored here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub afk: AfkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AfkConfig {
    /// Name of the channel away clients are parked in.
    pub holding_channel: String,
    /// Names of channels where muting / away status is not penalized.
    /// The holding channel is always exempt and need not be listed.
    pub exempt_channels: Vec<String>,
    /// Parent channel whose children are the restore candidates.
    pub sibling_group_parent: ChannelId,
    pub poll_interval_ms: u64,
    /// Start the mover as soon as the connection is up.
    pub auto_start: bool,
    pub thresholds: ThresholdsConfig,
    pub schedule: ScheduleConfig,
    /// Display name (case-insensitive) -> channel used instead of the
    /// holding channel for that client.
    pub overrides: BTreeMap<String, ChannelId>,
}

impl Default for AfkConfig {
    fn default() -> Self {
        Self {
            holding_channel: "Bin weg".to_string(),
            exempt_channels: Vec::new(),
            sibling_group_parent: ChannelId(15),
            poll_interval_ms: 2_000,
            auto_start: true,
            thresholds: ThresholdsConfig::default(),
            schedule: ScheduleConfig::default(),
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdsConfig {
    pub work_minutes: f64,
    pub off_minutes: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            work_minutes: 90.0,
            off_minutes: 45.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// IANA zone name, e.g. "Europe/Berlin".
    pub timezone: String,
    /// Three-letter or full weekday names.
    pub work_days: Vec<String>,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
            work_days: ["Mon", "Tue", "Wed", "Thu", "Fri"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            work_start_hour: 8,
            work_end_hour: 17,
        }
    }
}

impl AfkConfig {
    /// Check every value without touching the server.
    pub fn validate(&self) -> Result<()> {
        if self.holding_channel.trim().is_empty() {
            bail!("CONFIG_INVALID afk.holding_channel must not be empty");
        }
        if self.poll_interval_ms == 0 {
            bail!("CONFIG_INVALID afk.poll_interval_ms must be positive");
        }
        self.policy_resolver().map(|_| ())
    }

    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.poll_interval_ms)
    }

    /// Build the time-of-day policy described by `schedule` + `thresholds`.
    pub fn policy_resolver(&self) -> Result<PolicyResolver> {
        let work = minutes_to_duration("afk.thresholds.work_minutes", self.thresholds.work_minutes)?;
        let off = minutes_to_duration("afk.thresholds.off_minutes", self.thresholds.off_minutes)?;
        let thresholds = MuteThresholds::new(work, off).context("CONFIG_INVALID afk.thresholds")?;

        let tz = Tz::from_str(&self.schedule.timezone).map_err(|e| {
            anyhow!(
                "CONFIG_INVALID afk.schedule.timezone={:?}: {e}",
                self.schedule.timezone
            )
        })?;
        let mut days = Vec::with_capacity(self.schedule.work_days.len());
        for raw in &self.schedule.work_days {
            let day = Weekday::from_str(raw)
                .map_err(|_| anyhow!("CONFIG_INVALID afk.schedule.work_days: unknown day {raw:?}"))?;
            days.push(day);
        }
        let schedule = WorkSchedule::new(
            tz,
            days,
            self.schedule.work_start_hour,
            self.schedule.work_end_hour,
        )
        .context("CONFIG_INVALID afk.schedule")?;

        Ok(PolicyResolver::new(schedule, thresholds))
    }

    /// Overrides keyed by lower-cased display name.
    pub fn normalized_overrides(&self) -> BTreeMap<String, ChannelId> {
        self.overrides
            .iter()
            .map(|(name, cid)| (name.to_lowercase(), *cid))
            .collect()
    }
}

/// Longest accepted mute threshold: one week.
pub const MAX_THRESHOLD_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// Fractional minutes are allowed (the chat command accepts "7.5").
pub fn minutes_to_duration(field: &str, minutes: f64) -> Result<Duration> {
    if !minutes.is_finite() || minutes <= 0.0 {
        bail!("CONFIG_INVALID {field} must be a positive number of minutes (got {minutes})");
    }
    if minutes > MAX_THRESHOLD_MINUTES {
        bail!("CONFIG_INVALID {field} must be at most {MAX_THRESHOLD_MINUTES} minutes (got {minutes})");
    }
    Ok(Duration::milliseconds((minutes * 60_000.0).round() as i64))
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub afk: AfkConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    let doc: ConfigDocument =
        serde_json::from_value(merged.clone()).context("CONFIG_INVALID afk section")?;
    doc.afk.validate()?;

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        afk: doc.afk,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        // An empty YAML layer parses as null; it must not wipe the base.
        (a_other, Value::Null) => a_other,
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is key-sorted (no preserve_order feature), so the
    // compact encoding is canonical.
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
