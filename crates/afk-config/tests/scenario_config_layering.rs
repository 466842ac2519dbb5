//! Layered YAML loading: overlay precedence, defaults, and hash stability.

use afk_config::load_layered_yaml_from_strings;
use afk_schemas::ChannelId;
use chrono::Duration;

const BASE_YAML: &str = r#"
afk:
  holding_channel: "Bin weg"
  exempt_channels: ["Anstubsbar", "Kramis Kühlkammer"]
  sibling_group_parent: 15
  thresholds:
    work_minutes: 90
    off_minutes: 45
"#;

/// Same content as BASE_YAML but with keys in different order.
const BASE_YAML_REORDERED: &str = r#"
afk:
  thresholds:
    off_minutes: 45
    work_minutes: 90
  sibling_group_parent: 15
  exempt_channels: ["Anstubsbar", "Kramis Kühlkammer"]
  holding_channel: "Bin weg"
"#;

const OVERLAY_YAML: &str = r#"
afk:
  thresholds:
    off_minutes: 20
  overrides:
    Krami: 90
"#;

#[test]
fn overlay_overrides_single_leaf_and_keeps_siblings() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(loaded.afk.thresholds.off_minutes, 20.0);
    assert_eq!(loaded.afk.thresholds.work_minutes, 90.0);
    assert_eq!(loaded.afk.exempt_channels.len(), 2);
    assert_eq!(
        loaded.afk.normalized_overrides().get("krami"),
        Some(&ChannelId(90))
    );
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let loaded = load_layered_yaml_from_strings(&["afk:\n  holding_channel: AFK\n"]).unwrap();
    assert_eq!(loaded.afk.holding_channel, "AFK");
    assert_eq!(loaded.afk.poll_interval_ms, 2_000);
    assert!(loaded.afk.auto_start);
    assert_eq!(loaded.afk.sibling_group_parent, ChannelId(15));

    let policy = loaded.afk.policy_resolver().unwrap();
    assert_eq!(policy.thresholds.work, Duration::minutes(90));
    assert_eq!(policy.thresholds.off, Duration::minutes(45));
}

#[test]
fn unrelated_top_level_sections_are_ignored() {
    let yaml = "games:\n  rank_channel: 42\nafk:\n  auto_start: false\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    assert!(!loaded.afk.auto_start);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn overlay_changes_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64);
    assert!(a.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
