//! Invalid configuration is rejected at load time with a CONFIG_INVALID message.

use afk_config::load_layered_yaml_from_strings;

fn load_err(yaml: &str) -> String {
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    format!("{err:#}")
}

#[test]
fn zero_threshold_rejected() {
    let msg = load_err("afk:\n  thresholds:\n    work_minutes: 0\n");
    assert!(msg.contains("CONFIG_INVALID"), "{msg}");
    assert!(msg.contains("work_minutes"), "{msg}");
}

#[test]
fn negative_threshold_rejected() {
    let msg = load_err("afk:\n  thresholds:\n    off_minutes: -3\n");
    assert!(msg.contains("off_minutes"), "{msg}");
}

#[test]
fn absurdly_large_threshold_rejected() {
    let msg = load_err("afk:\n  thresholds:\n    work_minutes: 1e300\n");
    assert!(msg.contains("CONFIG_INVALID"), "{msg}");
    assert!(msg.contains("work_minutes"), "{msg}");
    assert!(msg.contains("at most"), "{msg}");
}

#[test]
fn unknown_key_rejected() {
    let msg = load_err("afk:\n  mute_time: 45\n");
    assert!(msg.contains("CONFIG_INVALID"), "{msg}");
}

#[test]
fn unknown_timezone_rejected() {
    let msg = load_err("afk:\n  schedule:\n    timezone: Mars/Olympus\n");
    assert!(msg.contains("timezone"), "{msg}");
}

#[test]
fn unknown_weekday_rejected() {
    let msg = load_err("afk:\n  schedule:\n    work_days: [Mon, Funday]\n");
    assert!(msg.contains("Funday"), "{msg}");
}

#[test]
fn inverted_work_hours_rejected() {
    let msg = load_err("afk:\n  schedule:\n    work_start_hour: 18\n    work_end_hour: 9\n");
    assert!(msg.contains("CONFIG_INVALID afk.schedule"), "{msg}");
}

#[test]
fn empty_holding_channel_rejected() {
    let msg = load_err("afk:\n  holding_channel: \"  \"\n");
    assert!(msg.contains("holding_channel"), "{msg}");
}

#[test]
fn zero_poll_interval_rejected() {
    let msg = load_err("afk:\n  poll_interval_ms: 0\n");
    assert!(msg.contains("poll_interval_ms"), "{msg}");
}
