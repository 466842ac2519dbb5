//! Disconnect notifications purge both maps; no restore follows.

use afk_policy::{MuteThresholds, PolicyResolver, WorkSchedule};
use afk_reconcile::{Policy, ReconciliationEngine};
use afk_schemas::{ChannelId, ClientId, RosterEntry};
use afk_testkit::standard_server;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn engine() -> ReconciliationEngine {
    let t = Duration::minutes(5);
    let resolver = PolicyResolver::new(WorkSchedule::default(), MuteThresholds::new(t, t).unwrap());
    ReconciliationEngine::new(Policy::new(ChannelId(99), [], ChannelId(15), resolver))
}

fn t(mins: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 13, 12, 0, 0).unwrap() + Duration::minutes(mins)
}

#[test]
fn scenario_parked_client_disconnect_purges_state() {
    let server = standard_server();
    server
        .connect(RosterEntry::voice(1, 10, "carol"))
        .connect(RosterEntry::voice(2, 10, "dave"));
    let mut eng = engine();
    let mut rng = StdRng::seed_from_u64(2);

    server.set_away(ClientId(1), true);
    server.set_muted(ClientId(2), true);
    eng.run_cycle(&server, t(0), &mut rng);
    assert!(eng.history().contains(ClientId(1)));
    assert!(eng.tracker().muted_since(ClientId(2)).is_some());

    eng.client_left(ClientId(1));
    eng.client_left(ClientId(2));
    assert!(eng.history().is_empty());
    assert!(eng.tracker().is_empty());
    let dump = eng.dump_state();
    assert!(dump.parked.is_empty() && dump.pending_mutes.is_empty());
}

#[test]
fn scenario_reused_client_id_after_disconnect_is_not_restored() {
    let server = standard_server();
    server.connect(RosterEntry::voice(1, 10, "carol"));
    let mut eng = engine();
    let mut rng = StdRng::seed_from_u64(2);

    server.set_away(ClientId(1), true);
    eng.run_cycle(&server, t(0), &mut rng);

    server.disconnect(ClientId(1));
    eng.client_left(ClientId(1));

    // A new connection lands in the holding channel with the same id.
    server.connect(RosterEntry::voice(1, 99, "mallory"));
    server.clear_moves();
    let r = eng.run_cycle(&server, t(1), &mut rng);
    assert!(r.restored.is_empty());
    assert!(server.moves().is_empty());
}

#[test]
fn scenario_missed_disconnect_is_swept_on_next_roster() {
    let server = standard_server();
    server
        .connect(RosterEntry::voice(1, 10, "carol"))
        .connect(RosterEntry::voice(2, 10, "dave"));
    let mut eng = engine();
    let mut rng = StdRng::seed_from_u64(2);

    server.set_away(ClientId(1), true);
    server.set_muted(ClientId(2), true);
    eng.run_cycle(&server, t(0), &mut rng);

    server.disconnect(ClientId(1));
    server.disconnect(ClientId(2));
    eng.run_cycle(&server, t(1), &mut rng);
    assert!(eng.history().is_empty());
    assert!(eng.tracker().is_empty());
}

#[test]
fn scenario_dump_state_lists_names_of_tracked_clients() {
    let server = standard_server();
    server
        .connect(RosterEntry::voice(1, 10, "carol"))
        .connect(RosterEntry::voice(2, 10, "dave"))
        .connect(RosterEntry::voice(3, 10, "erin"));
    let mut eng = engine();
    let mut rng = StdRng::seed_from_u64(2);

    server.set_away(ClientId(1), true);
    server.set_muted(ClientId(2), true);
    eng.run_cycle(&server, t(0), &mut rng);

    let dump = eng.dump_state();
    assert_eq!(dump.parked.get(&ClientId(1)), Some(&ChannelId(10)));
    assert_eq!(dump.pending_mutes.get(&ClientId(2)), Some(&t(0)));
    assert_eq!(dump.names.get(&ClientId(1)).map(String::as_str), Some("carol"));
    assert_eq!(dump.names.get(&ClientId(2)).map(String::as_str), Some("dave"));
    assert!(!dump.names.contains_key(&ClientId(3)));

    let json = serde_json::to_value(&dump).unwrap();
    assert_eq!(json["parked"]["1"], 10);
    assert_eq!(json["names"]["2"], "dave");
}
