//! The mover handle driving real ticks on paused Tokio time.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use afk_config::AfkConfig;
use afk_policy::PolicyWindow;
use afk_reconcile::ReconcileError;
use afk_runtime::{AfkMover, ManualClock, MoverEvent, StartOutcome, StopOutcome};
use afk_schemas::{ChannelId, ClientId, RosterEntry};
use afk_testkit::{standard_server, FakeVoiceServer};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::broadcast::error::TryRecvError;

const DAVE: ClientId = ClientId(1);

// Wednesday 18:00 UTC: off hours.
fn evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 18, 0, 0).unwrap()
}

fn config() -> AfkConfig {
    let mut cfg = AfkConfig::default();
    cfg.schedule.timezone = "UTC".to_string();
    cfg.thresholds.work_minutes = 10.0;
    cfg.thresholds.off_minutes = 5.0;
    cfg
}

fn setup() -> (
    Arc<FakeVoiceServer>,
    Arc<ManualClock>,
    AfkMover<FakeVoiceServer>,
) {
    let server = Arc::new(standard_server());
    server.connect(RosterEntry::voice(1, 10, "dave"));
    let clock = Arc::new(ManualClock::new(evening()));
    let resolver = config().policy_resolver().unwrap();
    let mover = AfkMover::new(server.clone(), clock.clone(), resolver).with_rng_seed(11);
    (server, clock, mover)
}

/// Exactly one more poll interval; the test stays 100ms behind the ticks.
async fn one_tick() {
    tokio::time::sleep(StdDuration::from_millis(2_000)).await;
}

fn started_run_id(outcome: StartOutcome) -> uuid::Uuid {
    match outcome {
        StartOutcome::Started { run_id } => run_id,
        other => panic!("expected Started, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_start_twice_then_stop_twice() {
    let (_server, _clock, mut mover) = setup();

    let run_id = started_run_id(mover.start(&config()).unwrap());
    assert!(mover.is_running());
    assert_eq!(mover.run_id(), Some(run_id));

    assert_eq!(
        mover.start(&config()).unwrap(),
        StartOutcome::AlreadyRunning { run_id }
    );

    assert_eq!(mover.stop().await, StopOutcome::Stopped { run_id });
    assert!(!mover.is_running());
    assert_eq!(mover.stop().await, StopOutcome::NotRunning);
    assert!(mover.dump_state().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn scenario_unresolvable_channel_refuses_start() {
    let (server, _clock, mut mover) = setup();
    let mut cfg = config();
    cfg.exempt_channels = vec!["Nowhere".to_string()];

    let err = mover.start(&cfg).unwrap_err();
    assert!(matches!(err, ReconcileError::ChannelResolutionFailed { ref name, .. } if name == "Nowhere"));
    assert!(!mover.is_running());
    assert_eq!(mover.stop().await, StopOutcome::NotRunning);

    server.fail_find_channel(true);
    assert!(mover.start(&config()).is_err());
    assert!(!mover.is_running());
}

#[tokio::test(start_paused = true)]
async fn scenario_mute_park_and_restore_across_ticks() {
    let (server, clock, mut mover) = setup();
    let mut events = mover.subscribe();
    // Someone stays behind in the lobby, so the origin is kept on restore.
    server.connect(RosterEntry::voice(3, 10, "frank"));
    server.set_muted(DAVE, true);

    let run_id = started_run_id(mover.start(&config()).unwrap());
    assert_eq!(events.try_recv().unwrap(), MoverEvent::Started { run_id });

    tokio::time::sleep(StdDuration::from_millis(2_100)).await;
    let dump = mover.dump_state().await.unwrap();
    assert_eq!(dump.pending_mutes.get(&DAVE), Some(&evening()));
    assert!(dump.parked.is_empty());
    assert_eq!(server.channel_of(DAVE), Some(ChannelId(10)));

    clock.advance(Duration::minutes(5));
    one_tick().await;
    assert_eq!(server.channel_of(DAVE), Some(ChannelId(99)));
    assert_eq!(
        events.try_recv().unwrap(),
        MoverEvent::Parked {
            client: DAVE,
            from: ChannelId(10),
            to: ChannelId(99),
        }
    );
    let dump = mover.dump_state().await.unwrap();
    assert_eq!(dump.parked.get(&DAVE), Some(&ChannelId(10)));
    assert_eq!(dump.names.get(&DAVE).map(String::as_str), Some("dave"));

    server.set_muted(DAVE, false);
    one_tick().await;
    assert_eq!(server.channel_of(DAVE), Some(ChannelId(10)));
    assert_eq!(
        events.try_recv().unwrap(),
        MoverEvent::Restored {
            client: DAVE,
            to: ChannelId(10),
        }
    );

    mover.stop().await;
    assert_eq!(events.try_recv().unwrap(), MoverEvent::Stopped { run_id });
}

#[tokio::test(start_paused = true)]
async fn scenario_roster_outage_is_reported_and_survived() {
    let (server, _clock, mut mover) = setup();
    let mut events = mover.subscribe();
    server.fail_next_roster(1);

    mover.start(&config()).unwrap();
    assert!(matches!(events.try_recv(), Ok(MoverEvent::Started { .. })));

    tokio::time::sleep(StdDuration::from_millis(2_100)).await;
    assert!(matches!(
        events.try_recv(),
        Ok(MoverEvent::CycleSkipped { .. })
    ));

    one_tick().await;
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert!(mover.is_running());
}

#[tokio::test(start_paused = true)]
async fn scenario_failed_park_is_published() {
    let (server, clock, mut mover) = setup();
    let mut events = mover.subscribe();
    server.set_muted(DAVE, true);
    server.fail_moves_of(DAVE, true);

    mover.start(&config()).unwrap();
    let _ = events.try_recv();
    tokio::time::sleep(StdDuration::from_millis(2_100)).await;
    clock.advance(Duration::minutes(6));
    one_tick().await;

    match events.try_recv().unwrap() {
        MoverEvent::MoveFailed {
            client, channel, ..
        } => {
            assert_eq!(client, DAVE);
            assert_eq!(channel, ChannelId(99));
        }
        other => panic!("expected MoveFailed, got {other:?}"),
    }
    // Timer kept: still pending from the first observation.
    let dump = mover.dump_state().await.unwrap();
    assert_eq!(dump.pending_mutes.get(&DAVE), Some(&evening()));
}

#[tokio::test(start_paused = true)]
async fn scenario_reconfigure_applies_to_active_window() {
    let (server, clock, mut mover) = setup();
    mover.start(&config()).unwrap();
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(5))
    );

    let err = mover.reconfigure(Duration::zero()).unwrap_err();
    assert!(matches!(err, ReconcileError::ConfigurationInvalid(_)));
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(5))
    );

    assert_eq!(
        mover.reconfigure(Duration::minutes(1)).unwrap(),
        PolicyWindow::Off
    );
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(1))
    );

    // The running worker picks up the shorter threshold.
    server.set_muted(DAVE, true);
    tokio::time::sleep(StdDuration::from_millis(2_100)).await;
    clock.advance(Duration::minutes(1));
    one_tick().await;
    assert_eq!(server.channel_of(DAVE), Some(ChannelId(99)));
}

#[tokio::test(start_paused = true)]
async fn scenario_thresholds_set_while_stopped_survive_next_start() {
    let (_server, _clock, mut mover) = setup();
    mover.start(&config()).unwrap();
    mover.stop().await;

    mover
        .reconfigure_window(PolicyWindow::Work, Duration::minutes(30))
        .unwrap();
    mover.reconfigure(Duration::minutes(2)).unwrap();

    mover.start(&config()).unwrap();
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(2))
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_client_left_and_stop_clear_state() {
    let (server, clock, mut mover) = setup();
    server.set_muted(DAVE, true);
    mover.start(&config()).unwrap();

    tokio::time::sleep(StdDuration::from_millis(2_100)).await;
    clock.advance(Duration::minutes(5));
    one_tick().await;
    assert_eq!(server.channel_of(DAVE), Some(ChannelId(99)));

    mover.client_left(DAVE);
    let dump = mover.dump_state().await.unwrap();
    assert!(dump.parked.is_empty());
    assert!(dump.pending_mutes.is_empty());

    // Parked but forgotten: it sits in the holding channel untouched.
    server.set_muted(DAVE, false);
    one_tick().await;
    assert_eq!(server.channel_of(DAVE), Some(ChannelId(99)));
    assert_eq!(server.moves_of(DAVE), vec![ChannelId(99)]);

    // A pending mute is dropped by stop/start.
    server.connect(RosterEntry::voice(2, 11, "erin"));
    server.set_muted(ClientId(2), true);
    one_tick().await;
    assert!(mover
        .dump_state()
        .await
        .unwrap()
        .pending_mutes
        .contains_key(&ClientId(2)));
    mover.stop().await;
    mover.start(&config()).unwrap();
    let dump = mover.dump_state().await.unwrap();
    assert!(dump.parked.is_empty());
    assert!(dump.pending_mutes.is_empty());

    // Stopped mover ignores disconnect notifications.
    mover.stop().await;
    mover.client_left(DAVE);
}

#[tokio::test(start_paused = true)]
async fn scenario_reconfigure_before_first_start_uses_configured_policy() {
    let (_server, clock, mut mover) = setup();

    // Configured values are visible before any start.
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(5))
    );

    // Off hours at 18:00 UTC: only the off threshold changes.
    assert_eq!(
        mover.reconfigure(Duration::minutes(2)).unwrap(),
        PolicyWindow::Off
    );
    mover.start(&config()).unwrap();
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(2))
    );

    // Work threshold is still the configured 10 minutes, not a built-in default.
    clock.set(Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap());
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Work, Duration::minutes(10))
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_reconfigure_while_stopped_judges_window_on_configured_schedule() {
    let (_server, clock, mut mover) = setup();
    // 16:30 UTC is inside the configured UTC work hours (17:30 in Berlin).
    clock.set(Utc.with_ymd_and_hms(2024, 1, 10, 16, 30, 0).unwrap());

    assert_eq!(
        mover.reconfigure(Duration::minutes(3)).unwrap(),
        PolicyWindow::Work
    );
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Work, Duration::minutes(3))
    );

    mover.start(&config()).unwrap();
    clock.set(evening());
    assert_eq!(
        mover.current_threshold(),
        (PolicyWindow::Off, Duration::minutes(5))
    );
}
