//! Session lifecycle integration tests.
//!
//! Timers run against Tokio's paused clock; the wall clock is a
//! [`ManualClock`] advanced in lockstep via the `advance` helper, so
//! every assertion about "seconds until expiry" is deterministic.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use mintvault_client::session::SNAPSHOT_KEY;
use mintvault_client::{
    MemoryStore, SessionConfig, SessionConfigPatch, SessionHooks, SessionManager, SnapshotStore,
};
use mintvault_integration_tests::{
    ManualClock, MockBackend, RefreshBehavior, SignOutBehavior, advance, session_expiring_at,
    settle,
};

struct Harness {
    clock: Arc<ManualClock>,
    backend: Arc<MockBackend>,
    store: Arc<MemoryStore>,
    manager: SessionManager,
    refreshed: Arc<AtomicUsize>,
    warned: Arc<AtomicUsize>,
    warned_minutes: Arc<AtomicI64>,
    expired: Arc<AtomicUsize>,
}

fn harness(config: SessionConfig) -> Harness {
    let clock = ManualClock::new(0);
    let backend = MockBackend::new(Arc::clone(&clock));
    let store = Arc::new(MemoryStore::new());

    let refreshed = Arc::new(AtomicUsize::new(0));
    let warned = Arc::new(AtomicUsize::new(0));
    let warned_minutes = Arc::new(AtomicI64::new(-1));
    let expired = Arc::new(AtomicUsize::new(0));

    let hooks = SessionHooks::new()
        .on_refreshed({
            let refreshed = Arc::clone(&refreshed);
            move |_session| {
                refreshed.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_warning({
            let warned = Arc::clone(&warned);
            let warned_minutes = Arc::clone(&warned_minutes);
            move |minutes| {
                warned.fetch_add(1, Ordering::SeqCst);
                warned_minutes.store(minutes, Ordering::SeqCst);
            }
        })
        .on_expired({
            let expired = Arc::clone(&expired);
            move || {
                expired.fetch_add(1, Ordering::SeqCst);
            }
        });

    let manager = SessionManager::with_clock(
        Arc::clone(&backend) as _,
        Arc::clone(&store) as _,
        config,
        hooks,
        Arc::clone(&clock) as _,
    );

    Harness {
        clock,
        backend,
        store,
        manager,
        refreshed,
        warned,
        warned_minutes,
        expired,
    }
}

fn no_refresh_config(warning_secs: u64) -> SessionConfig {
    SessionConfig {
        refresh_threshold: Duration::from_secs(60),
        warning_threshold: Duration::from_secs(warning_secs),
        auto_refresh: false,
        persist: true,
    }
}

#[tokio::test(start_paused = true)]
async fn adopting_twice_arms_exactly_one_timer_set() {
    let h = harness(no_refresh_config(300));
    let session = session_expiring_at(1_000);

    h.manager.adopt(session.clone());
    h.manager.adopt(session);
    settle().await;

    assert!(h.manager.is_valid());
    assert_eq!(h.manager.time_until_expiry(), Some(1_000));
    assert!(!h.manager.status().warning_shown);

    // Warning threshold crossed: one firing despite the double adopt.
    advance(&h.clock, 700).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 1);
    assert_eq!(h.warned_minutes.load(Ordering::SeqCst), 5);
    assert!(h.manager.status().warning_shown);
    assert!(h.manager.is_valid());

    // Expiry: one firing.
    advance(&h.clock, 300).await;
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert!(!h.manager.is_valid());
    assert_eq!(h.manager.time_until_expiry(), None);
}

#[tokio::test(start_paused = true)]
async fn warning_fires_exactly_once() {
    let h = harness(no_refresh_config(300));
    // Expires in warning-threshold + 1 seconds.
    h.manager.adopt(session_expiring_at(301));
    settle().await;

    advance(&h.clock, 1).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 1);
    assert_eq!(h.warned_minutes.load(Ordering::SeqCst), 5);

    // More ticks inside the warning window do not re-fire.
    advance(&h.clock, 100).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 1);

    advance(&h.clock, 200).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_is_terminal() {
    let h = harness(SessionConfig {
        refresh_threshold: Duration::from_secs(60),
        warning_threshold: Duration::from_secs(30),
        auto_refresh: true,
        persist: true,
    });
    h.backend.set_refresh_behavior(RefreshBehavior::Fail);

    h.manager.adopt(session_expiring_at(100));
    settle().await;
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_some());

    // Refresh timer fires at expiry - 60s.
    advance(&h.clock, 40).await;
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert!(!h.manager.is_valid());
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());

    // No retry loop: nothing else fires later.
    advance(&h.clock, 200).await;
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert_eq!(h.warned.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn successful_refresh_rearms_against_new_expiry() {
    let h = harness(SessionConfig {
        refresh_threshold: Duration::from_secs(60),
        warning_threshold: Duration::from_secs(30),
        auto_refresh: true,
        persist: true,
    });
    h.backend
        .set_refresh_behavior(RefreshBehavior::Replace { lifetime: 1_000 });

    h.manager.adopt(session_expiring_at(100));
    settle().await;

    advance(&h.clock, 40).await;
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.refreshed.load(Ordering::SeqCst), 1);
    assert!(h.manager.is_valid());
    assert_eq!(h.manager.time_until_expiry(), Some(1_000));
    assert!(!h.manager.status().warning_shown);

    // The superseded session's warning/expiry timers are gone.
    advance(&h.clock, 100).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 0);
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
    assert!(h.manager.is_valid());
}

#[tokio::test(start_paused = true)]
async fn terminate_clears_locally_even_when_remote_hangs() {
    let h = harness(no_refresh_config(300));
    h.backend.set_sign_out_behavior(SignOutBehavior::Hang);

    h.manager.adopt(session_expiring_at(1_000));
    settle().await;
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_some());

    h.manager.terminate();

    // Local state is gone before the remote call can possibly resolve.
    assert!(!h.manager.is_valid());
    assert_eq!(h.manager.time_until_expiry(), None);
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());

    settle().await;
    assert_eq!(h.backend.sign_outs.load(Ordering::SeqCst), 1);
    // Explicit termination is not expiry.
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn extend_deduplicates_inflight_refresh() {
    let h = harness(no_refresh_config(300));
    let gate = h.backend.gate_refresh();

    h.manager.adopt(session_expiring_at(10_000));
    settle().await;

    let first = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.extend().await }
    });
    settle().await;
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
    assert!(h.manager.status().refreshing);

    // Second call observes the in-flight refresh and bails immediately.
    assert!(!h.manager.extend().await);
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);

    gate.add_permits(1);
    settle().await;
    assert!(first.await.unwrap());
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
    assert!(h.manager.is_valid());
}

#[tokio::test(start_paused = true)]
async fn extend_without_session_returns_false() {
    let h = harness(no_refresh_config(300));
    assert!(!h.manager.extend().await);
    assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn update_config_rearms_active_timers() {
    let h = harness(no_refresh_config(300));
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;

    advance(&h.clock, 100).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 0);

    // Widening the warning threshold past the remaining lifetime makes
    // the re-armed warning timer due immediately.
    h.manager.update_config(&SessionConfigPatch {
        warning_threshold: Some(Duration::from_secs(950)),
        ..SessionConfigPatch::default()
    });
    settle().await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 1);
    assert!(h.manager.is_valid());

    // The expiry timer still tracks the original absolute expiry.
    advance(&h.clock, 900).await;
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert!(!h.manager.is_valid());
}

#[tokio::test(start_paused = true)]
async fn destroy_tears_down_without_callbacks() {
    let h = harness(no_refresh_config(300));
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;

    h.manager.destroy();
    assert!(!h.manager.is_valid());
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());

    advance(&h.clock, 2_000).await;
    assert_eq!(h.warned.load(Ordering::SeqCst), 0);
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.sign_outs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn persist_flag_disables_snapshot_writes() {
    let h = harness(SessionConfig {
        persist: false,
        ..no_refresh_config(300)
    });
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn snapshot_restores_into_fresh_manager() {
    let h = harness(no_refresh_config(300));
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;

    // A second manager over the same store picks the session up.
    let second = SessionManager::with_clock(
        Arc::clone(&h.backend) as _,
        Arc::clone(&h.store) as _,
        no_refresh_config(300),
        SessionHooks::new(),
        Arc::clone(&h.clock) as _,
    );
    let restored = second.restore().unwrap().unwrap();
    assert_eq!(restored.expires_at, 1_000);
    assert!(second.is_valid());
    assert_eq!(second.time_until_expiry(), Some(1_000));
}

#[tokio::test(start_paused = true)]
async fn expired_snapshot_is_discarded_on_restore() {
    let h = harness(no_refresh_config(300));
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;
    h.manager.destroy();
    // destroy() cleared it; write a fresh snapshot, then outlive it.
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;
    h.clock.advance(1_500);

    let second = SessionManager::with_clock(
        Arc::clone(&h.backend) as _,
        Arc::clone(&h.store) as _,
        no_refresh_config(300),
        SessionHooks::new(),
        Arc::clone(&h.clock) as _,
    );
    assert!(second.restore().unwrap().is_none());
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());
    assert!(!second.is_valid());
}

#[tokio::test(start_paused = true)]
async fn unreadable_snapshot_is_discarded_on_restore() {
    let h = harness(no_refresh_config(300));
    h.store.put(SNAPSHOT_KEY, "not json").unwrap();

    assert!(h.manager.restore().unwrap().is_none());
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn already_expired_session_expires_immediately() {
    let h = harness(no_refresh_config(300));
    h.clock.advance(2_000);

    // Expiry is in the past; every delay clamps to zero.
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;

    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert!(!h.manager.is_valid());
    assert!(h.store.get(SNAPSHOT_KEY).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn validity_tracks_wall_clock_not_timers() {
    let h = harness(no_refresh_config(300));
    h.manager.adopt(session_expiring_at(1_000));
    settle().await;

    // Jump the wall clock past expiry without letting any timer fire,
    // as happens when the host sleeps. Validity reads the wall clock.
    h.clock.advance(5_000);
    assert!(!h.manager.is_valid());
    assert_eq!(h.manager.time_until_expiry(), Some(0));
}
