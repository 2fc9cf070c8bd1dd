//! Session lifecycle management.
//!
//! A [`SessionManager`] owns one authentication session's timers. Every
//! adopted session arms up to three timers anchored to the session's
//! absolute expiry:
//!
//! - **refresh** at `expiry - refresh_threshold` (when auto-refresh is on)
//! - **warning** at `expiry - warning_threshold`
//! - **expiry** at `expiry`
//!
//! All three are cancelled together and re-armed whenever a session is
//! adopted, so a superseded session can never fire a stale timer: each
//! timer carries the generation it was armed under and checks it before
//! acting. Validity checks (`is_valid`, `time_until_expiry`) recompute
//! from the wall clock on every call rather than trusting elapsed-timer
//! state, so a host resumed from sleep observes expiry immediately.
//!
//! A failed refresh is terminal: the session is treated as expired, local
//! state and the persisted snapshot are cleared, and the expiry hook
//! fires. There is no retry loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mintvault_core::{Session, UserIdentity};

use crate::backend::Backend;
use crate::store::{SnapshotStore, StoreError};

/// Storage slot for the persisted session snapshot.
pub const SNAPSHOT_KEY: &str = "mintvault.session";

/// Default minutes before expiry at which the automatic refresh fires.
const DEFAULT_REFRESH_THRESHOLD_MINUTES: u64 = 15;
/// Default minutes before expiry at which the warning hook fires.
const DEFAULT_WARNING_THRESHOLD_MINUTES: u64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Wall-clock source, abstracted so tests can drive time explicitly.
pub trait Clock: Send + Sync {
    /// Current Unix epoch seconds.
    fn now(&self) -> i64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration & Hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Timer and persistence configuration for a session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long before expiry the automatic refresh fires.
    pub refresh_threshold: Duration,
    /// How long before expiry the warning hook fires.
    pub warning_threshold: Duration,
    /// Whether the refresh timer is armed at all. Warning and expiry
    /// timers are armed regardless.
    pub auto_refresh: bool,
    /// Whether a local snapshot is written on adopt and cleared on
    /// expiry/termination.
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_MINUTES * 60),
            warning_threshold: Duration::from_secs(DEFAULT_WARNING_THRESHOLD_MINUTES * 60),
            auto_refresh: true,
            persist: true,
        }
    }
}

/// Partial update merged over an existing [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigPatch {
    /// New refresh threshold, if set.
    pub refresh_threshold: Option<Duration>,
    /// New warning threshold, if set.
    pub warning_threshold: Option<Duration>,
    /// New auto-refresh flag, if set.
    pub auto_refresh: Option<bool>,
    /// New persistence flag, if set.
    pub persist: Option<bool>,
}

impl SessionConfig {
    fn apply(&mut self, patch: &SessionConfigPatch) {
        if let Some(v) = patch.refresh_threshold {
            self.refresh_threshold = v;
        }
        if let Some(v) = patch.warning_threshold {
            self.warning_threshold = v;
        }
        if let Some(v) = patch.auto_refresh {
            self.auto_refresh = v;
        }
        if let Some(v) = patch.persist {
            self.persist = v;
        }
    }
}

type RefreshedHook = Arc<dyn Fn(&Session) + Send + Sync>;
type WarningHook = Arc<dyn Fn(i64) + Send + Sync>;
type ExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired on lifecycle transitions.
///
/// All hooks are optional and run on the timer task that observed the
/// transition; keep them short.
#[derive(Clone, Default)]
pub struct SessionHooks {
    on_refreshed: Option<RefreshedHook>,
    on_warning: Option<WarningHook>,
    on_expired: Option<ExpiredHook>,
}

impl SessionHooks {
    /// No hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the replacement session after a successful refresh.
    #[must_use]
    pub fn on_refreshed(mut self, hook: impl Fn(&Session) + Send + Sync + 'static) -> Self {
        self.on_refreshed = Some(Arc::new(hook));
        self
    }

    /// Called with the whole minutes remaining when the warning
    /// threshold is crossed.
    #[must_use]
    pub fn on_warning(mut self, hook: impl Fn(i64) + Send + Sync + 'static) -> Self {
        self.on_warning = Some(Arc::new(hook));
        self
    }

    /// Called when the session expires or a refresh fails terminally.
    /// Not called for explicit `terminate()`/`destroy()`.
    #[must_use]
    pub fn on_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_expired = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("on_refreshed", &self.on_refreshed.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .field("on_expired", &self.on_expired.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk shape of the persisted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSnapshot {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    user: UserIdentity,
    captured_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn capture(session: &Session, now: i64) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
            user: session.user.clone(),
            captured_at: DateTime::from_timestamp(now, 0).unwrap_or_else(Utc::now),
        }
    }

    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            obtained_at: self.captured_at.timestamp(),
            user: self.user,
        }
    }
}

/// Point-in-time view of the lifecycle, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStatus {
    /// Whether a session is currently held and active.
    pub active: bool,
    /// Live seconds until expiry, `None` when inactive.
    pub seconds_until_expiry: Option<i64>,
    /// Whether the warning hook has fired for the current session.
    pub warning_shown: bool,
    /// Whether a refresh call is in flight.
    pub refreshing: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Manager
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct LifecycleState {
    config: SessionConfig,
    session: Option<Session>,
    active: bool,
    warning_shown: bool,
    refreshing: bool,
    generation: u64,
    timers: Vec<JoinHandle<()>>,
}

struct ManagerInner {
    backend: Arc<dyn Backend>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    hooks: SessionHooks,
    state: Mutex<LifecycleState>,
}

/// Owns one active session's refresh/warning/expiry timers.
///
/// Requires a Tokio runtime: adopting a session spawns timer tasks.
/// Cheap to clone; clones share the same lifecycle.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Create a manager with the system clock and no hooks.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn SnapshotStore>,
        config: SessionConfig,
    ) -> Self {
        Self::with_clock(backend, store, config, SessionHooks::new(), Arc::new(SystemClock))
    }

    /// Create a manager with transition hooks.
    #[must_use]
    pub fn with_hooks(
        backend: Arc<dyn Backend>,
        store: Arc<dyn SnapshotStore>,
        config: SessionConfig,
        hooks: SessionHooks,
    ) -> Self {
        Self::with_clock(backend, store, config, hooks, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit clock (test entry point).
    #[must_use]
    pub fn with_clock(
        backend: Arc<dyn Backend>,
        store: Arc<dyn SnapshotStore>,
        config: SessionConfig,
        hooks: SessionHooks,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                backend,
                store,
                clock,
                hooks,
                state: Mutex::new(LifecycleState {
                    config,
                    ..LifecycleState::default()
                }),
            }),
        }
    }

    /// Adopt a session: cancel existing timers, persist a snapshot, and
    /// arm refresh/warning/expiry timers against the session's expiry.
    ///
    /// Adopting the same session twice re-arms exactly one set of timers.
    pub fn adopt(&self, session: Session) {
        self.inner.adopt_session(session);
    }

    /// Attempt one refresh right now, regardless of timer state.
    ///
    /// Returns `true` if the session was replaced. Returns `false`
    /// immediately if a refresh is already in flight or no session is
    /// active; a failed refresh is terminal (see module docs).
    pub async fn extend(&self) -> bool {
        self.inner.try_refresh().await
    }

    /// End the session locally and sign out remotely (best-effort).
    ///
    /// Local state and the persisted snapshot are cleared before the
    /// remote call is attempted, so termination never depends on the
    /// network. The expiry hook does not fire.
    pub fn terminate(&self) {
        self.inner.clear_local("terminated");
        // Even if this manager never adopted in this process, the
        // persisted slot must not outlive an explicit sign-out.
        self.inner.clear_snapshot();
        let backend = Arc::clone(&self.inner.backend);
        tokio::spawn(async move {
            if let Err(error) = backend.sign_out().await {
                warn!(%error, "remote sign-out failed");
            }
        });
    }

    /// Whether a session is held, active, and not past its expiry,
    /// judged against the wall clock right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let now = self.inner.clock.now();
        let state = self.inner.lock_state();
        state.active
            && state
                .session
                .as_ref()
                .is_some_and(|session| !session.is_expired(now))
    }

    /// Live seconds until expiry, `None` when no session is active.
    #[must_use]
    pub fn time_until_expiry(&self) -> Option<i64> {
        let now = self.inner.clock.now();
        let state = self.inner.lock_state();
        if !state.active {
            return None;
        }
        state
            .session
            .as_ref()
            .map(|session| session.expires_in(now).max(0))
    }

    /// Snapshot of the lifecycle flags.
    #[must_use]
    pub fn status(&self) -> LifecycleStatus {
        let now = self.inner.clock.now();
        let state = self.inner.lock_state();
        LifecycleStatus {
            active: state.active,
            seconds_until_expiry: if state.active {
                state
                    .session
                    .as_ref()
                    .map(|session| session.expires_in(now).max(0))
            } else {
                None
            },
            warning_shown: state.warning_shown,
            refreshing: state.refreshing,
        }
    }

    /// The currently held session, if any.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock_state().session.clone()
    }

    /// Merge `patch` into the configuration. If a session is active, its
    /// timers are re-armed under the new configuration.
    pub fn update_config(&self, patch: &SessionConfigPatch) {
        let session = {
            let mut state = self.inner.lock_state();
            state.config.apply(patch);
            if state.active {
                state.session.clone()
            } else {
                None
            }
        };
        if let Some(session) = session {
            self.inner.adopt_session(session);
        }
    }

    /// Tear down without firing hooks: cancel timers, clear the snapshot,
    /// drop the in-memory session.
    pub fn destroy(&self) {
        self.inner.clear_local("destroyed");
        // Clears the slot even when nothing was adopted in this process.
        self.inner.clear_snapshot();
    }

    /// Read the persisted snapshot without adopting it.
    ///
    /// An expired or unreadable snapshot is discarded and cleared;
    /// `Ok(None)` is returned in that case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store itself cannot be read.
    pub fn peek_persisted(&self) -> Result<Option<Session>, StoreError> {
        let Some(raw) = self.inner.store.get(SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        let snapshot: SessionSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "discarding unreadable session snapshot");
                self.inner.store.remove(SNAPSHOT_KEY)?;
                return Ok(None);
            }
        };
        let session = snapshot.into_session();
        if session.is_expired(self.inner.clock.now()) {
            debug!("persisted session already expired");
            self.inner.store.remove(SNAPSHOT_KEY)?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Restore a session from the persisted snapshot and adopt it,
    /// arming timers. See [`Self::peek_persisted`] for the discard
    /// rules.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store itself cannot be read.
    pub fn restore(&self) -> Result<Option<Session>, StoreError> {
        let session = self.peek_persisted()?;
        if let Some(session) = &session {
            self.adopt(session.clone());
        }
        Ok(session)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ManagerInner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        self.state.lock().expect("lifecycle state poisoned")
    }

    fn adopt_session(self: &Arc<Self>, session: Session) {
        let mut state = self.lock_state();
        Self::cancel_timers(&mut state);
        state.warning_shown = false;
        state.refreshing = false;
        state.active = true;

        let now = self.clock.now();
        let ttl = session.expires_in(now).max(0);
        if state.config.persist {
            self.persist_snapshot(&session, now);
        }
        state.session = Some(session);
        self.arm_timers(&mut state, u64::try_from(ttl).unwrap_or(0));
        debug!(seconds_until_expiry = ttl, "session adopted");
    }

    /// Cancel all pending timers. Bumping the generation makes any timer
    /// already queued on the runtime a no-op when it fires.
    fn cancel_timers(state: &mut LifecycleState) {
        state.generation = state.generation.wrapping_add(1);
        for timer in state.timers.drain(..) {
            timer.abort();
        }
    }

    fn arm_timers(self: &Arc<Self>, state: &mut LifecycleState, ttl: u64) {
        let generation = state.generation;

        if state.config.auto_refresh {
            let delay = ttl.saturating_sub(state.config.refresh_threshold.as_secs());
            let inner = Arc::clone(self);
            state.timers.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(delay)).await;
                inner.refresh_due(generation).await;
            }));
        }

        let warning_delay = ttl.saturating_sub(state.config.warning_threshold.as_secs());
        let inner = Arc::clone(self);
        state.timers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(warning_delay)).await;
            inner.warning_due(generation);
        }));

        let inner = Arc::clone(self);
        state.timers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(ttl)).await;
            inner.expiry_due(generation);
        }));
    }

    async fn refresh_due(self: Arc<Self>, generation: u64) {
        {
            let state = self.lock_state();
            if state.generation != generation || !state.active {
                return;
            }
        }
        self.try_refresh().await;
    }

    /// One refresh attempt, guarded so overlapping timers and explicit
    /// `extend()` calls cannot double-fire.
    async fn try_refresh(self: &Arc<Self>) -> bool {
        {
            let mut state = self.lock_state();
            if !state.active || state.refreshing {
                return false;
            }
            state.refreshing = true;
        }

        match self.backend.refresh_session().await {
            Ok(session) => {
                {
                    let mut state = self.lock_state();
                    state.refreshing = false;
                    if !state.active {
                        // Terminated while the refresh was in flight.
                        debug!("discarding refreshed session for ended lifecycle");
                        return false;
                    }
                }
                self.adopt_session(session.clone());
                info!("session refreshed");
                if let Some(hook) = &self.hooks.on_refreshed {
                    hook(&session);
                }
                true
            }
            Err(error) => {
                warn!(%error, "session refresh failed, treating as expired");
                self.expire_now();
                false
            }
        }
    }

    fn warning_due(&self, generation: u64) {
        let minutes_left = {
            let mut state = self.lock_state();
            if state.generation != generation || !state.active || state.warning_shown {
                return;
            }
            state.warning_shown = true;
            let Some(session) = state.session.as_ref() else {
                return;
            };
            // Whole minutes, rounded up: 300s left reads as "5 minutes".
            (session.expires_in(self.clock.now()).max(0) + 59) / 60
        };
        info!(minutes_left, "session expiring soon");
        if let Some(hook) = &self.hooks.on_warning {
            hook(minutes_left);
        }
    }

    fn expiry_due(self: &Arc<Self>, generation: u64) {
        {
            let state = self.lock_state();
            if state.generation != generation || !state.active {
                return;
            }
        }
        self.expire_now();
    }

    /// Terminal expiry: clear everything and fire the expiry hook.
    fn expire_now(self: &Arc<Self>) {
        if !self.clear_local("expired") {
            return;
        }
        if let Some(hook) = &self.hooks.on_expired {
            hook();
        }
    }

    /// Clear timers, session, and snapshot. Returns `false` when there
    /// was nothing to clear.
    fn clear_local(&self, reason: &str) -> bool {
        let mut state = self.lock_state();
        if !state.active && state.session.is_none() {
            return false;
        }
        Self::cancel_timers(&mut state);
        state.session = None;
        state.active = false;
        state.warning_shown = false;
        state.refreshing = false;
        if state.config.persist {
            self.clear_snapshot();
        }
        info!(reason, "session cleared");
        true
    }

    fn persist_snapshot(&self, session: &Session, now: i64) {
        let snapshot = SessionSnapshot::capture(session, now);
        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(error) = self.store.put(SNAPSHOT_KEY, &raw) {
                    warn!(%error, "failed to persist session snapshot");
                }
            }
            Err(error) => warn!(%error, "failed to encode session snapshot"),
        }
    }

    fn clear_snapshot(&self) {
        if let Err(error) = self.store.remove(SNAPSHOT_KEY) {
            warn!(%error, "failed to clear session snapshot");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.refresh_threshold, Duration::from_secs(15 * 60));
        assert_eq!(config.warning_threshold, Duration::from_secs(5 * 60));
        assert!(config.auto_refresh);
        assert!(config.persist);
    }

    #[test]
    fn test_config_patch_merges_only_set_fields() {
        let mut config = SessionConfig::default();
        config.apply(&SessionConfigPatch {
            warning_threshold: Some(Duration::from_secs(120)),
            auto_refresh: Some(false),
            ..SessionConfigPatch::default()
        });
        assert_eq!(config.warning_threshold, Duration::from_secs(120));
        assert!(!config.auto_refresh);
        // Untouched fields keep their previous values.
        assert_eq!(config.refresh_threshold, Duration::from_secs(15 * 60));
        assert!(config.persist);
    }

    #[test]
    fn test_snapshot_round_trip_preserves_expiry() {
        use mintvault_core::{Email, IdentityMetadata, UserId};
        use uuid::Uuid;

        let session = Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 5_000,
            obtained_at: 1_000,
            user: UserIdentity {
                id: UserId::new(Uuid::nil()),
                email: Email::parse("x@y.z").unwrap(),
                metadata: IdentityMetadata::default(),
            },
        };
        let snapshot = SessionSnapshot::capture(&session, 1_234);
        let raw = serde_json::to_string(&snapshot).unwrap();
        let restored: SessionSnapshot = serde_json::from_str(&raw).unwrap();
        let restored = restored.into_session();
        assert_eq!(restored.expires_at, 5_000);
        assert_eq!(restored.obtained_at, 1_234);
        assert_eq!(restored.access_token, "a");
    }
}
