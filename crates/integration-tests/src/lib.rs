//! Shared test support for the MintVault client SDK.
//!
//! Provides a fully programmable [`MockBackend`], a [`ManualClock`] the
//! tests advance in lockstep with Tokio's paused time, and small fixture
//! helpers. Tests live in `tests/`.

#![cfg_attr(not(test), forbid(unsafe_code))]
// Test-support crate: panics on misconfigured fixtures are fine.
#![allow(clippy::unwrap_used)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Semaphore, broadcast};
use uuid::Uuid;

use mintvault_client::backend::{
    AuthEvent, AuthSignal, Backend, BackendError, ProfilePatch, ProfileRow,
};
use mintvault_client::{AuthState, Clock};
use mintvault_core::{Email, IdentityMetadata, Session, UserId, UserIdentity};

/// A wall clock the test drives by hand.
///
/// Advance it in lockstep with `tokio::time::advance` so wall-clock
/// reads and timer firings agree.
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    #[must_use]
    pub fn new(start: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(start)))
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }

    #[must_use]
    pub fn current(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Advance paused Tokio time and the manual clock together, then let
/// woken tasks run.
pub async fn advance(clock: &ManualClock, seconds: u64) {
    clock.advance(i64::try_from(seconds).unwrap());
    tokio::time::advance(std::time::Duration::from_secs(seconds)).await;
    settle().await;
}

/// Let ready tasks run to quiescence without advancing time.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Fixture identity.
#[must_use]
pub fn test_identity() -> UserIdentity {
    UserIdentity {
        id: UserId::new(Uuid::from_u128(0x4242)),
        email: Email::parse("collector@example.com").unwrap(),
        metadata: IdentityMetadata {
            username: Some("vaultkeeper".to_string()),
            full_name: None,
            avatar_url: None,
        },
    }
}

/// Fixture session expiring at the given epoch second.
#[must_use]
pub fn session_expiring_at(expires_at: i64) -> Session {
    Session {
        access_token: format!("access-{expires_at}"),
        refresh_token: format!("refresh-{expires_at}"),
        expires_at,
        obtained_at: 0,
        user: test_identity(),
    }
}

/// What a [`MockBackend`] refresh attempt does.
#[derive(Debug, Clone, Copy)]
pub enum RefreshBehavior {
    /// Issue a replacement session valid for this many seconds.
    Replace { lifetime: i64 },
    /// Reject the refresh.
    Fail,
}

/// What a [`MockBackend`] sign-out attempt does.
#[derive(Debug, Clone, Copy)]
pub enum SignOutBehavior {
    Succeed,
    Fail,
    /// Never resolves - simulates a dead network.
    Hang,
}

/// Programmable in-memory backend.
pub struct MockBackend {
    clock: Arc<ManualClock>,
    current: Mutex<Option<Session>>,
    fail_current: AtomicBool,
    profile_row: Mutex<Option<ProfileRow>>,
    fail_profile: AtomicBool,
    refresh_behavior: Mutex<RefreshBehavior>,
    sign_out_behavior: Mutex<SignOutBehavior>,
    procedure_result: Mutex<serde_json::Value>,
    procedure_calls: Mutex<Vec<(String, serde_json::Value)>>,
    event_tx: broadcast::Sender<AuthSignal>,
    /// When present, `current_session` waits for a permit first.
    session_gate: Mutex<Option<Arc<Semaphore>>>,
    /// When present, `refresh_session` waits for a permit first.
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    /// When present, `fetch_profile_row` waits for a permit first.
    profile_gate: Mutex<Option<Arc<Semaphore>>>,
    pub session_fetches: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub profile_fetches: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl MockBackend {
    #[must_use]
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            clock,
            current: Mutex::new(None),
            fail_current: AtomicBool::new(false),
            profile_row: Mutex::new(None),
            fail_profile: AtomicBool::new(false),
            refresh_behavior: Mutex::new(RefreshBehavior::Replace { lifetime: 3_600 }),
            sign_out_behavior: Mutex::new(SignOutBehavior::Succeed),
            procedure_result: Mutex::new(serde_json::Value::Null),
            procedure_calls: Mutex::new(Vec::new()),
            event_tx,
            session_gate: Mutex::new(None),
            refresh_gate: Mutex::new(None),
            profile_gate: Mutex::new(None),
            session_fetches: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            profile_fetches: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        })
    }

    pub fn set_current_session(&self, session: Option<Session>) {
        *self.current.lock().unwrap() = session;
    }

    pub fn fail_current_session(&self, fail: bool) {
        self.fail_current.store(fail, Ordering::SeqCst);
    }

    pub fn set_profile_row(&self, row: Option<ProfileRow>) {
        *self.profile_row.lock().unwrap() = row;
    }

    pub fn fail_profile_fetch(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        *self.refresh_behavior.lock().unwrap() = behavior;
    }

    pub fn set_sign_out_behavior(&self, behavior: SignOutBehavior) {
        *self.sign_out_behavior.lock().unwrap() = behavior;
    }

    pub fn set_procedure_result(&self, result: serde_json::Value) {
        *self.procedure_result.lock().unwrap() = result;
    }

    /// Calls recorded by `call_procedure`, in order.
    #[must_use]
    pub fn procedure_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.procedure_calls.lock().unwrap().clone()
    }

    /// Block `current_session` until a permit is added to the returned
    /// semaphore.
    #[must_use]
    pub fn gate_session_fetch(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.session_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Block `refresh_session` until a permit is added to the returned
    /// semaphore.
    #[must_use]
    pub fn gate_refresh(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.refresh_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Block `fetch_profile_row` until a permit is added to the returned
    /// semaphore.
    #[must_use]
    pub fn gate_profile_fetch(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.profile_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Emit an auth-change event to subscribers.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let _ = self.event_tx.send(AuthSignal { event, session });
    }

    async fn wait_on(gate: &Mutex<Option<Arc<Semaphore>>>) {
        let gate = gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.unwrap();
            drop(permit);
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.session_fetches.fetch_add(1, Ordering::SeqCst);
        Self::wait_on(&self.session_gate).await;
        if self.fail_current.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 503,
                message: "session endpoint down".to_string(),
            });
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Self::wait_on(&self.refresh_gate).await;
        let behavior = *self.refresh_behavior.lock().unwrap();
        match behavior {
            RefreshBehavior::Replace { lifetime } => {
                let now = self.clock.current();
                let session = Session {
                    access_token: format!("access-r{}", self.refreshes.load(Ordering::SeqCst)),
                    refresh_token: format!("refresh-r{}", self.refreshes.load(Ordering::SeqCst)),
                    expires_at: now + lifetime,
                    obtained_at: now,
                    user: test_identity(),
                };
                *self.current.lock().unwrap() = Some(session.clone());
                Ok(session)
            }
            RefreshBehavior::Fail => Err(BackendError::Api {
                status: 401,
                message: "refresh token revoked".to_string(),
            }),
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.sign_out_behavior.lock().unwrap();
        match behavior {
            SignOutBehavior::Succeed => {
                *self.current.lock().unwrap() = None;
                Ok(())
            }
            SignOutBehavior::Fail => Err(BackendError::Api {
                status: 500,
                message: "logout endpoint down".to_string(),
            }),
            SignOutBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn fetch_profile_row(&self, _user_id: UserId) -> Result<Option<ProfileRow>, BackendError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        Self::wait_on(&self.profile_gate).await;
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 503,
                message: "profiles table unavailable".to_string(),
            });
        }
        Ok(self.profile_row.lock().unwrap().clone())
    }

    async fn update_profile_row(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<ProfileRow, BackendError> {
        let mut row = self
            .profile_row
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default();
        row.id = Some(user_id);
        if let Some(username) = &patch.username {
            if username == "taken" {
                return Err(BackendError::Conflict("username already taken".to_string()));
            }
            row.username = Some(username.clone());
        }
        if let Some(bio) = &patch.bio {
            row.bio = Some(bio.clone());
        }
        *self.profile_row.lock().unwrap() = Some(row.clone());
        Ok(row)
    }

    async fn call_procedure(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        self.procedure_calls
            .lock()
            .unwrap()
            .push((name.to_string(), args));
        Ok(self.procedure_result.lock().unwrap().clone())
    }

    fn events(&self) -> broadcast::Receiver<AuthSignal> {
        self.event_tx.subscribe()
    }
}

/// Shared log of states observed by a listener.
pub type StateLog = Arc<Mutex<Vec<AuthState>>>;

/// A new empty state log.
#[must_use]
pub fn state_log() -> StateLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A listener that appends every observed state to `log`.
#[must_use]
pub fn recording_listener(log: &StateLog) -> impl Fn(&AuthState) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |state: &AuthState| {
        log.lock().unwrap().push(state.clone());
    }
}
