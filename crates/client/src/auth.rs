//! Canonical auth state with subscriber fan-out.
//!
//! [`AuthHub`] is the single source of truth for "who is signed in"
//! across the process. Consumers subscribe and are replayed the current
//! state immediately, even before initialization resolves; every later
//! transition is fanned out synchronously, in registration order, with a
//! full state snapshot.
//!
//! Initialization is memoized: any number of concurrent subscribers
//! trigger exactly one backend session fetch. Profile loading is guarded
//! by an in-flight flag so rapid auth events (a sign-in immediately
//! followed by a token refresh) cannot stampede the profile table. When
//! the profile row is missing or unreadable, a fallback profile is
//! synthesized so consumers never observe a signed-in state without a
//! user record.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::json;
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, warn};

use mintvault_core::{ProfilePreferences, Session, UserId, UserProfile};

use crate::backend::{AuthEvent, AuthSignal, Backend, ProfilePatch};
use crate::error::ClientError;

/// Snapshot of the process-wide authentication state.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The signed-in user's profile (fetched or fallback), if any.
    pub user: Option<UserProfile>,
    /// The active session, if any.
    pub session: Option<Session>,
    /// True only between subscription/initialization start and the first
    /// state resolution.
    pub loading: bool,
    /// Becomes true exactly once per process and never reverts.
    pub initialized: bool,
}

impl AuthState {
    /// Whether a session is held. Mirrors session presence regardless of
    /// whether the profile fetch succeeded.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// The terminal signed-out state.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            user: None,
            session: None,
            loading: false,
            initialized: true,
        }
    }
}

impl Default for AuthState {
    /// The pre-initialization state: nothing known yet, still loading.
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
            initialized: false,
        }
    }
}

type Listener = Arc<dyn Fn(&AuthState) + Send + Sync>;

struct HubInner {
    backend: Arc<dyn Backend>,
    state: Mutex<AuthState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    init: OnceCell<()>,
    fetching_user: AtomicBool,
}

/// Process-wide auth state holder.
///
/// Construct once at application start and share clones; clones observe
/// the same state and listener registry. Requires a Tokio runtime:
/// subscribing spawns the lazy initialization task.
#[derive(Clone)]
pub struct AuthHub {
    inner: Arc<HubInner>,
}

/// Subscription guard returned by [`AuthHub::subscribe`]; dropping it
/// unregisters the listener.
pub struct Subscription {
    inner: Weak<HubInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade()
            && let Ok(mut listeners) = inner.listeners.lock()
        {
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl AuthHub {
    /// Create a hub over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                backend,
                state: Mutex::new(AuthState::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                init: OnceCell::new(),
                fetching_user: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener for state transitions.
    ///
    /// The listener is invoked immediately with the current state (even
    /// if still loading), then on every transition until the returned
    /// [`Subscription`] is dropped. Subscribing lazily triggers
    /// initialization exactly once per process.
    pub fn subscribe(&self, listener: impl Fn(&AuthState) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .expect("listener registry poisoned");
            listeners.push((id, Arc::clone(&listener)));
        }

        // Immediate replay of whatever we know right now.
        let snapshot = self.state();
        invoke_listener(&listener, &snapshot);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.ensure_initialized().await;
        });

        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Resolve the initial auth state from the backend.
    ///
    /// Idempotent: concurrent and repeated calls share one underlying
    /// backend fetch; later calls return once the first resolution is
    /// complete.
    pub async fn initialize(&self) {
        self.inner.ensure_initialized().await;
    }

    /// A snapshot copy of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.lock_state().clone()
    }

    /// Re-run profile loading for the current session.
    ///
    /// Returns the refreshed profile, or `None` when no session is held.
    pub async fn refresh_user(&self) -> Option<UserProfile> {
        let session = self.inner.lock_state().session.clone()?;
        self.inner.load_profile(&session).await;
        self.state().user
    }

    /// Sign out: local state is cleared immediately, then the remote
    /// sign-out is attempted. The backend's `SignedOut` event clears the
    /// state again, which is idempotent.
    pub async fn sign_out(&self) {
        self.inner.publish(AuthState::signed_out());
        if let Err(error) = self.inner.backend.sign_out().await {
            warn!(%error, "remote sign-out failed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Profile Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Apply a patch to the signed-in user's profile row.
    ///
    /// The local profile is never mutated optimistically: on success the
    /// profile is re-fetched before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] when no user is held and
    /// [`ClientError::Conflict`] on unique-constraint violations (e.g.,
    /// duplicate username).
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<UserProfile, ClientError> {
        let user_id = self.require_user()?;
        self.inner
            .backend
            .update_profile_row(user_id, &patch)
            .await?;
        self.refreshed_profile().await
    }

    /// Replace the signed-in user's collecting preferences.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] when no user is held, or
    /// the backend's error if the procedure is rejected.
    pub async fn update_preferences(
        &self,
        preferences: &ProfilePreferences,
    ) -> Result<UserProfile, ClientError> {
        let user_id = self.require_user()?;
        self.inner
            .backend
            .call_procedure(
                "update_preferences",
                json!({ "user_id": user_id, "preferences": preferences }),
            )
            .await?;
        self.refreshed_profile().await
    }

    /// Add a character to the signed-in user's favorites.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] when no user is held, or
    /// the backend's error if the procedure is rejected.
    pub async fn add_favorite_character(&self, character: &str) -> Result<UserProfile, ClientError> {
        let user_id = self.require_user()?;
        self.inner
            .backend
            .call_procedure(
                "add_favorite_character",
                json!({ "user_id": user_id, "character": character }),
            )
            .await?;
        self.refreshed_profile().await
    }

    /// Remove a character from the signed-in user's favorites.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] when no user is held, or
    /// the backend's error if the procedure is rejected.
    pub async fn remove_favorite_character(
        &self,
        character: &str,
    ) -> Result<UserProfile, ClientError> {
        let user_id = self.require_user()?;
        self.inner
            .backend
            .call_procedure(
                "remove_favorite_character",
                json!({ "user_id": user_id, "character": character }),
            )
            .await?;
        self.refreshed_profile().await
    }

    /// Grant XP to the signed-in user (level-ups are computed
    /// server-side).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] when no user is held, or
    /// the backend's error if the procedure is rejected.
    pub async fn add_xp(&self, amount: u32) -> Result<UserProfile, ClientError> {
        let user_id = self.require_user()?;
        self.inner
            .backend
            .call_procedure("add_xp", json!({ "user_id": user_id, "amount": amount }))
            .await?;
        self.refreshed_profile().await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn require_user(&self) -> Result<UserId, ClientError> {
        self.inner
            .lock_state()
            .user
            .as_ref()
            .map(|user| user.id)
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn refreshed_profile(&self) -> Result<UserProfile, ClientError> {
        self.refresh_user()
            .await
            .ok_or(ClientError::NotAuthenticated)
    }
}

impl std::fmt::Debug for AuthHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("AuthHub")
            .field("is_authenticated", &state.is_authenticated())
            .field("initialized", &state.initialized)
            .finish_non_exhaustive()
    }
}

impl HubInner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().expect("auth state poisoned")
    }

    async fn ensure_initialized(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.init
            .get_or_init(|| async move {
                inner.run_initialization().await;
            })
            .await;
    }

    async fn run_initialization(self: &Arc<Self>) {
        match self.backend.current_session().await {
            Ok(Some(session)) => {
                {
                    let mut state = self.lock_state();
                    state.session = Some(session.clone());
                }
                self.load_profile(&session).await;
            }
            Ok(None) => {
                debug!("no existing session");
                self.publish(AuthState::signed_out());
            }
            Err(error) => {
                warn!(%error, "failed to resolve current session");
                self.publish(AuthState::signed_out());
            }
        }

        // Watch backend auth events from here on. Running inside the
        // memoized initialization body, this is registered exactly once
        // per process, whether or not a session was present.
        self.spawn_event_listener();
    }

    fn spawn_event_listener(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let mut events = self.backend.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(signal) => inner.handle_signal(signal).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn handle_signal(self: &Arc<Self>, signal: AuthSignal) {
        debug!(event = ?signal.event, "auth event");
        match (signal.event, signal.session) {
            (AuthEvent::SignedOut, _) | (_, None) => {
                self.publish(AuthState::signed_out());
            }
            (_, Some(session)) => {
                {
                    let mut state = self.lock_state();
                    state.session = Some(session.clone());
                }
                self.load_profile(&session).await;
            }
        }
    }

    /// Fetch (or synthesize) the profile for `session`'s user, then
    /// publish the authenticated state.
    ///
    /// No-op when another fetch is already in flight; the in-flight
    /// fetch's publication carries the latest adopted session.
    async fn load_profile(self: &Arc<Self>, session: &Session) {
        if self
            .fetching_user
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("profile fetch already in flight");
            return;
        }

        let user_id = session.user.id;
        let profile = match self.backend.fetch_profile_row(user_id).await {
            Ok(Some(row)) => row.into_profile(&session.user),
            Ok(None) => {
                debug!(%user_id, "no profile row, synthesizing fallback");
                UserProfile::fallback(&session.user)
            }
            Err(error) => {
                warn!(%error, "profile fetch failed, synthesizing fallback");
                UserProfile::fallback(&session.user)
            }
        };
        self.fetching_user.store(false, Ordering::SeqCst);

        let snapshot = {
            let mut state = self.lock_state();
            state.user = Some(profile);
            state.loading = false;
            state.initialized = true;
            state.clone()
        };
        self.fan_out(&snapshot);
    }

    /// Replace the whole state and notify.
    fn publish(&self, next: AuthState) {
        let snapshot = {
            let mut state = self.lock_state();
            *state = next;
            state.clone()
        };
        self.fan_out(&snapshot);
    }

    /// Notify every listener synchronously, in registration order.
    fn fan_out(&self, snapshot: &AuthState) {
        let listeners: Vec<Listener> = {
            let registry = self.listeners.lock().expect("listener registry poisoned");
            registry
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            invoke_listener(&listener, snapshot);
        }
    }
}

/// One panicking subscriber must not starve the rest.
fn invoke_listener(listener: &Listener, snapshot: &AuthState) {
    if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
        warn!("auth state listener panicked");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_loading() {
        let state = AuthState::default();
        assert!(state.loading);
        assert!(!state.initialized);
        assert!(!state.is_authenticated());
        assert!(state.user.is_none());
    }

    #[test]
    fn test_signed_out_state_is_terminal() {
        let state = AuthState::signed_out();
        assert!(!state.loading);
        assert!(state.initialized);
        assert!(!state.is_authenticated());
    }
}
