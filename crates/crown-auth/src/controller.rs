//! Session controller.
//!
//! Owns the one authoritative [`SessionState`] and drives it through the
//! session FSM: the startup check (stored token → identity probe), login
//! completion, and the logout sequence. Observers read snapshots through
//! [`SessionController::state`] or follow changes through
//! [`SessionController::subscribe`].

use crate::gateway::{IdentityGateway, ProfileSummary};
use crate::policy::RemoteCall;
use crate::provider::ProviderSdk;
use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionState};
use crate::{AuthError, AuthResult};
use crown_storage::{TokenCodec, TokenStore, UserIdentity};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default bound on every remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CAPACITY: usize = 16;

/// How a call to [`SessionController::logout`] was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The full sequence ran and the session is gone.
    Completed,
    /// Another logout was already running; this call did nothing.
    Coalesced,
}

/// Where a [`Profile`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Remote,
    Cached,
}

/// Profile as the shell presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub nickname: String,
    pub play_count: u64,
    pub total_play_time: u64,
    pub profile_image: String,
    pub source: ProfileSource,
}

impl Profile {
    fn from_summary(summary: ProfileSummary) -> Self {
        Self {
            nickname: summary.name,
            play_count: summary.all_cnt,
            total_play_time: summary.all_time,
            profile_image: summary.profile,
            source: ProfileSource::Remote,
        }
    }

    fn from_identity(identity: &UserIdentity) -> Self {
        Self {
            nickname: identity.nickname.clone(),
            play_count: 0,
            total_play_time: 0,
            profile_image: identity.profile_image.clone(),
            source: ProfileSource::Cached,
        }
    }
}

struct Inner {
    machine: SessionMachine,
    identity: Option<UserIdentity>,
}

impl Inner {
    fn snapshot(&self) -> SessionState {
        SessionState::from_machine(self.machine.state(), self.identity.as_ref())
    }
}

/// Clears the logout flag when the sequence ends, even by panic.
struct LogoutGuard<'a>(&'a AtomicBool);

impl Drop for LogoutGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates the session lifecycle.
///
/// Construct exactly one per application and share it behind an `Arc`.
pub struct SessionController {
    store: TokenStore,
    gateway: Arc<dyn IdentityGateway>,
    provider: Arc<dyn ProviderSdk>,
    request_timeout: Duration,
    inner: Mutex<Inner>,
    initialized: AtomicBool,
    logout_in_progress: AtomicBool,
    events: broadcast::Sender<SessionState>,
}

impl SessionController {
    pub fn new(
        store: TokenStore,
        gateway: Arc<dyn IdentityGateway>,
        provider: Arc<dyn ProviderSdk>,
        request_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            gateway,
            provider,
            request_timeout,
            inner: Mutex::new(Inner {
                machine: SessionMachine::new(),
                identity: None,
            }),
            initialized: AtomicBool::new(false),
            logout_in_progress: AtomicBool::new(false),
            events,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.lock().snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Receive every visible state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.events.subscribe()
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Wait until no identity check is in flight, then return the state.
    pub async fn settled(&self) -> SessionState {
        let mut events = self.subscribe();
        loop {
            let state = self.state();
            if state != SessionState::Checking {
                return state;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.state(),
            }
        }
    }

    /// Apply `input` and notify subscribers if the visible state changed.
    ///
    /// `identity` is recorded on `ProbeSucceeded`; every input that ends the
    /// session drops the cached one.
    fn apply(
        &self,
        input: SessionMachineInput,
        identity: Option<UserIdentity>,
    ) -> AuthResult<SessionState> {
        let mut inner = self.inner.lock();
        let old_state = inner.snapshot();

        inner.machine.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                inner.machine.state()
            ))
        })?;

        match input {
            SessionMachineInput::ProbeSucceeded => inner.identity = identity,
            SessionMachineInput::NoToken | SessionMachineInput::LogoutCompleted => {
                inner.identity = None
            }
            _ => {}
        }

        let new_state = inner.snapshot();
        drop(inner);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
            // No receivers is fine
            let _ = self.events.send(new_state.clone());
        }

        Ok(new_state)
    }

    fn transition(&self, input: SessionMachineInput) -> AuthResult<SessionState> {
        self.apply(input, None)
    }

    // ==========================================
    // Startup
    // ==========================================

    /// Run the startup check once: restore the stored token and confirm it
    /// with the backend.
    ///
    /// Later calls return the current state without doing anything.
    pub async fn initialize(&self) -> SessionState {
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Session already initialized");
            return self.state();
        }

        let Some(token) = self.store.read() else {
            info!("No stored session found on startup");
            if let Err(e) = self.transition(SessionMachineInput::NoToken) {
                debug!(error = %e, "Startup check superseded");
            }
            return self.state();
        };

        if let Err(e) = self.transition(SessionMachineInput::TokenFound) {
            debug!(error = %e, "Startup check superseded");
            return self.state();
        }

        info!("Stored token found, verifying with server");
        self.verify(&token).await
    }

    /// Probe the backend for `token`'s owner. Any failure runs the full
    /// logout sequence.
    async fn verify(&self, token: &str) -> SessionState {
        let probe = RemoteCall::IdentityProbe
            .run(self.request_timeout, self.gateway.fetch_identity(token))
            .await;

        match probe {
            Ok(_) if self.store.read_raw().as_deref() != Some(token) => {
                warn!("Stored token changed while probing, discarding identity");
                if self.state() == SessionState::Checking {
                    self.logout().await;
                }
            }
            Ok(identity) => {
                match self.apply(SessionMachineInput::ProbeSucceeded, Some(identity.clone())) {
                    Ok(_) => {
                        self.store.save_identity(&identity);
                        info!(nickname = %identity.nickname, "Session verified");
                    }
                    Err(e) => debug!(error = %e, "Session ended while probing"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Session verification failed, logging out");
                self.logout().await;
            }
        }

        self.state()
    }

    // ==========================================
    // Login
    // ==========================================

    /// Adopt a freshly issued token and confirm it with the backend.
    ///
    /// Malformed or expired tokens are refused before anything is stored.
    /// Fails with [`AuthError::InvalidStateTransition`] while another check
    /// is in flight, leaving the stored session untouched. Once accepted,
    /// the previous session's credentials are purged before the new token
    /// is written.
    pub async fn complete_login(&self, token: &str) -> AuthResult<SessionState> {
        let token = token.trim();
        TokenCodec::validate(token)?;

        self.transition(SessionMachineInput::LoginSubmitted)?;
        self.store.purge();

        if !self.store.save(token) {
            warn!("Could not persist new token, abandoning login");
            self.logout().await;
            return Ok(self.state());
        }

        info!(token_len = token.len(), "Login submitted, verifying with server");
        Ok(self.verify(token).await)
    }

    // ==========================================
    // Logout
    // ==========================================

    /// Tear the session down locally and remotely.
    ///
    /// Remote steps are best-effort; local state is always purged and the
    /// session always ends `Unauthenticated`. A call made while another
    /// logout is running returns [`LogoutOutcome::Coalesced`] at once.
    pub async fn logout(&self) -> LogoutOutcome {
        if self
            .logout_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Logout already in progress");
            return LogoutOutcome::Coalesced;
        }
        let _guard = LogoutGuard(&self.logout_in_progress);

        // Expired tokens are still worth revoking
        let token = self.store.read_raw();

        if let Ok(outcome) = RemoteCall::Revoke
            .run(self.request_timeout, self.gateway.revoke(token.as_deref()))
            .await
        {
            debug!(outcome = ?outcome, "Revoke finished");
        }

        let provider = self.provider.clone();
        let _ = RemoteCall::ProviderLogout.run_blocking(move || {
            if provider.is_available() {
                provider.logout()
            } else {
                Ok(())
            }
        });

        self.store.purge();

        if let Err(e) = self.transition(SessionMachineInput::LogoutCompleted) {
            warn!(error = %e, "Unexpected logout transition failure");
        }

        info!("Logged out");
        LogoutOutcome::Completed
    }

    // ==========================================
    // Account
    // ==========================================

    /// Provider consent URL to send the user to.
    pub async fn request_login_link(&self) -> AuthResult<String> {
        RemoteCall::LoginLink
            .run(self.request_timeout, self.gateway.request_login_link())
            .await
    }

    /// Profile summary, falling back to the cached identity when the backend
    /// cannot be reached. Any answer the backend did give, such as a 401 or a
    /// 404, is returned as is.
    pub async fn profile(&self) -> AuthResult<Profile> {
        let token = self.store.read().ok_or(AuthError::NotLoggedIn)?;

        match RemoteCall::Profile
            .run(self.request_timeout, self.gateway.fetch_profile(&token))
            .await
        {
            Ok(summary) => Ok(Profile::from_summary(summary)),
            Err(e) if !e.is_transient() => Err(e),
            Err(e) => {
                let cached = self
                    .store
                    .read_identity()
                    .or_else(|| self.state().identity().cloned());
                match cached {
                    Some(identity) => {
                        info!("Serving cached profile");
                        Ok(Profile::from_identity(&identity))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Rename the current user and refresh the cached identity.
    pub async fn update_nickname(&self, nickname: &str) -> AuthResult<UserIdentity> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(AuthError::InvalidNickname);
        }
        let token = self.store.read().ok_or(AuthError::NotLoggedIn)?;

        RemoteCall::UpdateNickname
            .run(
                self.request_timeout,
                self.gateway.update_nickname(&token, nickname),
            )
            .await?;

        let mut identity = self
            .store
            .read_identity()
            .or_else(|| self.state().identity().cloned())
            .unwrap_or_default();
        identity.nickname = nickname.to_string();
        self.store.save_identity(&identity);
        self.refresh_identity(identity.clone());

        Ok(identity)
    }

    fn refresh_identity(&self, identity: UserIdentity) {
        let mut inner = self.inner.lock();
        let old_state = inner.snapshot();
        if !old_state.is_authenticated() {
            return;
        }
        inner.identity = Some(identity);
        let new_state = inner.snapshot();
        drop(inner);

        if old_state != new_state {
            let _ = self.events.send(new_state);
        }
    }
}
