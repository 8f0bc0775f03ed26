//! One-shot consumer of the OAuth provider redirect.

use crate::controller::SessionController;
use crate::session_fsm::SessionState;
use crate::{AuthError, AuthResult};
use crown_storage::{TokenCodec, UserIdentity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Query parameter carrying the issued token.
pub const TOKEN_PARAM: &str = "accessToken";

const SUBMIT_ATTEMPTS: usize = 3;

/// Entry points the handler can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Where a signed-in user lands.
    Default,
    /// Where a signed-out user lands.
    Unauthenticated,
}

/// The shell around the handler: its address bar and its router.
pub trait CallbackHost: Send + Sync {
    /// Replace the current location without adding a history entry.
    fn replace_location(&self, location: &str);

    fn navigate(&self, route: Route);
}

/// What handling a callback amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Token accepted and confirmed by the backend.
    LoggedIn(UserIdentity),
    /// Token accepted locally but the session did not come up.
    LoginFailed,
    /// Token present but malformed or expired.
    Rejected,
    /// No token in the URL.
    Missing,
    /// A previous invocation already handled the callback.
    AlreadyProcessed,
}

/// Handles the provider redirect exactly once.
pub struct OAuthCallbackHandler {
    controller: Arc<SessionController>,
    host: Arc<dyn CallbackHost>,
    processed: AtomicBool,
}

impl OAuthCallbackHandler {
    pub fn new(controller: Arc<SessionController>, host: Arc<dyn CallbackHost>) -> Self {
        Self {
            controller,
            host,
            processed: AtomicBool::new(false),
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::Acquire)
    }

    /// Consume the callback URL.
    ///
    /// The token query parameter is stripped from the host location before
    /// any network call is made. A token arriving while the startup check is
    /// still running waits for that check to finish and then replaces its
    /// session. Only the first invocation does anything.
    pub async fn handle(&self, callback_url: &str) -> CallbackOutcome {
        if self.processed.swap(true, Ordering::AcqRel) {
            debug!("OAuth callback already processed");
            return CallbackOutcome::AlreadyProcessed;
        }

        let (location, token) = split_callback(callback_url);
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            info!("OAuth callback carried no token");
            self.host.replace_location(&location);
            self.host.navigate(Route::Unauthenticated);
            return CallbackOutcome::Missing;
        };

        if let Err(e) = TokenCodec::validate(&token) {
            warn!(error = %e, "OAuth callback token rejected");
            self.host.replace_location(&location);
            self.controller.logout().await;
            self.host.navigate(Route::Unauthenticated);
            return CallbackOutcome::Rejected;
        }

        self.host.replace_location(&location);

        match self.submit(&token).await {
            Ok(SessionState::Authenticated(identity)) => {
                info!(nickname = %identity.nickname, "OAuth login completed");
                self.host.navigate(Route::Default);
                CallbackOutcome::LoggedIn(identity)
            }
            Ok(state) => {
                warn!(state = ?state, "OAuth login did not authenticate");
                self.host.navigate(Route::Unauthenticated);
                CallbackOutcome::LoginFailed
            }
            Err(e) => {
                warn!(error = %e, "OAuth login failed");
                self.host.navigate(Route::Unauthenticated);
                CallbackOutcome::LoginFailed
            }
        }
    }

    /// Hand `token` to the controller once no other check is in flight.
    async fn submit(&self, token: &str) -> AuthResult<SessionState> {
        for _ in 1..SUBMIT_ATTEMPTS {
            let state = self.controller.settled().await;
            match self.controller.complete_login(token).await {
                Err(AuthError::InvalidStateTransition(reason)) => {
                    debug!(
                        state = ?state,
                        reason = %reason,
                        "Session check raced the callback, retrying"
                    );
                }
                result => return result,
            }
        }
        self.controller.settled().await;
        self.controller.complete_login(token).await
    }
}

/// Split a callback URL into its location without query and its token.
///
/// Absolute URLs keep scheme and host; relative ones come back as a path.
fn split_callback(callback_url: &str) -> (String, Option<String>) {
    let (mut url, relative) = match Url::parse(callback_url) {
        Ok(url) => (url, false),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            match Url::parse("http://localhost/").and_then(|base| base.join(callback_url)) {
                Ok(url) => (url, true),
                Err(_) => return (strip_query(callback_url), None),
            }
        }
        Err(_) => return (strip_query(callback_url), None),
    };

    let token = url
        .query_pairs()
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned());
    url.set_query(None);
    url.set_fragment(None);

    let location = if relative {
        url.path().to_string()
    } else {
        url.to_string()
    };
    (location, token)
}

fn strip_query(raw: &str) -> String {
    raw.split(['?', '#']).next().unwrap_or(raw).to_string()
}
