//! Failure policy for every remote call the session makes.

use crate::{AuthError, AuthResult};
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote calls issued by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    IdentityProbe,
    Revoke,
    ProviderLogout,
    LoginLink,
    Profile,
    UpdateNickname,
}

/// What a failed call means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPolicy {
    /// Failure invalidates the session.
    Authoritative,
    /// Failure is logged and the surrounding sequence carries on.
    BestEffort,
    /// Failure is returned to the caller; the session is untouched.
    Surfaced,
}

impl RemoteCall {
    pub fn policy(self) -> CallPolicy {
        match self {
            RemoteCall::IdentityProbe => CallPolicy::Authoritative,
            RemoteCall::Revoke | RemoteCall::ProviderLogout => CallPolicy::BestEffort,
            RemoteCall::LoginLink | RemoteCall::Profile | RemoteCall::UpdateNickname => {
                CallPolicy::Surfaced
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RemoteCall::IdentityProbe => "identity probe",
            RemoteCall::Revoke => "revoke",
            RemoteCall::ProviderLogout => "provider logout",
            RemoteCall::LoginLink => "login link",
            RemoteCall::Profile => "profile",
            RemoteCall::UpdateNickname => "update nickname",
        }
    }

    /// Run `fut` under `timeout`, turning a panic into [`AuthError::Panicked`].
    ///
    /// Failures are logged at a level matching the call's policy.
    pub async fn run<T, F>(self, timeout: Duration, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        let guarded = AssertUnwindSafe(fut).catch_unwind();
        let result = match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AuthError::Panicked(self.name())),
            Err(_) => Err(AuthError::Timeout),
        };

        if let Err(e) = &result {
            match self.policy() {
                CallPolicy::BestEffort => {
                    debug!(call = self.name(), error = %e, "Best-effort call failed")
                }
                CallPolicy::Authoritative | CallPolicy::Surfaced => {
                    warn!(call = self.name(), error = %e, "Remote call failed")
                }
            }
        }

        result
    }

    /// Synchronous counterpart of [`RemoteCall::run`] for in-process SDK hooks.
    pub fn run_blocking<T>(self, f: impl FnOnce() -> AuthResult<T>) -> AuthResult<T> {
        let result = std::panic::catch_unwind(AssertUnwindSafe(f))
            .unwrap_or(Err(AuthError::Panicked(self.name())));
        if let Err(e) = &result {
            debug!(call = self.name(), error = %e, "Best-effort call failed");
        }
        result
    }
}
