//! Session lifecycle for the crown client.
//!
//! This crate provides:
//! - An explicit FSM for session state (unknown, checking, authenticated,
//!   unauthenticated)
//! - [`SessionController`]: startup auto-login, login completion, and a
//!   failure-tolerant, coalescing logout
//! - [`IdentityGateway`] with an HTTP implementation of the backend contract
//! - [`OAuthCallbackHandler`] and [`CallbackListener`] for the provider redirect

mod callback;
mod controller;
mod error;
mod gateway;
mod listener;
mod policy;
mod provider;
mod session_fsm;

pub use callback::{CallbackHost, CallbackOutcome, OAuthCallbackHandler, Route, TOKEN_PARAM};
pub use controller::{
    LogoutOutcome, Profile, ProfileSource, SessionController, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{AuthError, AuthResult};
pub use gateway::{HttpIdentityGateway, IdentityGateway, ProfileSummary, RevokeOutcome};
pub use listener::CallbackListener;
pub use policy::{CallPolicy, RemoteCall};
pub use provider::{NoProviderSdk, ProviderSdk};
pub use session_fsm::session_machine;
pub use session_fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionState};
