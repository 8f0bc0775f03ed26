//! OAuth provider SDK seam.

use crate::AuthResult;

/// Hook into a provider SDK that keeps its own login state.
///
/// Logout asks it to forget the user once the backend has been told.
/// Implementations may fail or panic; both are contained by the caller.
pub trait ProviderSdk: Send + Sync {
    /// Whether the SDK is loaded and initialized.
    fn is_available(&self) -> bool;

    fn logout(&self) -> AuthResult<()>;
}

/// Host without a provider SDK.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProviderSdk;

impl ProviderSdk for NoProviderSdk {
    fn is_available(&self) -> bool {
        false
    }

    fn logout(&self) -> AuthResult<()> {
        Ok(())
    }
}
