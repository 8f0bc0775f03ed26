//! Cached user identity.

use serde::{Deserialize, Serialize};

/// Who the backend says the current token belongs to.
///
/// A convenience projection only. The token decides whether a user is
/// logged in; this record is refreshed when an identity probe succeeds and
/// dropped with the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(default)]
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_image: String,
}

impl UserIdentity {
    /// Identity known only by nickname, as returned by the identity probe.
    pub fn from_nickname(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            ..Default::default()
        }
    }
}
