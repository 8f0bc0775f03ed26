//! Storage key constants.

/// Storage keys used by the session client
pub struct StorageKeys;

impl StorageKeys {
    /// Raw access token string
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Cached user identity (JSON)
    pub const USER: &'static str = "user";

    /// Substrings that mark a key as auth-related for the purge sweep.
    pub const AUTH_MARKERS: [&'static str; 3] = ["token", "auth", "user"];

    /// Whether `key` should be swept when the session is purged.
    pub fn is_auth_related(key: &str) -> bool {
        let lowered = key.to_ascii_lowercase();
        Self::AUTH_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    }
}
