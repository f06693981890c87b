use chrono::{DateTime, Utc};
use std::time::Duration;

/// Cached bearer token and its lease
///
/// The device does not tell the client when a token expires, so every token
/// is assumed to live for a fixed `lifetime` from the moment it was stored.
/// An expiry is only ever set together with a token.
#[derive(Debug, Clone)]
pub struct TokenState {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    lifetime: Duration,
}

impl TokenState {
    /// Empty state with the given lease length
    pub fn new(lifetime: Duration) -> Self {
        Self {
            token: None,
            expires_at: None,
            lifetime,
        }
    }

    /// Check if a token is held and `now` is strictly before its expiry
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expiry)) => now < expiry,
            _ => false,
        }
    }

    /// Check if the token is still valid right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Replace the token, starting a new lease at `issued_at`
    pub fn store(&mut self, token: impl Into<String>, issued_at: DateTime<Utc>) {
        // Lifetimes beyond chrono's range are clamped to the far future.
        let lease = chrono::Duration::from_std(self.lifetime).unwrap_or(chrono::Duration::MAX);
        let expiry = issued_at
            .checked_add_signed(lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.token = Some(token.into());
        self.expires_at = Some(expiry);
    }

    /// Forget the token so the next guarded call logs in again
    pub fn clear(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}
