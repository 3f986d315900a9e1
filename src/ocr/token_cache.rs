use std::time::{Duration, SystemTime};

/// A bearer token and the moment it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: SystemTime,
}

/// Caches the OCR provider's bearer token between calls.
///
/// Owned by whoever owns the HTTP client and passed in explicitly. Time is
/// supplied by the caller so expiry can be tested without a clock.
#[derive(Debug, Clone)]
pub struct TokenCache {
    current: Option<CachedToken>,
    refresh_margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl TokenCache {
    /// Tokens are refreshed once fewer than `refresh_margin` remain.
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            current: None,
            refresh_margin,
        }
    }

    pub fn is_fresh(&self, now: SystemTime) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| now + self.refresh_margin < c.expires_at)
    }

    /// Return the cached token, calling `fetch` once if it is missing or
    /// about to expire. A failed fetch leaves the cache empty.
    pub fn get_or_refresh<F>(&mut self, now: SystemTime, fetch: F) -> anyhow::Result<&str>
    where
        F: FnOnce() -> anyhow::Result<CachedToken>,
    {
        if !self.is_fresh(now) {
            self.current = None;
            self.current = Some(fetch()?);
        }
        match &self.current {
            Some(c) => Ok(c.token.as_str()),
            None => anyhow::bail!("token cache is empty after refresh"),
        }
    }

    /// Drop the token, e.g. after the provider answered 401.
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
