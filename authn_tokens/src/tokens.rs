use authn_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{AccessToken, AccessTokenRef, Scope, ScopeRef};

/// An access token as issued by the token endpoint
///
/// A new token is created for every successful exchange; tokens are never
/// modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<Scope>,
}

impl Token {
    /// Constructs a new token
    pub fn new(access_token: AccessToken, expiry: Option<UnixTime>, scope: Option<Scope>) -> Self {
        Self {
            access_token,
            expiry,
            scope,
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the raw bearer token string
    #[inline]
    pub fn as_str(&self) -> &str {
        self.access_token.as_str()
    }

    /// Gets the time at which the issuer considers the token expired
    ///
    /// This is absent when the token endpoint did not report a usable
    /// `expires_in`.
    #[inline]
    pub fn expiry(&self) -> Option<UnixTime> {
        self.expiry
    }

    /// Gets the scope granted to this token, if reported
    #[inline]
    pub fn scope(&self) -> Option<&ScopeRef> {
        self.scope.as_deref()
    }

    /// Whether the issuer would consider the token expired at `time`
    ///
    /// Tokens without a known expiry are never reported as expired.
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        matches!(self.expiry, Some(expiry) if expiry <= time)
    }

    /// Formats the token as an `Authorization` header value
    pub fn authorization_header(&self) -> String {
        let mut value = String::with_capacity(self.as_str().len() + 7);
        value.push_str("Bearer ");
        value.push_str(self.as_str());
        value
    }

    /// Unwraps the bearer token string
    #[inline]
    pub fn into_string(self) -> String {
        self.access_token.take()
    }
}

/// A token's lifecycle status as seen by a [`TokenContainer`][crate::TokenContainer]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token has been obtained yet
    Uninitialized,
    /// The token can be used as-is
    Valid,
    /// The token is expired or close enough to expiry that it should be refreshed
    Stale,
}

/// Configuration for determining how long an access token should be trusted
#[derive(Clone, Debug)]
pub struct TokenLifetimeConfig<C = System> {
    expiry_threshold: DurationSecs,
    expires_in_fallback: DurationSecs,
    minimal_expires_in: Option<DurationSecs>,
    clock: C,
}

impl Default for TokenLifetimeConfig {
    /// Default lifetime configuration
    ///
    /// Tokens are refreshed 5 seconds before they expire. Responses without
    /// an `expires_in` are assumed to be valid for 30 seconds. No cap is placed
    /// on how long a token is trusted, and the system clock is used.
    fn default() -> Self {
        Self {
            expiry_threshold: Self::DEFAULT_EXPIRY_THRESHOLD,
            expires_in_fallback: Self::DEFAULT_EXPIRES_IN_FALLBACK,
            minimal_expires_in: None,
            clock: System,
        }
    }
}

impl TokenLifetimeConfig {
    /// Default lead time before expiry at which a token is treated as stale
    pub const DEFAULT_EXPIRY_THRESHOLD: DurationSecs = DurationSecs(5);

    /// Default lifetime assumed when the token endpoint omits `expires_in`
    pub const DEFAULT_EXPIRES_IN_FALLBACK: DurationSecs = DurationSecs(30);

    /// Constructs a new lifetime configuration using the system clock
    pub fn new(expiry_threshold: DurationSecs, expires_in_fallback: DurationSecs) -> Self {
        Self {
            expiry_threshold,
            expires_in_fallback,
            minimal_expires_in: None,
            clock: System,
        }
    }
}

impl<C> TokenLifetimeConfig<C> {
    /// Sets how long before expiry a token should be considered stale
    ///
    /// This is the earliest moment a refresh may happen, not a promise that
    /// one will happen before the token expires.
    pub fn with_expiry_threshold(mut self, expiry_threshold: impl Into<DurationSecs>) -> Self {
        self.expiry_threshold = expiry_threshold.into();
        self
    }

    /// Sets the lifetime assumed for tokens whose response has no `expires_in`
    pub fn with_expires_in_fallback(mut self, expires_in_fallback: impl Into<DurationSecs>) -> Self {
        self.expires_in_fallback = expires_in_fallback.into();
        self
    }

    /// Caps how long any single token is trusted, regardless of what the issuer reports
    pub fn with_minimal_expires_in(mut self, minimal_expires_in: impl Into<DurationSecs>) -> Self {
        self.minimal_expires_in = Some(minimal_expires_in.into());
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenLifetimeConfig<D> {
        TokenLifetimeConfig {
            expiry_threshold: self.expiry_threshold,
            expires_in_fallback: self.expires_in_fallback,
            minimal_expires_in: self.minimal_expires_in,
            clock,
        }
    }

    /// The configured expiry threshold
    #[inline]
    pub fn expiry_threshold(&self) -> DurationSecs {
        self.expiry_threshold
    }

    /// The configured `expires_in` fallback
    #[inline]
    pub fn expires_in_fallback(&self) -> DurationSecs {
        self.expires_in_fallback
    }

    /// The configured cap on token lifetime, if any
    #[inline]
    pub fn minimal_expires_in(&self) -> Option<DurationSecs> {
        self.minimal_expires_in
    }

    /// The clock used to tell the current time
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> TokenLifetimeConfig<C> {
    /// Computes the issuer expiry and the container's own refresh deadline
    /// for a token received at `issued`
    ///
    /// A negative `expires_in` yields a token that is already expired.
    pub(crate) fn expiries(
        &self,
        issued: UnixTime,
        expires_in: Option<i64>,
    ) -> (Option<UnixTime>, UnixTime) {
        let issuer_expiry = match expires_in {
            None | Some(0) => None,
            Some(secs) if secs < 0 => Some(issued - DurationSecs(secs.unsigned_abs())),
            Some(secs) => Some(issued + DurationSecs(secs.unsigned_abs())),
        };

        let working_expiry = issuer_expiry.unwrap_or(issued + self.expires_in_fallback);
        let effective_expiry = match self.minimal_expires_in {
            Some(minimal) => working_expiry.min(issued + minimal),
            None => working_expiry,
        };

        (issuer_expiry, effective_expiry)
    }

    /// Whether a token with the given refresh deadline should be renewed now
    pub(crate) fn is_stale(&self, effective_expiry: UnixTime) -> bool {
        effective_expiry <= self.clock.now() + self.expiry_threshold
    }
}
