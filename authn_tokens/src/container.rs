use authn_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{
    AccessToken, Error, RefreshToken, RefreshTokenRef, Scope, Token, TokenLifetimeConfig,
    TokenStatus,
};

/// Holds the refresh credential and the current access token
///
/// The container decides when a new exchange is required and records the
/// outcome of each successful one. It performs no I/O of its own.
#[derive(Debug)]
pub struct TokenContainer<C = System> {
    original_refresh_token: RefreshToken,
    refresh_token: RefreshToken,
    access_token: Option<Token>,
    effective_expiry: Option<UnixTime>,
    lifetime: TokenLifetimeConfig<C>,
}

impl<C> TokenContainer<C> {
    /// Constructs a new container with no access token
    pub fn new(refresh_token: RefreshToken, lifetime: TokenLifetimeConfig<C>) -> Self {
        Self {
            original_refresh_token: refresh_token.clone(),
            refresh_token,
            access_token: None,
            effective_expiry: None,
            lifetime,
        }
    }

    /// The refresh token that will be used for the next exchange
    #[inline]
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        &self.refresh_token
    }

    /// The refresh token the container was created with
    #[inline]
    pub fn original_refresh_token(&self) -> &RefreshTokenRef {
        &self.original_refresh_token
    }

    /// The instant at which the container stops trusting the current token
    ///
    /// Never later than the token's own expiry.
    #[inline]
    pub fn effective_expiry(&self) -> Option<UnixTime> {
        self.effective_expiry
    }

    /// The lifetime configuration in use
    #[inline]
    pub fn lifetime(&self) -> &TokenLifetimeConfig<C> {
        &self.lifetime
    }

    /// Gets the current access token
    ///
    /// Fails with [`Error::NotInitialized`] if no exchange has succeeded yet.
    pub fn access_token(&self) -> Result<&Token, Error> {
        self.access_token.as_ref().ok_or(Error::NotInitialized)
    }
}

impl<C: Clock> TokenContainer<C> {
    /// Gets the status of the current token
    pub fn status(&self) -> TokenStatus {
        match (&self.access_token, self.effective_expiry) {
            (Some(_), Some(expiry)) if !self.lifetime.is_stale(expiry) => TokenStatus::Valid,
            (Some(_), _) => TokenStatus::Stale,
            (None, _) => TokenStatus::Uninitialized,
        }
    }

    /// Whether a token exchange must happen before the token can be used
    #[inline]
    pub fn refresh_required(&self) -> bool {
        self.status() != TokenStatus::Valid
    }

    /// Records the result of a successful token exchange
    ///
    /// A non-empty `refresh_token` replaces the current refresh token. A
    /// missing or zero `expires_in` leaves the token's reported expiry unset,
    /// while the container still schedules its own refresh using the
    /// configured fallback.
    pub fn update(
        &mut self,
        access_token: AccessToken,
        expires_in: Option<DurationSecs>,
        refresh_token: Option<RefreshToken>,
        scope: Option<Scope>,
    ) {
        let expires_in = expires_in.map(|d| i64::try_from(d.0).unwrap_or(i64::MAX));
        self.update_signed(access_token, expires_in, refresh_token, scope);
    }

    /// Records an exchange whose `expires_in` may be negative
    pub(crate) fn update_signed(
        &mut self,
        access_token: AccessToken,
        expires_in: Option<i64>,
        refresh_token: Option<RefreshToken>,
        scope: Option<Scope>,
    ) {
        let now = self.lifetime.clock().now();
        let (issuer_expiry, effective_expiry) = self.lifetime.expiries(now, expires_in);

        if let Some(rt) = refresh_token.filter(|rt| !rt.as_str().is_empty()) {
            self.refresh_token = rt;
        }

        self.access_token = Some(Token::new(access_token, issuer_expiry, scope));
        self.effective_expiry = Some(effective_expiry);
    }
}
