//! Token providers performing the refresh token grant on demand
//!
//! A provider hands out the current access token, exchanging its refresh
//! token at the token endpoint whenever the cached access token is missing
//! or stale. The token endpoint is either configured directly or discovered
//! once from the issuer's OpenID configuration document.
//!
//! Two flavors share the same logic: [`TokenProvider`] blocks the calling
//! thread on HTTP calls, while [`AsyncTokenProvider`] suspends the calling
//! task instead. Refreshes only ever happen inside a call to `token()`;
//! nothing runs in the background.
//!
//! Providers do not lock internally. `token()` takes `&mut self`, so a
//! provider shared between threads or tasks has to be wrapped in a mutex
//! (or similar) by the caller, which also ensures that overlapping calls
//! cannot race to perform redundant exchanges.

use authn_clock::System;
use url::Url;

use crate::{
    error::{ConfigError, Error},
    transport::HttpConfig,
    ClientId, ClientIdRef, ClientSecret, RefreshToken, Scope, ScopeRef, TokenLifetimeConfig,
};

mod asynchronous;
mod blocking;
pub(crate) mod dto;
mod flow;
#[cfg(test)]
mod testing;

pub use asynchronous::AsyncTokenProvider;
pub use blocking::TokenProvider;

/// Where the token endpoint comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenEndpoint {
    /// Still to be discovered from the issuer
    Unresolved { issuer_url: Url },
    /// Known, either configured directly or already discovered
    Resolved(Url),
}

/// Validated provider configuration
///
/// Built with a [`ProviderBuilder`]. A configuration can be used to build
/// any number of providers, each with independent token state.
#[derive(Clone, Debug)]
pub struct ProviderConfig<C = System> {
    refresh_token: RefreshToken,
    client_id: ClientId,
    client_secret: Option<ClientSecret>,
    scope: Option<Scope>,
    endpoint: TokenEndpoint,
    lifetime: TokenLifetimeConfig<C>,
    http: HttpConfig,
}

impl<C> ProviderConfig<C> {
    /// The OAuth2 client ID
    #[inline]
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// The scope requested on each exchange, if any
    #[inline]
    pub fn scope(&self) -> Option<&ScopeRef> {
        self.scope.as_deref()
    }

    /// The issuer URL, if the token endpoint still has to be discovered
    pub fn issuer_url(&self) -> Option<&Url> {
        match &self.endpoint {
            TokenEndpoint::Unresolved { issuer_url } => Some(issuer_url),
            TokenEndpoint::Resolved(_) => None,
        }
    }

    /// The token endpoint URL, if known up front
    pub fn token_endpoint_url(&self) -> Option<&Url> {
        match &self.endpoint {
            TokenEndpoint::Resolved(url) => Some(url),
            TokenEndpoint::Unresolved { .. } => None,
        }
    }

    /// The token lifetime configuration
    #[inline]
    pub fn lifetime(&self) -> &TokenLifetimeConfig<C> {
        &self.lifetime
    }

    /// The settings for HTTP clients built by the provider
    #[inline]
    pub fn http(&self) -> &HttpConfig {
        &self.http
    }
}

/// Builder for [`ProviderConfig`]
///
/// Exactly one of [`issuer_url`][Self::issuer_url] or
/// [`token_endpoint_url`][Self::token_endpoint_url] must be set.
///
/// ```
/// use authn_tokens::{ProviderBuilder, TokenLifetimeConfig};
/// use authn_clock::DurationSecs;
///
/// let config = ProviderBuilder::new("my-refresh-token", "my-client")
///     .issuer_url("https://auth.example.com/realms/main")
///     .scope("openid offline_access")
///     .lifetime(TokenLifetimeConfig::default().with_minimal_expires_in(DurationSecs(300)))
///     .build()?;
///
/// assert!(config.token_endpoint_url().is_none());
/// # Ok::<(), authn_tokens::Error>(())
/// ```
#[derive(Debug)]
pub struct ProviderBuilder<C = System> {
    refresh_token: RefreshToken,
    client_id: ClientId,
    issuer_url: Option<String>,
    token_endpoint_url: Option<String>,
    client_secret: Option<ClientSecret>,
    scope: Option<Scope>,
    lifetime: TokenLifetimeConfig<C>,
    http: HttpConfig,
}

impl ProviderBuilder {
    /// Starts a new builder from a refresh token and client ID
    pub fn new(refresh_token: impl Into<RefreshToken>, client_id: impl Into<ClientId>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            client_id: client_id.into(),
            issuer_url: None,
            token_endpoint_url: None,
            client_secret: None,
            scope: None,
            lifetime: TokenLifetimeConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl<C> ProviderBuilder<C> {
    /// Discovers the token endpoint from this issuer
    pub fn issuer_url(mut self, issuer_url: impl Into<String>) -> Self {
        self.issuer_url = Some(issuer_url.into());
        self
    }

    /// Uses this token endpoint directly
    pub fn token_endpoint_url(mut self, token_endpoint_url: impl Into<String>) -> Self {
        self.token_endpoint_url = Some(token_endpoint_url.into());
        self
    }

    /// Sends a client secret, for confidential clients
    pub fn client_secret(mut self, client_secret: impl Into<ClientSecret>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Requests tokens for this scope
    pub fn scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the token lifetime configuration
    pub fn lifetime<D>(self, lifetime: TokenLifetimeConfig<D>) -> ProviderBuilder<D> {
        ProviderBuilder {
            refresh_token: self.refresh_token,
            client_id: self.client_id,
            issuer_url: self.issuer_url,
            token_endpoint_url: self.token_endpoint_url,
            client_secret: self.client_secret,
            scope: self.scope,
            lifetime,
            http: self.http,
        }
    }

    /// Sets the settings used for HTTP clients the provider builds itself
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Validates the configuration
    pub fn build(self) -> Result<ProviderConfig<C>, Error> {
        let issuer_url = self.issuer_url.filter(|u| !u.is_empty());
        let token_endpoint_url = self.token_endpoint_url.filter(|u| !u.is_empty());

        let endpoint = match (issuer_url, token_endpoint_url) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingEndpoints.into()),
            (None, None) => return Err(ConfigError::MissingEndpoint.into()),
            (Some(issuer_url), None) => TokenEndpoint::Unresolved {
                issuer_url: parse_url("issuer", &issuer_url)?,
            },
            (None, Some(token_endpoint_url)) => {
                TokenEndpoint::Resolved(parse_url("token endpoint", &token_endpoint_url)?)
            }
        };

        Ok(ProviderConfig {
            refresh_token: self.refresh_token,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scope: self.scope,
            endpoint,
            lifetime: self.lifetime,
            http: self.http,
        })
    }
}

fn parse_url(name: &'static str, url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|source| ConfigError::InvalidUrl { name, source })
}
