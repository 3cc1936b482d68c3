use authn_clock::{Clock, System};
use url::Url;

use super::{flow::RefreshFlow, ProviderConfig, TokenProvider};
use crate::{
    error::{DiscoveryError, Error},
    transport::{AsyncHttpClient, HttpClient},
    Scope, Token, TokenContainer,
};

/// A token provider that suspends the calling task while talking to the issuer
///
/// See the [module documentation][crate::provider] for the refresh behavior.
#[derive(Debug)]
pub struct AsyncTokenProvider<H, C = System> {
    flow: RefreshFlow<C>,
    http: H,
}

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
impl<C: Clone> AsyncTokenProvider<reqwest::Client, C> {
    /// Constructs a provider backed by a reqwest client
    ///
    /// The client is built from the configuration's HTTP settings.
    pub fn new(config: ProviderConfig<C>) -> Result<Self, Error> {
        let http = config.http.async_client()?;
        Ok(Self::with_http_client(config, http))
    }
}

impl<H, C: Clone> AsyncTokenProvider<H, C> {
    /// Constructs a provider using the given HTTP client
    pub fn with_http_client(config: ProviderConfig<C>, http: H) -> Self {
        Self {
            flow: RefreshFlow::new(config),
            http,
        }
    }

    /// Derives a provider requesting a different scope
    ///
    /// The new provider shares no token state with this one. It starts from
    /// the refresh token this provider was created with and reuses the token
    /// endpoint if it has already been resolved.
    pub fn with_scope(&self, scope: impl Into<Scope>) -> Self
    where
        H: Clone,
    {
        Self::with_http_client(self.flow.derive(Some(scope.into())), self.http.clone())
    }

    /// Derives a blocking provider with the same configuration
    ///
    /// The new provider has independent, freshly initialized token state.
    /// The blocking reqwest client panics if it is built or used from within
    /// an asynchronous runtime, so call this from a plain thread.
    #[cfg(feature = "blocking")]
    #[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
    pub fn as_blocking(&self) -> Result<TokenProvider<reqwest::blocking::Client, C>, Error> {
        let config = self.flow.derive(None);
        let http = config.http.blocking_client()?;
        Ok(TokenProvider::with_http_client(config, http))
    }

    /// Derives a blocking provider with the same configuration, using the
    /// given HTTP client
    pub fn as_blocking_with<B: HttpClient>(&self, http: B) -> TokenProvider<B, C> {
        TokenProvider::with_http_client(self.flow.derive(None), http)
    }
}

impl<H, C> AsyncTokenProvider<H, C> {
    /// The provider's configuration
    #[inline]
    pub fn config(&self) -> &ProviderConfig<C> {
        self.flow.config()
    }

    /// The token endpoint, once known
    #[inline]
    pub fn token_endpoint(&self) -> Option<&Url> {
        self.flow.token_url()
    }

    /// The container holding the current tokens
    #[inline]
    pub fn container(&self) -> &TokenContainer<C> {
        self.flow.container()
    }

    /// The HTTP client in use
    #[inline]
    pub fn http_client(&self) -> &H {
        &self.http
    }
}

impl<H: AsyncHttpClient, C: Clock> AsyncTokenProvider<H, C> {
    /// Gets a valid access token, refreshing it first if required
    ///
    /// On first use with an issuer URL, this also discovers the token
    /// endpoint. Errors are returned as-is; nothing is retried.
    pub async fn token(&mut self) -> Result<&Token, Error> {
        self.ensure_token_endpoint().await?;

        if self.flow.refresh_required() {
            self.refresh().await?;
        } else {
            tracing::trace!("current access token is still valid");
        }

        self.flow.token()
    }

    /// Gets a valid access token as a bearer string
    pub async fn bearer_token(&mut self) -> Result<String, Error> {
        self.token().await.map(|t| t.as_str().to_owned())
    }

    #[tracing::instrument(level = "debug", err, skip(self))]
    async fn ensure_token_endpoint(&mut self) -> Result<(), DiscoveryError> {
        if let Some(request) = self.flow.discovery_request()? {
            let response = self
                .http
                .execute(request)
                .await
                .map_err(DiscoveryError::Transport)?;
            self.flow.resolve_endpoint(response)?;
        }
        Ok(())
    }

    #[tracing::instrument(
        err,
        skip(self),
        fields(
            token_url = super::flow::maybe_value(&self.flow.token_url().map(Url::as_str)),
            client_id = %self.flow.config().client_id(),
            scope = super::flow::maybe_value(&self.flow.config().scope().map(|s| s.as_str())),
        ),
    )]
    async fn refresh(&mut self) -> Result<(), Error> {
        let request = self.flow.refresh_request()?;
        let response = self
            .http
            .execute(request)
            .await
            .map_err(Error::Transport)?;
        self.flow.complete_refresh(response)
    }
}
