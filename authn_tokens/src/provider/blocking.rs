use authn_clock::{Clock, System};
use url::Url;

use super::{flow::RefreshFlow, AsyncTokenProvider, ProviderConfig};
use crate::{
    error::{DiscoveryError, Error},
    transport::{AsyncHttpClient, HttpClient},
    Scope, Token, TokenContainer,
};

/// A token provider that blocks the calling thread while talking to the issuer
///
/// See the [module documentation][crate::provider] for the refresh behavior.
#[derive(Debug)]
pub struct TokenProvider<H, C = System> {
    flow: RefreshFlow<C>,
    http: H,
}

#[cfg(feature = "blocking")]
#[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
impl<C: Clone> TokenProvider<reqwest::blocking::Client, C> {
    /// Constructs a provider backed by a blocking reqwest client
    ///
    /// The client is built from the configuration's HTTP settings. Must not
    /// be called from within an asynchronous runtime.
    pub fn new(config: ProviderConfig<C>) -> Result<Self, Error> {
        let http = config.http.blocking_client()?;
        Ok(Self::with_http_client(config, http))
    }
}

impl<H, C: Clone> TokenProvider<H, C> {
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

    /// Derives an asynchronous provider with the same configuration
    ///
    /// The new provider has independent, freshly initialized token state.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn as_async(&self) -> Result<AsyncTokenProvider<reqwest::Client, C>, Error> {
        let config = self.flow.derive(None);
        let http = config.http.async_client()?;
        Ok(AsyncTokenProvider::with_http_client(config, http))
    }

    /// Derives an asynchronous provider with the same configuration, using
    /// the given HTTP client
    pub fn as_async_with<A: AsyncHttpClient>(&self, http: A) -> AsyncTokenProvider<A, C> {
        AsyncTokenProvider::with_http_client(self.flow.derive(None), http)
    }
}

impl<H, C> TokenProvider<H, C> {
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

impl<H: HttpClient, C: Clock> TokenProvider<H, C> {
    /// Gets a valid access token, refreshing it first if required
    ///
    /// On first use with an issuer URL, this also discovers the token
    /// endpoint. Errors are returned as-is; nothing is retried.
    pub fn token(&mut self) -> Result<&Token, Error> {
        self.ensure_token_endpoint()?;

        if self.flow.refresh_required() {
            self.refresh()?;
        } else {
            tracing::trace!("current access token is still valid");
        }

        self.flow.token()
    }

    /// Gets a valid access token as a bearer string
    pub fn bearer_token(&mut self) -> Result<String, Error> {
        self.token().map(|t| t.as_str().to_owned())
    }

    #[tracing::instrument(level = "debug", err, skip(self))]
    fn ensure_token_endpoint(&mut self) -> Result<(), DiscoveryError> {
        if let Some(request) = self.flow.discovery_request()? {
            let response = self
                .http
                .execute(request)
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
    fn refresh(&mut self) -> Result<(), Error> {
        let request = self.flow.refresh_request()?;
        let response = self.http.execute(request).map_err(Error::Transport)?;
        self.flow.complete_refresh(response)
    }
}

#[cfg(test)]
mod tests {
    use authn_clock::{DurationSecs, TestClock, UnixTime};
    use serde_json::json;

    use super::*;
    use crate::{
        error::TokenEndpointError,
        provider::testing::{ScriptedHttp, DISCOVERY_URL, ISSUER_URL, TOKEN_ENDPOINT_URL},
        ProviderBuilder, TokenLifetimeConfig,
    };

    const CLIENT_ID: &str = "test-client-id";

    fn provider(
        builder: ProviderBuilder,
        http: &ScriptedHttp,
        clock: &TestClock,
    ) -> TokenProvider<ScriptedHttp, TestClock> {
        let config = builder
            .lifetime(TokenLifetimeConfig::default().with_clock(clock.clone()))
            .build()
            .unwrap();
        TokenProvider::with_http_client(config, http.clone())
    }

    fn direct() -> ProviderBuilder {
        ProviderBuilder::new("input_refresh_token", CLIENT_ID).token_endpoint_url(TOKEN_ENDPOINT_URL)
    }

    #[test]
    fn direct_endpoint_exchanges_without_discovery() {
        let http = ScriptedHttp::default();
        http.respond_json(
            200,
            json!({
                "access_token": "new_access_token",
                "refresh_token": "new_refresh_token",
                "scope": "new scope",
                "expires_in": 3600,
            }),
        );
        let clock = TestClock::new(UnixTime(0));
        let mut provider = provider(direct(), &http, &clock);

        let token = provider.token().unwrap();
        assert_eq!(token.as_str(), "new_access_token");
        assert_eq!(token.scope().map(|s| s.as_str()), Some("new scope"));
        assert_eq!(token.expiry(), Some(UnixTime(3600)));

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(requests[0].uri, TOKEN_ENDPOINT_URL);
        assert_eq!(
            requests[0].form(),
            [
                ("grant_type", "refresh_token"),
                ("client_id", CLIENT_ID),
                ("refresh_token", "input_refresh_token"),
            ]
        );
        assert_eq!(
            provider.container().refresh_token().as_str(),
            "new_refresh_token"
        );
    }

    #[test]
    fn optional_params_are_sent() {
        let http = ScriptedHttp::default();
        http.respond_json(200, json!({ "access_token": "new_access_token" }));
        let clock = TestClock::default();
        let mut provider = provider(
            direct().client_secret("input_client_secret").scope("input scope"),
            &http,
            &clock,
        );

        provider.token().unwrap();

        assert_eq!(
            http.requests()[0].form(),
            [
                ("grant_type", "refresh_token"),
                ("client_id", CLIENT_ID),
                ("refresh_token", "input_refresh_token"),
                ("client_secret", "input_client_secret"),
                ("scope", "input scope"),
            ]
        );
    }

    #[test]
    fn issuer_discovers_once_and_caches_token() {
        let http = ScriptedHttp::default();
        http.respond_json(200, json!({ "token_endpoint": TOKEN_ENDPOINT_URL }));
        http.respond_json(200, json!({ "access_token": "at", "expires_in": 3600 }));
        let clock = TestClock::default();
        let mut provider = provider(
            ProviderBuilder::new("input_refresh_token", CLIENT_ID).issuer_url(ISSUER_URL),
            &http,
            &clock,
        );

        assert!(provider.token_endpoint().is_none());
        assert_eq!(provider.bearer_token().unwrap(), "at");
        assert_eq!(
            provider.token_endpoint().map(Url::as_str),
            Some(TOKEN_ENDPOINT_URL)
        );

        clock.advance(DurationSecs(1800));
        assert_eq!(provider.bearer_token().unwrap(), "at");

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, http::Method::GET);
        assert_eq!(requests[0].uri, DISCOVERY_URL);
        assert_eq!(requests[1].method, http::Method::POST);
        assert_eq!(requests[1].uri, TOKEN_ENDPOINT_URL);
    }

    #[test]
    fn stale_token_is_refreshed_with_rotated_refresh_token() {
        let http = ScriptedHttp::default();
        http.respond_json(
            200,
            json!({ "access_token": "at1", "expires_in": 60, "refresh_token": "rt1" }),
        );
        http.respond_json(200, json!({ "access_token": "at2", "expires_in": 60 }));
        let clock = TestClock::default();
        let mut provider = provider(direct(), &http, &clock);

        assert_eq!(provider.bearer_token().unwrap(), "at1");

        clock.advance(DurationSecs(55));
        assert_eq!(provider.bearer_token().unwrap(), "at2");

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].field("refresh_token"), Some("rt1"));
        assert_eq!(provider.container().refresh_token().as_str(), "rt1");
    }

    #[test]
    fn oauth2_error_is_surfaced() {
        let http = ScriptedHttp::default();
        http.respond_json(400, json!({ "error": "invalid_grant" }));
        let clock = TestClock::default();
        let mut provider = provider(direct(), &http, &clock);

        let err = provider.token().unwrap_err();
        assert_eq!(
            err.token_endpoint_error(),
            Some(&TokenEndpointError::new("invalid_grant"))
        );
    }

    #[test]
    fn oauth2_error_keeps_all_fields() {
        let http = ScriptedHttp::default();
        http.respond_json(
            400,
            json!({
                "error": "invalid_grant",
                "error_description": "Token is not active",
                "error_uri": "https://example.com/errors/invalid_grant",
            }),
        );
        let clock = TestClock::default();
        let mut provider = provider(direct(), &http, &clock);

        match provider.token() {
            Err(Error::TokenEndpoint(err)) => {
                assert_eq!(
                    err,
                    TokenEndpointError::new("invalid_grant")
                        .with_description("Token is not active")
                        .with_uri("https://example.com/errors/invalid_grant")
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn other_failures_are_http_status_errors() {
        let http = ScriptedHttp::default();
        http.respond_json(401, json!({ "error": "invalid_client" }));
        http.respond_json(400, json!({ "message": "bad" }));
        let clock = TestClock::default();
        let mut provider = provider(direct(), &http, &clock);

        assert!(matches!(
            provider.token(),
            Err(Error::HttpStatus { status: http::StatusCode::UNAUTHORIZED, .. })
        ));
        assert!(matches!(
            provider.token(),
            Err(Error::HttpStatus { status: http::StatusCode::BAD_REQUEST, .. })
        ));
    }

    #[test]
    fn transport_failure_is_not_retried() {
        let http = ScriptedHttp::default();
        http.fail("connection refused");
        let clock = TestClock::default();
        let mut provider = provider(direct(), &http, &clock);

        assert!(matches!(provider.token(), Err(Error::Transport(_))));
        assert_eq!(http.requests().len(), 1);
    }

    #[test]
    fn failed_discovery_is_reported_and_retried_on_next_call() {
        let http = ScriptedHttp::default();
        http.respond_json(500, json!({}));
        http.respond_json(200, json!({ "issuer": ISSUER_URL }));
        http.fail("connection reset");
        let clock = TestClock::default();
        let mut provider = provider(
            ProviderBuilder::new("rt", CLIENT_ID).issuer_url(ISSUER_URL),
            &http,
            &clock,
        );

        assert!(matches!(
            provider.token(),
            Err(Error::DiscoveryFailed(DiscoveryError::HttpStatus(_)))
        ));
        assert!(matches!(
            provider.token(),
            Err(Error::DiscoveryFailed(DiscoveryError::MissingTokenEndpoint))
        ));
        assert!(matches!(
            provider.token(),
            Err(Error::DiscoveryFailed(DiscoveryError::Transport(_)))
        ));
        assert!(http
            .requests()
            .iter()
            .all(|r| r.method == http::Method::GET));
    }

    #[test]
    fn with_scope_restarts_from_original_refresh_token() {
        let http = ScriptedHttp::default();
        http.respond_json(200, json!({ "token_endpoint": TOKEN_ENDPOINT_URL }));
        http.respond_json(
            200,
            json!({ "access_token": "at", "expires_in": 3600, "refresh_token": "rotated" }),
        );
        http.respond_json(200, json!({ "access_token": "scoped", "expires_in": 3600 }));
        let clock = TestClock::default();
        let mut original = provider(
            ProviderBuilder::new("input_refresh_token", CLIENT_ID)
                .issuer_url(ISSUER_URL)
                .scope("original"),
            &http,
            &clock,
        );
        original.token().unwrap();

        let mut scoped = original.with_scope("x");
        assert_eq!(scoped.config().scope().map(|s| s.as_str()), Some("x"));
        assert!(scoped.container().refresh_required());
        assert_eq!(
            scoped.token_endpoint().map(Url::as_str),
            Some(TOKEN_ENDPOINT_URL)
        );
        assert_eq!(scoped.bearer_token().unwrap(), "scoped");

        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].field("scope"), Some("x"));
        assert_eq!(requests[2].field("refresh_token"), Some("input_refresh_token"));

        assert_eq!(original.bearer_token().unwrap(), "at");
        assert_eq!(http.requests().len(), 3);
    }

    #[test]
    fn with_scope_before_discovery_keeps_issuer() {
        let http = ScriptedHttp::default();
        let clock = TestClock::default();
        let original = provider(
            ProviderBuilder::new("rt", CLIENT_ID).issuer_url(ISSUER_URL),
            &http,
            &clock,
        );

        let scoped = original.with_scope("x");
        assert!(scoped.token_endpoint().is_none());
        assert_eq!(
            scoped.config().issuer_url().map(Url::as_str),
            Some(ISSUER_URL)
        );
    }

    #[tokio::test]
    async fn as_async_keeps_scope_with_fresh_state() {
        let http = ScriptedHttp::default();
        http.respond_json(200, json!({ "access_token": "at", "refresh_token": "rotated" }));
        http.respond_json(200, json!({ "access_token": "async_at" }));
        let clock = TestClock::default();
        let mut blocking = provider(direct().scope("s"), &http, &clock);
        blocking.token().unwrap();

        let mut async_provider = blocking.as_async_with(http.clone());
        assert_eq!(async_provider.config().scope().map(|s| s.as_str()), Some("s"));
        assert_eq!(async_provider.bearer_token().await.unwrap(), "async_at");

        let requests = http.requests();
        assert_eq!(requests[1].field("refresh_token"), Some("input_refresh_token"));
        assert_eq!(requests[1].field("scope"), Some("s"));
    }
}
