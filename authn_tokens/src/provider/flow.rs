//! The refresh logic shared by blocking and asynchronous providers
//!
//! The flow never performs I/O. It produces the requests that need to be
//! sent and consumes the responses, leaving the actual transport to the
//! provider driving it.

use authn_clock::{Clock, System};
use http::{header, Method, StatusCode};
use url::Url;

use super::{dto, ProviderConfig, TokenEndpoint};
use crate::{
    error::{DiscoveryError, Error, TokenEndpointError},
    transport::{HttpRequest, HttpResponse},
    Scope, Token, TokenContainer,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";
const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

#[derive(Debug)]
pub(super) struct RefreshFlow<C = System> {
    config: ProviderConfig<C>,
    endpoint: TokenEndpoint,
    container: TokenContainer<C>,
}

impl<C: Clone> RefreshFlow<C> {
    pub fn new(config: ProviderConfig<C>) -> Self {
        let container = TokenContainer::new(config.refresh_token.clone(), config.lifetime.clone());
        Self {
            endpoint: config.endpoint.clone(),
            config,
            container,
        }
    }

    /// Configuration for a provider derived from this one
    ///
    /// The derived provider starts again from the original refresh token,
    /// but keeps any token endpoint that has already been resolved.
    pub fn derive(&self, scope: Option<Scope>) -> ProviderConfig<C> {
        let mut config = self.config.clone();
        config.endpoint = self.endpoint.clone();
        if let Some(scope) = scope.filter(|s| !s.as_str().is_empty()) {
            config.scope = Some(scope);
        }
        config
    }
}

impl<C> RefreshFlow<C> {
    pub fn config(&self) -> &ProviderConfig<C> {
        &self.config
    }

    pub fn container(&self) -> &TokenContainer<C> {
        &self.container
    }

    pub fn token_url(&self) -> Option<&Url> {
        match &self.endpoint {
            TokenEndpoint::Resolved(url) => Some(url),
            TokenEndpoint::Unresolved { .. } => None,
        }
    }

    pub fn token(&self) -> Result<&Token, Error> {
        self.container.access_token()
    }

    /// The discovery request to send, if the token endpoint is still unknown
    pub fn discovery_request(&self) -> Result<Option<HttpRequest>, DiscoveryError> {
        let issuer_url = match &self.endpoint {
            TokenEndpoint::Resolved(_) => return Ok(None),
            TokenEndpoint::Unresolved { issuer_url } => issuer_url,
        };

        let uri = discovery_url(issuer_url);
        tracing::debug!(discovery_url = %uri, "requesting discovery document");

        let request = http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, JSON_CONTENT_TYPE)
            .body(Vec::new())
            .map_err(|e| DiscoveryError::Transport(e.into()))?;

        Ok(Some(request))
    }

    /// Resolves the token endpoint from the discovery response
    ///
    /// Once resolved, the endpoint is kept for the lifetime of the flow.
    pub fn resolve_endpoint(&mut self, response: HttpResponse) -> Result<(), DiscoveryError> {
        let status = response.status();
        tracing::debug!(
            response.status = status.as_u16(),
            "received discovery response from issuer"
        );

        if !status.is_success() {
            return Err(DiscoveryError::HttpStatus(status));
        }

        let document: dto::DiscoveryDocument =
            serde_json::from_slice(response.body()).map_err(DiscoveryError::Body)?;
        let token_endpoint = document
            .token_endpoint
            .filter(|e| !e.is_empty())
            .ok_or(DiscoveryError::MissingTokenEndpoint)?;
        let url = Url::parse(&token_endpoint).map_err(DiscoveryError::InvalidTokenEndpoint)?;

        tracing::debug!(
            issuer = maybe_value(&document.issuer.as_deref()),
            token_url = %url,
            "resolved token endpoint"
        );

        self.endpoint = TokenEndpoint::Resolved(url);
        Ok(())
    }

    /// The refresh token grant request for the resolved token endpoint
    pub fn refresh_request(&self) -> Result<HttpRequest, Error> {
        let token_url = self
            .token_url()
            .ok_or(DiscoveryError::MissingTokenEndpoint)?;

        let payload = dto::RefreshTokenRequest {
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.as_deref(),
            refresh_token: self.container.refresh_token(),
            scope: self.config.scope.as_deref(),
        };
        let body =
            serde_urlencoded::to_string(&payload).map_err(|e| Error::Transport(e.into()))?;

        tracing::trace!(
            grant_type = dto::RefreshTokenRequest::GRANT_TYPE,
            "requesting token from authority"
        );

        http::Request::builder()
            .method(Method::POST)
            .uri(token_url.as_str())
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(header::ACCEPT, JSON_CONTENT_TYPE)
            .body(body.into_bytes())
            .map_err(|e| Error::Transport(e.into()))
    }
}

impl<C: Clock> RefreshFlow<C> {
    pub fn refresh_required(&self) -> bool {
        self.container.refresh_required()
    }

    /// Interprets the token endpoint's response and updates the container
    pub fn complete_refresh(&mut self, response: HttpResponse) -> Result<(), Error> {
        let status = response.status();
        tracing::debug!(
            response.status = status.as_u16(),
            "received token response from issuing authority"
        );

        if !status.is_success() {
            return Err(error_from_response(status, response.body()));
        }

        let resp: dto::TokenResponse =
            serde_json::from_slice(response.body()).map_err(Error::InvalidTokenResponse)?;

        let has_refresh_token = resp
            .refresh_token
            .as_ref()
            .is_some_and(|rt| !rt.as_str().is_empty());

        self.container
            .update_signed(resp.access_token, resp.expires_in, resp.refresh_token, resp.scope);

        tracing::info!(
            has_refresh_token,
            expires_in = maybe_value(&resp.expires_in),
            effective_expiry = maybe_value(&self.container.effective_expiry().map(|t| t.0)),
            "received new tokens"
        );

        if has_refresh_token {
            tracing::info!("received new refresh token");
        }

        Ok(())
    }
}

fn discovery_url(issuer_url: &Url) -> String {
    let mut uri = issuer_url.as_str().trim_end_matches('/').to_owned();
    uri.push_str(DISCOVERY_PATH);
    uri
}

fn error_from_response(status: StatusCode, body: &[u8]) -> Error {
    if status == StatusCode::BAD_REQUEST {
        if let Ok(err) = serde_json::from_slice::<TokenEndpointError>(body) {
            if !err.error.is_empty() {
                return Error::TokenEndpoint(err);
            }
        }
    }

    Error::HttpStatus {
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

pub(super) fn maybe_value<'a, T: tracing::Value + 'a>(v: &'a Option<T>) -> &'a dyn tracing::Value {
    if let Some(v) = v {
        v
    } else {
        &tracing::field::Empty
    }
}
