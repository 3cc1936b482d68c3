//! Errors raised while configuring providers or obtaining tokens

use std::{error, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A boxed error raised by an HTTP transport
pub type TransportError = Box<dyn error::Error + Send + Sync + 'static>;

/// An error while obtaining an access token
#[derive(Debug, Error)]
pub enum Error {
    /// The provider was configured incorrectly
    #[error("invalid provider configuration")]
    InvalidConfiguration(#[from] ConfigError),
    /// The token endpoint could not be resolved from the issuer
    #[error("unable to discover token endpoint")]
    DiscoveryFailed(#[from] DiscoveryError),
    /// The token endpoint rejected the exchange with an OAuth2 error
    #[error("token endpoint returned an error: {0}")]
    TokenEndpoint(#[from] TokenEndpointError),
    /// The token endpoint responded with an unexpected HTTP status
    #[error("token endpoint responded with HTTP status {status}")]
    HttpStatus {
        /// The response status
        status: http::StatusCode,
        /// The response body, lossily decoded
        body: String,
    },
    /// Unable to send a token request or read its response
    #[error("error sending request to token endpoint")]
    Transport(#[source] TransportError),
    /// A successful response did not carry a usable token body
    #[error("error deserializing token body from token endpoint")]
    InvalidTokenResponse(#[source] serde_json::Error),
    /// An access token was requested before any exchange succeeded
    #[error("access token not initialized yet")]
    NotInitialized,
}

impl Error {
    /// Whether the error is an OAuth2 protocol error from the token endpoint
    ///
    /// These usually call for re-authentication rather than a retry.
    #[inline]
    pub fn is_token_endpoint_error(&self) -> bool {
        matches!(self, Error::TokenEndpoint(_))
    }

    /// Gets the OAuth2 error returned by the token endpoint, if that is what this is
    #[inline]
    pub fn token_endpoint_error(&self) -> Option<&TokenEndpointError> {
        match self {
            Error::TokenEndpoint(err) => Some(err),
            _ => None,
        }
    }
}

/// A problem with provider configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Both an issuer URL and a token endpoint URL were given
    #[error("issuer URL and token endpoint URL are mutually exclusive; set only one")]
    ConflictingEndpoints,
    /// Neither an issuer URL nor a token endpoint URL was given
    #[error("either an issuer URL or a token endpoint URL is required")]
    MissingEndpoint,
    /// A configured URL could not be parsed
    #[error("invalid {name} URL")]
    InvalidUrl {
        /// Which URL was invalid
        name: &'static str,
        /// The parse failure
        #[source]
        source: url::ParseError,
    },
    /// The discovery document does not describe the requested client
    #[error("client `{0}` is not present in the discovery document")]
    UnknownClient(String),
    /// The discovery document has no refresh token for the requested client
    #[error("no credentials for client `{0}` in the discovery document")]
    MissingCredentials(String),
    /// The discovery document does not describe the requested service
    #[error("service `{0}` is not present in the discovery document")]
    UnknownService(String),
    /// The HTTP client could not be built from the configuration
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    #[error("unable to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// An error while resolving the token endpoint through OIDC discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Unable to send the discovery request or read its response
    #[error("error requesting discovery document")]
    Transport(#[source] TransportError),
    /// The issuer answered with a non-success status
    #[error("discovery endpoint responded with HTTP status {0}")]
    HttpStatus(http::StatusCode),
    /// The discovery document could not be parsed
    #[error("error deserializing discovery document")]
    Body(#[source] serde_json::Error),
    /// The document did not name a token endpoint
    #[error("discovery document has no token_endpoint")]
    MissingTokenEndpoint,
    /// The advertised token endpoint is not a valid URL
    #[error("discovery document has an invalid token_endpoint")]
    InvalidTokenEndpoint(#[source] url::ParseError),
}

/// An OAuth2 error response from the token endpoint
///
/// Rendered as `error[: error_description][ (error_uri)]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEndpointError {
    /// The OAuth2 error code, such as `invalid_grant`
    pub error: String,
    /// A human-readable description of the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// A link to a page describing the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl TokenEndpointError {
    /// Constructs an error with only an error code
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
            error_uri: None,
        }
    }

    /// Adds a description to the error
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// Adds a URI to the error
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.error_uri = Some(uri.into());
        self
    }
}

impl fmt::Display for TokenEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.error)?;
        if let Some(description) = self.error_description.as_deref().filter(|d| !d.is_empty()) {
            write!(f, ": {}", description)?;
        }
        if let Some(uri) = self.error_uri.as_deref().filter(|u| !u.is_empty()) {
            write!(f, " ({})", uri)?;
        }
        Ok(())
    }
}

impl error::Error for TokenEndpointError {}
