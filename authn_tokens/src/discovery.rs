//! Building providers from a platform discovery document
//!
//! A discovery document describes an environment: its issuer, the OAuth2
//! clients registered in it, the refresh tokens held for those clients,
//! and the scopes of the services it hosts. Loading the document is left
//! to the caller; any serde format works.
//!
//! ```
//! use authn_tokens::discovery::{Discovery, DEFAULT_CLIENT};
//!
//! let discovery: Discovery = serde_json::from_str(r#"{
//!     "environment": { "issuer_url": "https://auth.example.com/realms/main" },
//!     "clients": { "platform": { "oauth2_client_id": "platform-client" } },
//!     "credentials": { "platform": { "refresh_token": "rt" } },
//!     "services": { "storage": { "oauth2_scope": "openid storage" } }
//! }"#)?;
//!
//! let config = discovery
//!     .provider_builder_for_service(DEFAULT_CLIENT, "storage")?
//!     .build()?;
//!
//! assert_eq!(config.scope().map(|s| s.as_str()), Some("openid storage"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::{error::ConfigError, ClientId, Error, ProviderBuilder, RefreshToken, Scope};

/// The client used when none is named
pub const DEFAULT_CLIENT: &str = "platform";

/// A pre-resolved discovery document
#[derive(Clone, Debug, Deserialize)]
pub struct Discovery {
    /// The environment being described
    pub environment: Environment,

    /// Registered clients, by name
    #[serde(default)]
    pub clients: HashMap<String, Client>,

    /// Credentials held for clients, by client name
    #[serde(default)]
    pub credentials: HashMap<String, Credentials>,

    /// Services available in the environment, by name
    #[serde(default)]
    pub services: HashMap<String, Service>,
}

/// Environment-wide settings
#[derive(Clone, Debug, Deserialize)]
pub struct Environment {
    /// The OpenID issuer for the environment
    pub issuer_url: String,
}

/// An OAuth2 client registered in the environment
#[derive(Clone, Debug, Deserialize)]
pub struct Client {
    /// The client ID presented to the token endpoint
    pub oauth2_client_id: ClientId,

    /// A human-readable name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Credentials held for a client
#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    /// The refresh token issued to the client
    pub refresh_token: RefreshToken,
}

/// A service hosted in the environment
#[derive(Clone, Debug, Deserialize)]
pub struct Service {
    /// The scope to request for tokens used with this service
    pub oauth2_scope: Scope,

    /// A human-readable name
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Discovery {
    /// Starts a provider configuration for the named client
    ///
    /// The builder is preset with the client's ID, its refresh token, and
    /// the environment's issuer URL.
    pub fn provider_builder(&self, client: &str) -> Result<ProviderBuilder, Error> {
        let client_id = self
            .clients
            .get(client)
            .map(|c| c.oauth2_client_id.clone())
            .ok_or_else(|| ConfigError::UnknownClient(client.to_owned()))?;
        let refresh_token = self
            .credentials
            .get(client)
            .map(|c| c.refresh_token.clone())
            .ok_or_else(|| ConfigError::MissingCredentials(client.to_owned()))?;

        Ok(ProviderBuilder::new(refresh_token, client_id).issuer_url(&self.environment.issuer_url))
    }

    /// Starts a provider configuration for the named client, requesting the
    /// scope of the named service
    ///
    /// A scope set later on the returned builder takes precedence.
    pub fn provider_builder_for_service(
        &self,
        client: &str,
        service: &str,
    ) -> Result<ProviderBuilder, Error> {
        let scope = self
            .services
            .get(service)
            .map(|s| s.oauth2_scope.clone())
            .ok_or_else(|| ConfigError::UnknownService(service.to_owned()))?;

        Ok(self.provider_builder(client)?.scope(scope))
    }
}
