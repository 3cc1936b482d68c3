//! Access tokens on demand from an OAuth2 refresh token
//!
//! This library keeps an application supplied with a valid access token
//! given a long-lived refresh token. The current access token is cached
//! locally and the refresh token grant is only performed when the cached
//! token is missing or about to expire. Refresh tokens rotated by the
//! authority are adopted transparently.
//!
//! The token endpoint can either be configured directly or discovered from
//! the issuer's OpenID configuration document on first use.
//!
//! Refreshes happen lazily, inside calls to `token()`. There is no
//! background task and no internal lock; a provider shared between threads
//! or tasks should be wrapped in a mutex by the caller.
//!
//! # Blocking usage
//!
//! ```no_run
//! use authn_tokens::{ProviderBuilder, TokenProvider};
//!
//! let config = ProviderBuilder::new("my-refresh-token", "my-client")
//!     .issuer_url("https://auth.example.com/realms/main")
//!     .build()?;
//!
//! let mut provider = TokenProvider::new(config)?;
//! let token = provider.token()?;
//! println!("{}", token.authorization_header());
//! # Ok::<(), authn_tokens::Error>(())
//! ```
//!
//! # Asynchronous usage
//!
//! ```no_run
//! use authn_tokens::{AsyncTokenProvider, ProviderBuilder};
//!
//! # async fn run() -> Result<(), authn_tokens::Error> {
//! let config = ProviderBuilder::new("my-refresh-token", "my-client")
//!     .token_endpoint_url("https://auth.example.com/oauth/token")
//!     .scope("openid offline_access")
//!     .build()?;
//!
//! let mut provider = AsyncTokenProvider::new(config)?;
//! let bearer = provider.bearer_token().await?;
//! # drop(bearer);
//! # Ok(())
//! # }
//! ```
//!
//! Providers of either flavor can derive providers of the other flavor, or
//! for a different scope, with independent token state. See
//! [`TokenProvider::as_async_with`], [`AsyncTokenProvider::as_blocking_with`]
//! and `with_scope` on both.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod container;
pub mod discovery;
pub mod error;
pub mod provider;
mod tokens;
pub mod transport;

pub use braids::*;
pub use container::TokenContainer;
pub use error::{Error, TokenEndpointError};
pub use provider::{AsyncTokenProvider, ProviderBuilder, ProviderConfig, TokenProvider};
pub use tokens::{Token, TokenLifetimeConfig, TokenStatus};
