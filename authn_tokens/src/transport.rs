//! The HTTP capability used to talk to the issuer
//!
//! Providers do not depend on a particular HTTP stack. They build plain
//! [`http`] requests and hand them to an [`HttpClient`] (blocking) or an
//! [`AsyncHttpClient`] (suspending). With the `reqwest` and `blocking`
//! features enabled, `reqwest::Client` and `reqwest::blocking::Client`
//! implement these traits, and [`HttpConfig`] can build either one with the
//! configured timeout and TLS settings.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// An HTTP request as built by a provider
pub type HttpRequest = http::Request<Vec<u8>>;

/// An HTTP response as consumed by a provider
pub type HttpResponse = http::Response<Vec<u8>>;

/// A blocking HTTP client
///
/// Calls block the current thread until the response body has been read.
pub trait HttpClient {
    /// Sends the request and reads the full response
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// An asynchronous HTTP client
#[async_trait]
pub trait AsyncHttpClient: Send + Sync {
    /// Sends the request and reads the full response
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpClient + ?Sized> HttpClient for &T {
    #[inline]
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

#[async_trait]
impl<T: AsyncHttpClient + ?Sized> AsyncHttpClient for std::sync::Arc<T> {
    #[inline]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// Transport security settings
#[derive(Clone, Debug)]
pub struct TlsConfig {
    #[cfg(feature = "reqwest")]
    root_certificates: Vec<reqwest::Certificate>,
    built_in_roots: bool,
    accept_invalid_certs: bool,
}

impl Default for TlsConfig {
    /// Verifies certificates against the built-in root store
    fn default() -> Self {
        Self {
            #[cfg(feature = "reqwest")]
            root_certificates: Vec::new(),
            built_in_roots: true,
            accept_invalid_certs: false,
        }
    }
}

impl TlsConfig {
    /// Trusts an additional root certificate
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn with_root_certificate(mut self, certificate: reqwest::Certificate) -> Self {
        self.root_certificates.push(certificate);
        self
    }

    /// Controls whether the built-in root certificates are trusted
    pub fn with_built_in_roots(mut self, enabled: bool) -> Self {
        self.built_in_roots = enabled;
        self
    }

    /// Disables certificate verification entirely
    ///
    /// Only suitable for local development against self-signed issuers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Whether built-in root certificates are trusted
    #[inline]
    pub fn built_in_roots(&self) -> bool {
        self.built_in_roots
    }

    /// Whether certificate verification is disabled
    #[inline]
    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }
}

/// Settings applied to the HTTP clients a provider builds for itself
#[derive(Clone, Debug)]
pub struct HttpConfig {
    timeout: Duration,
    tls: TlsConfig,
}

impl Default for HttpConfig {
    /// A 5 second timeout with default TLS settings
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            tls: TlsConfig::default(),
        }
    }
}

impl HttpConfig {
    /// The default per-request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Sets the per-request timeout
    ///
    /// Applies to each request individually; there is no deadline spanning
    /// discovery and the token exchange together.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transport security settings
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// The per-request timeout
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The transport security settings
    #[inline]
    pub fn tls(&self) -> &TlsConfig {
        &self.tls
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::error::ConfigError;

    macro_rules! configure_builder {
        ($builder:expr, $config:expr) => {{
            let config: &HttpConfig = $config;
            let mut builder = $builder
                .user_agent(concat!("authn_tokens/", env!("CARGO_PKG_VERSION")))
                .timeout(config.timeout)
                .tls_built_in_root_certs(config.tls.built_in_roots)
                .danger_accept_invalid_certs(config.tls.accept_invalid_certs);
            for cert in &config.tls.root_certificates {
                builder = builder.add_root_certificate(cert.clone());
            }
            builder
        }};
    }

    impl HttpConfig {
        /// Builds an asynchronous reqwest client with these settings
        pub fn async_client(&self) -> Result<reqwest::Client, ConfigError> {
            configure_builder!(reqwest::Client::builder(), self)
                .build()
                .map_err(ConfigError::HttpClient)
        }

        /// Builds a blocking reqwest client with these settings
        ///
        /// Blocking clients must not be created or used from within an
        /// asynchronous runtime.
        #[cfg(feature = "blocking")]
        #[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
        pub fn blocking_client(&self) -> Result<reqwest::blocking::Client, ConfigError> {
            configure_builder!(reqwest::blocking::Client::builder(), self)
                .build()
                .map_err(ConfigError::HttpClient)
        }
    }

    fn into_response(
        status: http::StatusCode,
        headers: http::HeaderMap,
        body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError> {
        let mut response = http::Response::builder().status(status).body(body)?;
        *response.headers_mut() = headers;
        Ok(response)
    }

    #[async_trait]
    impl AsyncHttpClient for reqwest::Client {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let (parts, body) = request.into_parts();
            let resp = self
                .request(parts.method, parts.uri.to_string())
                .headers(parts.headers)
                .body(body)
                .send()
                .await?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes().await?;
            into_response(status, headers, body.to_vec())
        }
    }

    #[cfg(feature = "blocking")]
    #[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
    impl HttpClient for reqwest::blocking::Client {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let (parts, body) = request.into_parts();
            let resp = self
                .request(parts.method, parts.uri.to_string())
                .headers(parts.headers)
                .body(body)
                .send()?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes()?;
            into_response(status, headers, body.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.tls().built_in_roots());
        assert!(!config.tls().accepts_invalid_certs());
    }

    #[test]
    fn tls_settings_are_recorded() {
        let config = HttpConfig::default()
            .with_timeout(Duration::from_secs(1))
            .with_tls(
                TlsConfig::default()
                    .with_built_in_roots(false)
                    .danger_accept_invalid_certs(true),
            );
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert!(!config.tls().built_in_roots());
        assert!(config.tls().accepts_invalid_certs());
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn builds_async_client() {
        assert!(HttpConfig::default().async_client().is_ok());
    }
}
