//! DTOs for interacting with the issuer's discovery and token endpoints

use serde::{Deserialize, Serialize, Serializer};

use crate::{AccessToken, ClientIdRef, ClientSecretRef, RefreshToken, RefreshTokenRef, Scope, ScopeRef};

/// The form body of a refresh token grant
#[derive(Debug)]
pub(crate) struct RefreshTokenRequest<'a> {
    pub client_id: &'a ClientIdRef,
    pub client_secret: Option<&'a ClientSecretRef>,
    pub refresh_token: &'a RefreshTokenRef,
    pub scope: Option<&'a ScopeRef>,
}

impl RefreshTokenRequest<'_> {
    pub const GRANT_TYPE: &'static str = "refresh_token";
}

impl Serialize for RefreshTokenRequest<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("RefreshTokenRequest", 5)?;
        ser.serialize_field("grant_type", Self::GRANT_TYPE)?;
        ser.serialize_field("client_id", self.client_id)?;
        ser.serialize_field("refresh_token", self.refresh_token)?;
        match self.client_secret.filter(|s| !s.as_str().is_empty()) {
            Some(secret) => ser.serialize_field("client_secret", secret)?,
            None => ser.skip_field("client_secret")?,
        }
        match self.scope.filter(|s| !s.as_str().is_empty()) {
            Some(scope) => ser.serialize_field("scope", scope)?,
            None => ser.skip_field("scope")?,
        }
        ser.end()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub scope: Option<Scope>,
}

/// Accepts any JSON number of seconds, truncating fractions
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct ExpiresInVisitor;

    impl<'de> serde::de::Visitor<'de> for ExpiresInVisitor {
        type Value = Option<i64>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a number of seconds")
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(i64::try_from(v).unwrap_or(i64::MAX)))
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
            // saturating
            Ok(Some(v.trunc() as i64))
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }
    }

    deserializer.deserialize_any(ExpiresInVisitor)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DiscoveryDocument {
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
}
