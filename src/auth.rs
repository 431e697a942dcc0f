// Cognito JWT validation against the user pool's JWKS endpoint.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("region and user pool id are required")]
    MissingPoolConfig,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),
    #[error("token missing subject")]
    MissingSubject,
    #[error("failed to fetch jwks: {0}")]
    Jwks(String),
}

/// Claims extracted from a validated token. The subject is the player id.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
}

#[derive(Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

/// Validates Cognito RS256 JWTs using the pool's JWKS document. Keys are
/// cached by `kid`; an unknown kid triggers a refetch once the cache is
/// older than the refresh interval.
pub struct Validator {
    issuer: String,
    audience: Option<String>,
    jwks_url: String,
    client: reqwest::Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Instant>,
    refresh_every: Duration,
}

impl Validator {
    /// Build a validator and fetch the initial key set.
    pub async fn new(region: &str, user_pool_id: &str, audience: &str) -> Result<Self, AuthError> {
        if region.is_empty() || user_pool_id.is_empty() {
            return Err(AuthError::MissingPoolConfig);
        }

        let issuer = format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}");
        let jwks_url = format!("{issuer}/.well-known/jwks.json");

        let validator = Validator {
            issuer,
            audience: if audience.is_empty() {
                None
            } else {
                Some(audience.to_string())
            },
            jwks_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| AuthError::Jwks(e.to_string()))?,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(Instant::now()),
            refresh_every: Duration::from_secs(3600),
        };

        validator.refresh_keys().await?;

        Ok(validator)
    }

    /// Validate a token and return its claims. Checks signature, expiry,
    /// issuer, and (when configured) audience.
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken("empty token".to_string()));
        }

        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("missing kid".to_string()))?;

        let key = self.key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(data.claims)
    }

    async fn key_for_kid(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let keys = self.keys.read().unwrap();
            if let Some(key) = keys.get(kid) {
                return Ok(key.clone());
            }
        }

        // The kid may belong to a rotated key; refetch if the cache is stale.
        let stale = self.last_refresh.read().unwrap().elapsed() > self.refresh_every;
        if stale {
            self.refresh_keys().await?;
        }

        let keys = self.keys.read().unwrap();
        keys.get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string()))
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::Jwks(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Jwks(format!("status {}", response.status())));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Jwks(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in body.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                .map_err(|e| AuthError::Jwks(e.to_string()))?;
            keys.insert(jwk.kid, key);
        }

        if keys.is_empty() {
            return Err(AuthError::Jwks("no valid keys found".to_string()));
        }

        *self.keys.write().unwrap() = keys;
        *self.last_refresh.write().unwrap() = Instant::now();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_validator() -> Validator {
        Validator {
            issuer: "https://cognito-idp.us-east-1.amazonaws.com/pool".to_string(),
            audience: None,
            jwks_url: "https://example.invalid/jwks.json".to_string(),
            client: reqwest::Client::new(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(Instant::now()),
            refresh_every: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let v = offline_validator();
        assert!(matches!(
            v.validate("").await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let v = offline_validator();
        assert!(matches!(
            v.validate("not.a.jwt").await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid_rejected_without_refetch() {
        // Well-formed RS256 header with an unknown kid; the cache is fresh,
        // so no network fetch is attempted and the kid is reported unknown.
        let v = offline_validator();
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Im1pc3NpbmcifQ.\
                     eyJzdWIiOiJwbGF5ZXItMSIsImV4cCI6NDEwMjQ0NDgwMH0.c2ln";
        match v.validate(token).await {
            Err(AuthError::UnknownKeyId(kid)) => assert_eq!(kid, "missing"),
            other => panic!("expected UnknownKeyId, got {other:?}"),
        }
    }

    #[test]
    fn test_jwks_parsing_skips_non_rsa() {
        let n = "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw";
        let json = format!(
            r#"{{"keys":[{{"kid":"a","kty":"EC","n":"","e":""}},{{"kid":"b","kty":"RSA","n":"{n}","e":"AQAB"}}]}}"#
        );
        let body: JwksResponse = serde_json::from_str(&json).unwrap();

        let mut keys = HashMap::new();
        for jwk in body.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            keys.insert(
                jwk.kid.clone(),
                DecodingKey::from_rsa_components(&jwk.n, &jwk.e).unwrap(),
            );
        }
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("b"));
    }

    #[tokio::test]
    async fn test_missing_pool_config() {
        assert!(matches!(
            Validator::new("", "", "").await,
            Err(AuthError::MissingPoolConfig)
        ));
    }
}
