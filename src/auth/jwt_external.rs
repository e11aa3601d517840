//! External auth mode: verify bearer tokens against a JWKS endpoint.
//!
//! Keys are fetched lazily and cached for `jwks_cache_ttl` (10 minutes
//! by default) so steady-state verification never round-trips to the
//! JWKS endpoint.

use crate::error::AppError;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub nbf: Option<usize>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

pub struct JwksVerifier {
    client: reqwest::Client,
    jwks_url: String,
    issuer: Option<String>,
    audience: Option<String>,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl JwksVerifier {
    pub fn new(
        client: reqwest::Client,
        jwks_url: String,
        issuer: Option<String>,
        audience: Option<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client,
            jwks_url,
            issuer,
            audience,
            cache_ttl,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let header = decode_header(token)
            .map_err(|e| AppError::InvalidToken(format!("malformed header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::InvalidToken("token missing kid".to_string()))?;

        let key = self.resolve_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        if let Some(aud) = &self.audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AppError::InvalidToken(format!("signature/claims invalid: {e}")))?;
        Ok(data.claims)
    }

    async fn resolve_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        {
            let guard = self.cache.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        self.refresh().await?;

        let guard = self.cache.read().await;
        guard
            .as_ref()
            .and_then(|c| c.keys.get(kid))
            .cloned()
            .ok_or_else(|| AppError::InvalidToken(format!("unknown key id: {kid}")))
    }

    async fn refresh(&self) -> Result<(), AppError> {
        let jwk_set: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("JWKS decode failed: {e}")))?;

        let mut keys = HashMap::new();
        for jwk in jwk_set.keys {
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                .map_err(|e| AppError::Internal(format!("invalid JWK: {e}")))?;
            keys.insert(jwk.kid, key);
        }

        let mut guard = self.cache.write().await;
        *guard = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_default_nbf_is_none() {
        let json = r#"{"sub":"u1","exp":9999999999}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert!(claims.nbf.is_none());
        assert_eq!(claims.sub, "u1");
    }
}
