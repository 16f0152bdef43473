//! HS256 access tokens signed with a shared secret, as issued by hosted
//! auth providers that hand out a project JWT secret.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

use crate::config::SecretConfig;

#[derive(Clone)]
pub struct SecretValidator {
    key: DecodingKey,
    validation: Validation,
}

impl SecretValidator {
    pub fn from_config(config: &SecretConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<Value> {
        let data = decode::<Value>(token, &self.key, &self.validation)
            .context("token failed signature or structural validation")?;
        Ok(data.claims)
    }
}
