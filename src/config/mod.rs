use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Every request acts as `dev_user_id`
    None,
    /// RS256/HS256 tokens verified against the issuer's JWKS
    Oauth,
    /// HS256 tokens signed with a shared secret
    Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub dev_user_id: String,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub secret: Option<SecretConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub issuer_url: String,
    pub audience: String,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "OAuthConfig::default_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    #[serde(default)]
    pub audience: Option<String>,
}

/// Cookies written by the session sync endpoint and read back by the identity layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address and ignore forwarding headers
    #[default]
    None,
    /// Trust `CF-Connecting-IP` and `CF-IPCountry`
    Cloudflare,
    /// Trust the rightmost `X-Forwarded-For` entry
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    pub geoip_country_db_path: Option<String>,
}

impl OAuthConfig {
    const fn default_cache_ttl_secs() -> u64 {
        300
    }
}

impl SessionConfig {
    pub const DEFAULT_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_cookie: "clicklens-access-token".to_string(),
            refresh_cookie: "clicklens-refresh-token".to_string(),
            secure: false,
            max_age_secs: Self::DEFAULT_MAX_AGE_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };

        let backend = match var("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = var("DATABASE_URL", "sqlite://./clicklens.db?mode=rwc");
        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = var("API_HOST", "127.0.0.1");
        let api_port = var("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a valid port")?;

        let redirect_host = var("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = var("REDIRECT_PORT", "3000")
            .parse::<u16>()
            .context("REDIRECT_PORT must be a valid port")?;

        let auth_mode = match var("AUTH_MODE", "none").to_lowercase().as_str() {
            "none" => AuthMode::None,
            "oauth" => AuthMode::Oauth,
            "secret" => AuthMode::Secret,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, oauth, secret"
                );
                AuthMode::None
            }
        };

        let oauth = if auth_mode == AuthMode::Oauth {
            let issuer_url = lookup("OAUTH_ISSUER_URL")
                .context("OAUTH_ISSUER_URL must be set when AUTH_MODE=oauth")?;
            let audience = lookup("OAUTH_AUDIENCE")
                .context("OAUTH_AUDIENCE must be set when AUTH_MODE=oauth")?;
            let jwks_cache_ttl_secs = lookup("OAUTH_JWKS_CACHE_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or_else(OAuthConfig::default_cache_ttl_secs);

            Some(OAuthConfig {
                issuer_url,
                audience,
                jwks_url: lookup("OAUTH_JWKS_URL"),
                jwks_cache_ttl_secs,
            })
        } else {
            None
        };

        let secret = if auth_mode == AuthMode::Secret {
            let jwt_secret = lookup("AUTH_JWT_SECRET")
                .context("AUTH_JWT_SECRET must be set when AUTH_MODE=secret")?;
            Some(SecretConfig {
                jwt_secret,
                audience: lookup("AUTH_JWT_AUDIENCE"),
            })
        } else {
            None
        };

        let session_defaults = SessionConfig::default();
        let session = SessionConfig {
            access_cookie: lookup("SESSION_ACCESS_COOKIE").unwrap_or(session_defaults.access_cookie),
            refresh_cookie: lookup("SESSION_REFRESH_COOKIE")
                .unwrap_or(session_defaults.refresh_cookie),
            secure: flag("SESSION_COOKIE_SECURE"),
            max_age_secs: lookup("SESSION_MAX_AGE_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(session_defaults.max_age_secs),
        };

        let cache = CacheConfig {
            max_entries: lookup("CACHE_MAX_ENTRIES")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000),
            ttl_secs: lookup("CACHE_TTL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(300),
        };

        let trusted_proxy_mode = match var("TRUSTED_PROXY_MODE", "none").to_lowercase().as_str() {
            "none" => TrustedProxyMode::None,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "standard" => TrustedProxyMode::Standard,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, cloudflare, standard"
                );
                TrustedProxyMode::None
            }
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            auth: AuthConfig {
                mode: auth_mode,
                dev_user_id: var("DEV_USER_ID", "local-dev"),
                oauth,
                secret,
            },
            session,
            cache,
            tracking: TrackingConfig {
                trusted_proxy_mode,
                geoip_country_db_path: lookup("GEOIP_COUNTRY_DB_PATH"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.api_server.port, 8080);
        assert_eq!(config.redirect_server.port, 3000);
        assert_eq!(config.auth.mode, AuthMode::None);
        assert_eq!(config.auth.dev_user_id, "local-dev");
        assert_eq!(config.session.max_age_secs, 604_800);
        assert!(!config.session.secure);
        assert_eq!(config.tracking.trusted_proxy_mode, TrustedProxyMode::None);
    }

    #[test]
    fn postgres_aliases_are_accepted() {
        let config = config_from(&[("DATABASE_BACKEND", "PostgreSQL")]).unwrap();
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
    }

    #[test]
    fn secret_mode_requires_a_secret() {
        assert!(config_from(&[("AUTH_MODE", "secret")]).is_err());

        let config = config_from(&[("AUTH_MODE", "secret"), ("AUTH_JWT_SECRET", "s3cr3t")]).unwrap();
        assert_eq!(config.auth.mode, AuthMode::Secret);
        assert_eq!(config.auth.secret.unwrap().jwt_secret, "s3cr3t");
    }

    #[test]
    fn oauth_mode_requires_issuer_and_audience() {
        assert!(config_from(&[("AUTH_MODE", "oauth")]).is_err());

        let config = config_from(&[
            ("AUTH_MODE", "oauth"),
            ("OAUTH_ISSUER_URL", "https://issuer.example"),
            ("OAUTH_AUDIENCE", "clicklens"),
        ])
        .unwrap();
        let oauth = config.auth.oauth.unwrap();
        assert_eq!(oauth.jwks_cache_ttl_secs, 300);
        assert!(oauth.jwks_url.is_none());
    }

    #[test]
    fn unknown_modes_fall_back_to_none() {
        let config = config_from(&[("AUTH_MODE", "ldap"), ("TRUSTED_PROXY_MODE", "nginx")]).unwrap();
        assert_eq!(config.auth.mode, AuthMode::None);
        assert_eq!(config.tracking.trusted_proxy_mode, TrustedProxyMode::None);
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert!(config_from(&[("API_PORT", "not-a-port")]).is_err());
    }
}
