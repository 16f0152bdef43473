//! Session cookies mirrored from the browser-side auth client.
//!
//! The client posts its auth state changes; the server keeps the access and
//! refresh tokens in HttpOnly cookies so server-side requests can identify
//! the caller.

use axum::http::{header, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

impl SessionEvent {
    pub fn parse(event: &str) -> Option<Self> {
        match event {
            "SIGNED_IN" => Some(SessionEvent::SignedIn),
            "TOKEN_REFRESHED" => Some(SessionEvent::TokenRefreshed),
            "SIGNED_OUT" => Some(SessionEvent::SignedOut),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionSyncRequest {
    pub event: String,
    #[serde(default)]
    pub session: Option<SessionTokens>,
}

/// `Set-Cookie` values storing both tokens
pub fn session_cookies(config: &SessionConfig, tokens: &SessionTokens) -> Vec<String> {
    vec![
        cookie(config, &config.access_cookie, &tokens.access_token, config.max_age_secs),
        cookie(config, &config.refresh_cookie, &tokens.refresh_token, config.max_age_secs),
    ]
}

/// `Set-Cookie` values expiring both tokens
pub fn clear_session_cookies(config: &SessionConfig) -> Vec<String> {
    vec![
        cookie(config, &config.access_cookie, "", 0),
        cookie(config, &config.refresh_cookie, "", 0),
    ]
}

fn cookie(config: &SessionConfig, name: &str, value: &str, max_age: u64) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Append `Set-Cookie` headers, skipping values that are not valid header text
pub fn append_cookies(headers: &mut HeaderMap, cookies: Vec<String>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!("Refusing to set cookie with invalid characters"),
        }
    }
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> SessionTokens {
        SessionTokens {
            access_token: "access-abc".to_string(),
            refresh_token: "refresh-def".to_string(),
        }
    }

    #[test]
    fn events_parse_from_client_names() {
        assert_eq!(SessionEvent::parse("SIGNED_IN"), Some(SessionEvent::SignedIn));
        assert_eq!(
            SessionEvent::parse("TOKEN_REFRESHED"),
            Some(SessionEvent::TokenRefreshed)
        );
        assert_eq!(SessionEvent::parse("SIGNED_OUT"), Some(SessionEvent::SignedOut));
        assert_eq!(SessionEvent::parse("USER_UPDATED"), None);
    }

    #[test]
    fn session_cookies_are_http_only_and_last_a_week() {
        let cookies = session_cookies(&SessionConfig::default(), &tokens());

        assert_eq!(
            cookies[0],
            "clicklens-access-token=access-abc; Path=/; Max-Age=604800; HttpOnly; SameSite=Lax"
        );
        assert!(cookies[1].starts_with("clicklens-refresh-token=refresh-def;"));
    }

    #[test]
    fn secure_flag_follows_config() {
        let config = SessionConfig {
            secure: true,
            ..SessionConfig::default()
        };

        assert!(session_cookies(&config, &tokens())
            .iter()
            .all(|c| c.ends_with("; Secure")));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        let cookies = clear_session_cookies(&SessionConfig::default());

        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("=; Path=/; Max-Age=0;")));
    }

    #[test]
    fn cookie_value_reads_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2; c=3"));

        assert_eq!(cookie_value(&headers, "c").as_deref(), Some("3"));
        assert!(cookie_value(&headers, "d").is_none());
    }
}
