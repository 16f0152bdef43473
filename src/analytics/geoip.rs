//! Country lookup using a MaxMind GeoLite2/GeoIP2 MMDB
//!
//! The database is memory-mapped once and shared between request tasks.

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use crate::analytics::ip_extractor::{edge_country, extract_client_ip};
use crate::config::{TrackingConfig, TrustedProxyMode};

/// GeoIP country lookup service; a service without a database resolves nothing
#[derive(Clone, Default)]
pub struct GeoIpService {
    country_reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoIpService {
    /// Open the country (or city) database at `path`, if one is configured
    pub fn new(path: Option<&str>) -> Result<Self> {
        let country_reader = match path {
            Some(path) => {
                let reader = unsafe { Reader::open_mmap(path) }
                    .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
                Some(Arc::new(reader))
            }
            None => None,
        };

        Ok(Self { country_reader })
    }

    pub fn is_enabled(&self) -> bool {
        self.country_reader.is_some()
    }

    /// ISO country code for `ip`, if the database knows it
    pub fn lookup_country(&self, ip: IpAddr) -> Option<String> {
        let reader = self.country_reader.as_ref()?;
        let result = reader.lookup(ip).ok()?;

        // geoip2::Country decodes from both Country and City databases.
        match result.decode::<geoip2::Country>() {
            Ok(Some(country)) => country.country.iso_code.map(|s| s.to_string()),
            _ => None,
        }
    }
}

/// Resolves the country of a click from the edge header or the GeoIP database
#[derive(Clone, Default)]
pub struct CountryResolver {
    geoip: GeoIpService,
    proxy_mode: TrustedProxyMode,
}

impl CountryResolver {
    pub fn new(geoip: GeoIpService, proxy_mode: TrustedProxyMode) -> Self {
        Self { geoip, proxy_mode }
    }

    pub fn from_config(config: &TrackingConfig) -> Result<Self> {
        let geoip = GeoIpService::new(config.geoip_country_db_path.as_deref())?;
        Ok(Self::new(geoip, config.trusted_proxy_mode))
    }

    pub fn resolve(&self, headers: &HeaderMap, socket_ip: IpAddr) -> Option<String> {
        if let Some(code) = edge_country(headers, self.proxy_mode) {
            return Some(code);
        }

        if !self.geoip.is_enabled() {
            return None;
        }

        let client_ip = extract_client_ip(headers, socket_ip, self.proxy_mode);
        self.geoip.lookup_country(client_ip)
    }
}
