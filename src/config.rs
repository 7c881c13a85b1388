use std::env;
use std::str::FromStr;
use std::time::Duration;

use rand::distributions::{Alphanumeric, DistString};
use thiserror::Error;

use crate::utils::geo::Coordinate;
use crate::utils::pricing::PricingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must not be negative")]
    Negative { key: &'static str },

    #[error("{key} must be set when {reason}")]
    Missing {
        key: &'static str,
        reason: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    /// Unset means tokens never expire
    pub jwt_expiration_hours: Option<i64>,
    /// When off, gated actions run without a login
    pub access_gate_enabled: bool,
    pub admin_email: Option<String>,
    pub admin_password_hash: Option<String>,
    pub admin_password: Option<String>,
    pub ors_api_key: Option<String>,
    pub ors_base_url: String,
    pub nominatim_base_url: String,
    pub http_timeout: Duration,
    /// Sessions untouched for this long are dropped
    pub session_idle_ttl: Duration,
    pub whatsapp_number: String,
    /// Trip origin when the device cannot report its position
    pub default_origin: Coordinate,
    pub pricing: PricingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_gate_enabled = parse_or(&lookup, "ACCESS_GATE_ENABLED", false)?;

        // tokens are only checked while the gate is on
        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if access_gate_enabled => {
                return Err(ConfigError::Missing {
                    key: "JWT_SECRET",
                    reason: "ACCESS_GATE_ENABLED is true",
                });
            }
            None => Alphanumeric.sample_string(&mut rand::thread_rng(), 48),
        };

        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            base_fare: non_negative(&lookup, "BASE_FARE", defaults.base_fare)?,
            included_km: non_negative(&lookup, "INCLUDED_KM", defaults.included_km)?,
            per_km_rate: non_negative(&lookup, "PER_KM_RATE", defaults.per_km_rate)?,
            emergency: non_negative(&lookup, "SURCHARGE_EMERGENCY", defaults.emergency)?,
            weekend: non_negative(&lookup, "SURCHARGE_WEEKEND", defaults.weekend)?,
            carrier_box: non_negative(&lookup, "SURCHARGE_CARRIER_BOX", defaults.carrier_box)?,
            large_animal: non_negative(&lookup, "SURCHARGE_LARGE_ANIMAL", defaults.large_animal)?,
        };

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            jwt_secret,
            jwt_expiration_hours: parse_opt(&lookup, "JWT_EXPIRATION_HOURS")?,
            access_gate_enabled,
            admin_email: lookup("ADMIN_EMAIL"),
            admin_password_hash: lookup("ADMIN_PASSWORD_HASH"),
            admin_password: lookup("ADMIN_PASSWORD"),
            ors_api_key: lookup("ORS_API_KEY").filter(|k| !k.is_empty()),
            ors_base_url: lookup("ORS_BASE_URL")
                .unwrap_or_else(|| "https://api.openrouteservice.org".to_string()),
            nominatim_base_url: lookup("NOMINATIM_BASE_URL")
                .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 15)?),
            session_idle_ttl: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_IDLE_TTL_SECS",
                30 * 60,
            )?),
            whatsapp_number: lookup("WHATSAPP_NUMBER")
                .unwrap_or_else(|| "5527996338749".to_string()),
            default_origin: Coordinate::new(
                parse_or(&lookup, "DEFAULT_ORIGIN_LAT", -20.2976)?,
                parse_or(&lookup, "DEFAULT_ORIGIN_LNG", -40.2958)?,
            ),
            pricing,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

fn non_negative<F>(lookup: &F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: f64 = parse_or(lookup, key, default)?;
    if value < 0.0 || !value.is_finite() {
        return Err(ConfigError::Negative { key });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_published_fares() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
        assert!(!config.access_gate_enabled);
        assert_eq!(config.default_origin, Coordinate::new(-20.2976, -40.2958));
        assert_eq!(config.whatsapp_number, "5527996338749");
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.ors_api_key.is_none());
        assert!(!config.jwt_secret.is_empty());
        assert_eq!(config.jwt_expiration_hours, None);
        assert_eq!(config.session_idle_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("ACCESS_GATE_ENABLED", "true"),
            ("BASE_FARE", "30"),
            ("SURCHARGE_WEEKEND", "7.5"),
            ("SERVER_PORT", "8080"),
            ("JWT_SECRET", "s"),
            ("JWT_EXPIRATION_HOURS", "72"),
            ("SESSION_IDLE_TTL_SECS", "60"),
        ])
        .unwrap();

        assert!(config.access_gate_enabled);
        assert_eq!(config.pricing.base_fare, 30.0);
        assert_eq!(config.pricing.weekend, 7.5);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.jwt_secret, "s");
        assert_eq!(config.jwt_expiration_hours, Some(72));
        assert_eq!(config.session_idle_ttl, Duration::from_secs(60));
    }

    #[test]
    fn gate_without_secret_is_refused() {
        let err = config_from(&[("ACCESS_GATE_ENABLED", "true")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "JWT_SECRET", .. }));
    }

    #[test]
    fn tokens_survive_restart_with_configured_secret() {
        let pairs = [("ACCESS_GATE_ENABLED", "true"), ("JWT_SECRET", "stable")];
        let before = config_from(&pairs).unwrap();
        let after = config_from(&pairs).unwrap();

        let token = crate::utils::jwt::create_token(
            "admin@petride.com",
            &before.jwt_secret,
            before.jwt_expiration_hours,
        )
        .unwrap();
        assert!(crate::utils::jwt::verify_token(&token, &after.jwt_secret).is_ok());
    }

    #[test]
    fn unparseable_number_is_an_error() {
        let err = config_from(&[("PER_KM_RATE", "three")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PER_KM_RATE", .. }));
    }

    #[test]
    fn negative_fare_is_refused() {
        let err = config_from(&[("BASE_FARE", "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Negative { key: "BASE_FARE" }));
    }

    #[test]
    fn empty_api_key_counts_as_unset() {
        let config = config_from(&[("ORS_API_KEY", "")]).unwrap();
        assert!(config.ors_api_key.is_none());
    }
}
