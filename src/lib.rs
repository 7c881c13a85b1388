pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod session;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use services::{
    ConfiguredCredentials, CredentialVerifier, NoCredentials, NominatimGeocoder, OrsRouteProvider,
    ReverseGeocoder, RouteProvider, RouteResolver,
};
use session::SessionStore;

pub use config::Config;
pub use error::{AppError, AppResult};

const SESSION_SWEEP_EVERY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub routes: Arc<RouteResolver>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub credentials: Arc<dyn CredentialVerifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        routes: RouteResolver,
        geocoder: Arc<dyn ReverseGeocoder>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            config,
            sessions: SessionStore::new(),
            routes: Arc::new(routes),
            geocoder,
            credentials,
        }
    }

    /// Wires the OpenRouteService and Nominatim clients and the configured
    /// login, and starts the idle-session sweeper. Needs a Tokio runtime.
    pub fn from_config(config: Config) -> AppResult<Self> {
        if config.ors_api_key.is_none() {
            tracing::warn!("ORS_API_KEY not set, every route will be synthesized locally");
        }

        let provider: Arc<dyn RouteProvider> = Arc::new(
            OrsRouteProvider::new(
                config.ors_api_key.clone(),
                config.ors_base_url.clone(),
                config.http_timeout,
            )
            .map_err(|e| AppError::Internal(format!("Failed to build routing client: {}", e)))?,
        );
        let geocoder: Arc<dyn ReverseGeocoder> = Arc::new(
            NominatimGeocoder::new(config.nominatim_base_url.clone(), config.http_timeout)
                .map_err(|e| AppError::Internal(format!("Failed to build geocoding client: {}", e)))?,
        );
        let credentials = credentials_from(&config)?;
        let idle_ttl = config.session_idle_ttl;
        // tokio intervals reject a zero period
        let sweep_every = SESSION_SWEEP_EVERY.min(idle_ttl).max(Duration::from_secs(1));

        let state = Self::new(config, RouteResolver::new(provider), geocoder, credentials);
        state.sessions.spawn_sweeper(idle_ttl, sweep_every);
        Ok(state)
    }
}

fn credentials_from(config: &Config) -> AppResult<Arc<dyn CredentialVerifier>> {
    let verifier: Arc<dyn CredentialVerifier> = match (
        &config.admin_email,
        &config.admin_password_hash,
        &config.admin_password,
    ) {
        (Some(email), Some(hash), _) => {
            Arc::new(ConfiguredCredentials::from_hash(email.clone(), hash.clone())?)
        }
        (Some(email), None, Some(password)) => {
            tracing::warn!("ADMIN_PASSWORD is plaintext, prefer ADMIN_PASSWORD_HASH");
            Arc::new(ConfiguredCredentials::from_password(email.clone(), password)?)
        }
        _ => {
            if config.access_gate_enabled {
                tracing::warn!("Access gate enabled but no login configured, nobody can log in");
            }
            Arc::new(NoCredentials)
        }
    };
    Ok(verifier)
}
