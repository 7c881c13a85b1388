use std::time::Duration;

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::Client;
use serde::Deserialize;

use crate::services::error::ServiceError;
use crate::services::limiter::{acquire, nominatim_limiter};
use crate::utils::geo::Coordinate;

/// Label used when the geocoding service could not be reached
pub const UNREACHABLE_LABEL: &str = "Localização selecionada";
/// Label used when the service answered with nothing usable
pub const UNKNOWN_PLACE_LABEL: &str = "Destino selecionado";

const USER_AGENT: &str = concat!("pet-ride-express/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    pub road: Option<String>,
    pub suburb: Option<String>,
    pub neighbourhood: Option<String>,
}

/// Nominatim `/reverse` answer, reduced to what labels are built from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Place {
    pub display_name: Option<String>,
    pub address: Option<Address>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Looks up what is at a coordinate.
    async fn reverse(&self, at: Coordinate) -> Result<Place, ServiceError>;
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
    timeout: Duration,
}

impl NominatimGeocoder {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ServiceError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: nominatim_limiter(),
            timeout,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: Coordinate) -> Result<Place, ServiceError> {
        acquire(&self.limiter, self.timeout).await?;
        tracing::debug!(lat = at.lat, lng = at.lng, "Requesting reverse geocode");

        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await
            .map_err(ServiceError::Network)?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Street-level label for a place, `None` when it carries nothing usable.
///
/// A `display_name` is required. The road (with suburb or neighbourhood)
/// wins when present, otherwise the first two `display_name` segments. An
/// answer without `address` details counts as unusable.
pub fn label_for(place: &Place) -> Option<String> {
    let display_name = place.display_name.as_deref().filter(|d| !d.is_empty())?;
    let address = place.address.as_ref()?;

    match address.road.as_deref().filter(|r| !r.is_empty()) {
        Some(road) => {
            let area = address
                .suburb
                .as_deref()
                .or(address.neighbourhood.as_deref())
                .filter(|a| !a.is_empty());
            Some(match area {
                Some(area) => format!("{}, {}", road, area),
                None => road.to_string(),
            })
        }
        None => Some(display_name.split(',').take(2).collect::<Vec<_>>().join(",")),
    }
}

/// Human-readable name for a map position. Never fails and never returns an
/// empty string.
pub async fn describe_location(geocoder: &dyn ReverseGeocoder, at: Coordinate) -> String {
    match geocoder.reverse(at).await {
        Ok(place) => match label_for(&place) {
            Some(label) if !label.trim().is_empty() => label,
            Some(_) => UNREACHABLE_LABEL.to_string(),
            None => {
                tracing::debug!(lat = at.lat, lng = at.lng, "Reverse geocode had no usable name");
                UNKNOWN_PLACE_LABEL.to_string()
            }
        },
        Err(e) if e.is_network() => {
            tracing::warn!(error = %e, "Network error while fetching address");
            UNREACHABLE_LABEL.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch address");
            UNKNOWN_PLACE_LABEL.to_string()
        }
    }
}
