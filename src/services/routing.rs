use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::services::error::ServiceError;
use crate::services::limiter::{acquire, ors_limiter};
use crate::utils::geo::{haversine_distance, round2, Bounds, Coordinate};

/// Segments of the synthesized path; it has `FALLBACK_STEPS + 1` points
pub const FALLBACK_STEPS: usize = 8;
/// Full width of the per-axis offset applied to each synthesized point, in degrees
pub const FALLBACK_JITTER_DEG: f64 = 0.001;
pub const FALLBACK_MINUTES_PER_KM: f64 = 2.0;

const REAL_ROUTE_COLOR: &str = "#4CAF50";
const SYNTHESIZED_ROUTE_COLOR: &str = "#FF9800";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub points: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_min: u32,
    /// `true` when the path came from the routing service
    pub is_real: bool,
}

impl RouteResult {
    pub fn color(&self) -> &'static str {
        if self.is_real {
            REAL_ROUTE_COLOR
        } else {
            SYNTHESIZED_ROUTE_COLOR
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::around(&self.points)
    }
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Gets a driving route between two points.
    async fn get_directions(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RouteResult, ServiceError>;
}

// --- OpenRouteService GeoJSON response ---
#[derive(Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}
#[derive(Deserialize)]
struct Feature {
    geometry: LineGeometry,
    properties: Properties,
}
#[derive(Deserialize)]
struct LineGeometry {
    coordinates: Vec<[f64; 2]>,
}
#[derive(Deserialize)]
struct Properties {
    #[serde(default)]
    segments: Vec<Segment>,
}
#[derive(Deserialize, Clone, Copy)]
struct Segment {
    distance: f64,
    duration: f64,
}

pub struct OrsRouteProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
    timeout: Duration,
}

impl OrsRouteProvider {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ServiceError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: ors_limiter(),
            timeout,
        })
    }
}

#[async_trait]
impl RouteProvider for OrsRouteProvider {
    async fn get_directions(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RouteResult, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("ORS_API_KEY is not set"))?;

        acquire(&self.limiter, self.timeout).await?;
        tracing::debug!(?start, ?end, "Requesting driving route");

        let url = format!("{}/v2/directions/driving-car", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json, application/geo+json")
            .query(&[
                ("api_key", api_key.to_string()),
                ("start", format!("{},{}", start.lng, start.lat)),
                ("end", format!("{},{}", end.lng, end.lat)),
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

        parse_directions(&text)
    }
}

fn parse_directions(body: &str) -> Result<RouteResult, ServiceError> {
    let response: DirectionsResponse = serde_json::from_str(body)?;
    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::Malformed("No route found in response".to_string()))?;
    let segment = feature
        .properties
        .segments
        .first()
        .copied()
        .ok_or_else(|| ServiceError::Malformed("Route has no segments".to_string()))?;

    let points = feature
        .geometry
        .coordinates
        .into_iter()
        .map(|[lng, lat]| Coordinate { lat, lng })
        .collect();

    Ok(RouteResult {
        points,
        distance_km: round2(segment.distance / 1000.0),
        duration_min: (segment.duration / 60.0).round() as u32,
        is_real: true,
    })
}

/// Straight-line stand-in for a driving route, with small offsets so it does
/// not look like a ruler line on the map.
pub fn synthesize_route<R: Rng>(
    origin: Coordinate,
    destination: Coordinate,
    rng: &mut R,
) -> RouteResult {
    let distance = haversine_distance(origin, destination);

    let points = (0..=FALLBACK_STEPS)
        .map(|i| {
            let t = i as f64 / FALLBACK_STEPS as f64;
            let lat = origin.lat + (destination.lat - origin.lat) * t;
            let lng = origin.lng + (destination.lng - origin.lng) * t;

            let offset_lat = rng.gen_range(-0.5..0.5_f64) * FALLBACK_JITTER_DEG;
            let offset_lng = rng.gen_range(-0.5..0.5_f64) * FALLBACK_JITTER_DEG;

            Coordinate::new(lat + offset_lat, lng + offset_lng)
        })
        .collect();

    RouteResult {
        points,
        distance_km: round2(distance),
        duration_min: (distance * FALLBACK_MINUTES_PER_KM).round() as u32,
        is_real: false,
    }
}

/// Produces a route for every request: the provider's answer when it has one,
/// a synthesized path otherwise.
pub struct RouteResolver {
    provider: Arc<dyn RouteProvider>,
    rng: Mutex<StdRng>,
}

impl RouteResolver {
    pub fn new(provider: Arc<dyn RouteProvider>) -> Self {
        Self {
            provider,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixed jitter sequence, for reproducible fallback paths
    pub fn with_seed(provider: Arc<dyn RouteProvider>, seed: u64) -> Self {
        Self {
            provider,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub async fn resolve(&self, origin: Coordinate, destination: Coordinate) -> RouteResult {
        match self.provider.get_directions(origin, destination).await {
            Ok(route) if !route.points.is_empty() => {
                tracing::info!(
                    distance_km = route.distance_km,
                    duration_min = route.duration_min,
                    "Route calculated by routing service"
                );
                return route;
            }
            Ok(_) => {
                tracing::warn!("Routing service returned an empty path, using local route");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Routing service unavailable, using local route");
            }
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        synthesize_route(origin, destination, &mut *rng)
    }
}
