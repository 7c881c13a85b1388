use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::describe_location;
use crate::session::{Origin, OriginSource, Status, TripSession};
use crate::utils::geo::{Bounds, Coordinate};
use crate::utils::jwt::Claims;
use crate::utils::message::{
    build_message, messaging_link, ContactDetails, ContactPlaceholders, CONTACT_PLACEHOLDERS,
};
use crate::utils::pricing::Surcharges;
use crate::AppState;

const DEVICE_ZOOM: u8 = 15;
const DEFAULT_ZOOM: u8 = 13;

fn superseded() -> AppError {
    AppError::Conflict("Superseded by a newer request".to_string())
}

// ============ Session lifecycle ============

/// Start a trip session (page load)
pub async fn create_session(State(state): State<AppState>) -> Json<TripSession> {
    Json(state.sessions.create().await)
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<TripSession>> {
    Ok(Json(state.sessions.get(session_id).await?))
}

/// End a trip session (page unload)
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.sessions.remove(session_id).await?;
    Ok(Json(serde_json::json!({ "message": "Session ended" })))
}

// ============ Origin ============

#[derive(Debug, Deserialize)]
pub struct SetOriginRequest {
    /// Device position; absent when geolocation failed or was denied
    pub position: Option<Coordinate>,
}

#[derive(Debug, Serialize)]
pub struct OriginResponse {
    pub origin: Origin,
    pub popup: &'static str,
    pub zoom: u8,
}

pub async fn set_origin(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SetOriginRequest>,
) -> AppResult<Json<OriginResponse>> {
    let (origin, zoom) = match payload.position {
        Some(coordinate) => (
            Origin {
                coordinate,
                source: OriginSource::Device,
            },
            DEVICE_ZOOM,
        ),
        None => {
            tracing::info!("No device position, using default origin");
            (
                Origin {
                    coordinate: state.config.default_origin,
                    source: OriginSource::Default,
                },
                DEFAULT_ZOOM,
            )
        }
    };

    state
        .sessions
        .update(session_id, |s| s.set_origin(origin))
        .await??;

    Ok(Json(OriginResponse {
        origin,
        popup: origin.popup(),
        zoom,
    }))
}

// ============ Destination (map click) ============

#[derive(Debug, Serialize)]
pub struct DestinationResponse {
    pub destination: Coordinate,
    pub label: String,
    pub marker_popup: String,
    pub status: Status,
}

pub async fn select_destination(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(at): Json<Coordinate>,
) -> AppResult<Json<DestinationResponse>> {
    let ticket = state
        .sessions
        .update(session_id, |s| s.begin_destination(at))
        .await??;

    let label = describe_location(state.geocoder.as_ref(), at).await;

    let applied = state
        .sessions
        .update(session_id, |s| s.finish_destination(ticket, label.clone()))
        .await?;
    if !applied {
        return Err(superseded());
    }

    tracing::info!(session_id = %session_id, label = %label, "Location selected");

    Ok(Json(DestinationResponse {
        destination: at,
        marker_popup: format!("🎯 {}", label),
        label,
        status: Status::LocationSelected,
    }))
}

// ============ Trip calculation ============

#[derive(Debug, Serialize)]
pub struct RouteOverlay {
    pub points: Vec<Coordinate>,
    pub color: &'static str,
    pub bounds: Option<Bounds>,
    pub is_real: bool,
}

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub route: RouteOverlay,
    pub distance_km: f64,
    pub duration_min: u32,
    pub price: f64,
    pub price_display: String,
    pub status: Status,
    pub confirmation_visible: bool,
}

impl TripResponse {
    fn from_session(session: &TripSession) -> Option<Self> {
        let route = session.route.as_ref()?;
        let quote = session.quote?;

        Some(Self {
            route: RouteOverlay {
                points: route.points.clone(),
                color: route.color(),
                bounds: route.bounds(),
                is_real: route.is_real,
            },
            distance_km: quote.distance_km,
            duration_min: route.duration_min,
            price: quote.price,
            price_display: quote.price_display(),
            status: session.status,
            confirmation_visible: session.confirmation_visible,
        })
    }
}

async fn run_calculation(
    state: &AppState,
    session_id: Uuid,
    surcharges: Surcharges,
) -> AppResult<TripResponse> {
    let pending = state
        .sessions
        .update(session_id, |s| s.begin_calculation(surcharges))
        .await??;

    let route = state
        .routes
        .resolve(pending.origin, pending.destination)
        .await;

    let response = state
        .sessions
        .update(session_id, |s| {
            if s.finish_calculation(pending.ticket, route, &state.config.pricing) {
                TripResponse::from_session(s)
            } else {
                None
            }
        })
        .await?
        .ok_or_else(superseded)?;

    tracing::info!(
        session_id = %session_id,
        distance_km = response.distance_km,
        price = %response.price_display,
        duration_min = response.duration_min,
        is_real = response.route.is_real,
        "Trip calculated"
    );

    Ok(response)
}

pub async fn calculate_trip(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(surcharges): Json<Surcharges>,
) -> AppResult<Json<TripResponse>> {
    Ok(Json(run_calculation(&state, session_id, surcharges).await?))
}

#[derive(Debug, Serialize)]
pub struct SurchargesResponse {
    pub surcharges: Surcharges,
    /// Present when the change triggered a recalculation
    pub trip: Option<TripResponse>,
}

/// Surcharge toggles only reprice while the confirmation panel is showing
pub async fn update_surcharges(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(surcharges): Json<Surcharges>,
) -> AppResult<Json<SurchargesResponse>> {
    let recalculate = state
        .sessions
        .update(session_id, |s| {
            s.surcharges = surcharges;
            s.confirmation_visible
        })
        .await?;

    let trip = if recalculate {
        Some(run_calculation(&state, session_id, surcharges).await?)
    } else {
        None
    };

    Ok(Json(SurchargesResponse { surcharges, trip }))
}

// ============ Confirmation ============

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: Status,
    pub confirmation_visible: bool,
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<StatusResponse>> {
    let response = state
        .sessions
        .update(session_id, |s| {
            s.cancel();
            StatusResponse {
                status: s.status,
                confirmation_visible: s.confirmation_visible,
            }
        })
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct ContactFormResponse {
    pub show_contact_form: bool,
    pub placeholders: ContactPlaceholders,
}

/// Open the owner contact form (gated)
pub async fn confirm_request(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ContactFormResponse>> {
    state.sessions.get(session_id).await?;
    Ok(Json(ContactFormResponse {
        show_contact_form: true,
        placeholders: CONTACT_PLACEHOLDERS,
    }))
}

#[derive(Debug, Serialize)]
pub struct OutboundResponse {
    /// Link the client opens in a new tab
    pub link: String,
    pub message: String,
    pub status: Status,
}

/// Build the pre-filled WhatsApp request (gated). `claims` is absent while
/// the access gate is off.
pub async fn send_request(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    claims: Option<Extension<Claims>>,
    Json(contact): Json<ContactDetails>,
) -> AppResult<Json<OutboundResponse>> {
    let link_phone = &state.config.whatsapp_number;

    let (message, link, status) = state
        .sessions
        .update(session_id, |s| {
            let trip = s.outbound_trip()?;
            let message = build_message(&trip, &contact);
            let link = messaging_link(link_phone, &message);
            s.mark_sent();
            Ok::<_, AppError>((message, link, s.status))
        })
        .await??;

    let requested_by = claims.as_ref().map(|Extension(c)| c.sub.as_str());
    tracing::info!(
        session_id = %session_id,
        requested_by = requested_by.unwrap_or("anonymous"),
        "Ride request handed off to WhatsApp"
    );

    Ok(Json(OutboundResponse {
        link,
        message,
        status,
    }))
}
