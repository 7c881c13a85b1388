//! Per-page-load trip state.
//!
//! A [`TripSession`] is created when the page loads and removed when it
//! unloads. Handlers never hold the store lock across an upstream call: each
//! operation is split into a `begin_*` step that records intent and returns a
//! ticket, and a `finish_*` step that applies the upstream answer only if no
//! newer operation of the same kind started in between.
//!
//! Tabs that close without ending their session are reclaimed by
//! [`SessionStore::spawn_sweeper`] once they sit idle past a TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::geocoding::UNKNOWN_PLACE_LABEL;
use crate::services::RouteResult;
use crate::utils::geo::Coordinate;
use crate::utils::message::OutboundTrip;
use crate::utils::pricing::{PriceQuote, PricingConfig, Surcharges};

pub const WAITING_FOR_ORIGIN: &str = "⏳ Aguardando localização inicial...";
pub const PICK_DESTINATION: &str = "📍 Por favor, clique no mapa para escolher um destino!";
pub const CALCULATE_FIRST: &str = "🚗 Calcule a viagem antes de enviar a solicitação!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginSource {
    Device,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Origin {
    pub coordinate: Coordinate,
    pub source: OriginSource,
}

impl Origin {
    pub fn popup(&self) -> &'static str {
        match self.source {
            OriginSource::Device => "🏠 Você está aqui",
            OriginSource::Default => "🏠 Localização padrão - Vitória, ES",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub coordinate: Coordinate,
    /// `None` while the address lookup is in flight
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    IdentifyingLocation,
    LocationSelected,
    Calculating,
    RouteCalculated,
    SentToMessaging,
    Cancelled,
}

impl Status {
    pub fn text(self) -> &'static str {
        match self {
            Status::Idle => "Clique no mapa para escolher o destino",
            Status::IdentifyingLocation => "Identificando local...",
            Status::LocationSelected => "Local selecionado",
            Status::Calculating => "Calculando rota...",
            Status::RouteCalculated => "Rota calculada!",
            Status::SentToMessaging => "Enviado para WhatsApp!",
            Status::Cancelled => "Solicitação cancelada",
        }
    }

    pub fn tone(self) -> StatusTone {
        match self {
            Status::Idle | Status::IdentifyingLocation => StatusTone::Info,
            Status::Calculating => StatusTone::Warning,
            Status::Cancelled => StatusTone::Error,
            Status::LocationSelected | Status::RouteCalculated | Status::SentToMessaging => {
                StatusTone::Success
            }
        }
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct StatusView {
            text: &'static str,
            tone: StatusTone,
        }

        StatusView {
            text: self.text(),
            tone: self.tone(),
        }
        .serialize(serializer)
    }
}

/// Monotonic counter identifying the latest operation of one kind
pub type Ticket = u64;

#[derive(Debug, Clone, Serialize)]
pub struct TripSession {
    pub id: Uuid,
    pub origin: Option<Origin>,
    pub destination: Option<Destination>,
    pub route: Option<RouteResult>,
    pub quote: Option<PriceQuote>,
    pub surcharges: Surcharges,
    pub status: Status,
    pub confirmation_visible: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    destination_ticket: Ticket,
    #[serde(skip)]
    calculation_ticket: Ticket,
}

/// Endpoints captured when a calculation starts
#[derive(Debug, Clone, Copy)]
pub struct PendingCalculation {
    pub ticket: Ticket,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

impl TripSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            origin: None,
            destination: None,
            route: None,
            quote: None,
            surcharges: Surcharges::default(),
            status: Status::Idle,
            confirmation_visible: false,
            created_at: Utc::now(),
            destination_ticket: 0,
            calculation_ticket: 0,
        }
    }

    /// The origin is fixed once known.
    pub fn set_origin(&mut self, origin: Origin) -> AppResult<()> {
        if self.origin.is_some() {
            return Err(AppError::Conflict("Origin already set".to_string()));
        }
        self.origin = Some(origin);
        Ok(())
    }

    fn clear_trip(&mut self) {
        self.route = None;
        self.quote = None;
        self.confirmation_visible = false;
    }

    /// A map click. Replaces the destination and drops everything derived from the old one.
    pub fn begin_destination(&mut self, at: Coordinate) -> AppResult<Ticket> {
        if self.origin.is_none() {
            return Err(AppError::PreconditionMissing(WAITING_FOR_ORIGIN.to_string()));
        }

        self.destination_ticket += 1;
        // a pending calculation was for the old destination
        self.calculation_ticket += 1;
        self.destination = Some(Destination {
            coordinate: at,
            label: None,
        });
        self.clear_trip();
        self.status = Status::IdentifyingLocation;
        Ok(self.destination_ticket)
    }

    /// Attaches the looked-up label. Returns `false` if a newer click superseded this one.
    pub fn finish_destination(&mut self, ticket: Ticket, label: String) -> bool {
        if ticket != self.destination_ticket {
            return false;
        }
        if let Some(destination) = self.destination.as_mut() {
            destination.label = Some(label);
        }
        self.status = Status::LocationSelected;
        true
    }

    pub fn begin_calculation(&mut self, surcharges: Surcharges) -> AppResult<PendingCalculation> {
        let (Some(origin), Some(destination)) = (self.origin, self.destination.as_ref()) else {
            return Err(AppError::PreconditionMissing(PICK_DESTINATION.to_string()));
        };
        let destination = destination.coordinate;

        self.calculation_ticket += 1;
        self.surcharges = surcharges;
        self.route = None;
        self.quote = None;
        self.status = Status::Calculating;

        Ok(PendingCalculation {
            ticket: self.calculation_ticket,
            origin: origin.coordinate,
            destination,
        })
    }

    /// Stores the route and its price. Returns `false` if a newer calculation
    /// or a new destination superseded this one.
    pub fn finish_calculation(
        &mut self,
        ticket: Ticket,
        route: RouteResult,
        pricing: &PricingConfig,
    ) -> bool {
        if ticket != self.calculation_ticket {
            return false;
        }

        self.quote = Some(pricing.quote(route.distance_km, &self.surcharges));
        self.route = Some(route);
        self.status = Status::RouteCalculated;
        self.confirmation_visible = true;
        true
    }

    /// Everything the outbound message needs, or the reason it is not ready.
    pub fn outbound_trip(&self) -> AppResult<OutboundTrip> {
        let (Some(origin), Some(destination)) = (self.origin, self.destination.as_ref()) else {
            return Err(AppError::PreconditionMissing(PICK_DESTINATION.to_string()));
        };
        let quote = self
            .quote
            .ok_or_else(|| AppError::PreconditionMissing(CALCULATE_FIRST.to_string()))?;

        Ok(OutboundTrip {
            // label lookup still in flight
            destination_label: destination
                .label
                .clone()
                .unwrap_or_else(|| UNKNOWN_PLACE_LABEL.to_string()),
            distance_km: quote.distance_km,
            price: quote.price,
            origin: origin.coordinate,
            destination: destination.coordinate,
        })
    }

    pub fn mark_sent(&mut self) {
        self.status = Status::SentToMessaging;
        self.confirmation_visible = false;
    }

    pub fn cancel(&mut self) {
        self.status = Status::Cancelled;
        self.confirmation_visible = false;
    }
}

impl Default for TripSession {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry {
    session: TripSession,
    last_seen: Instant,
}

impl Entry {
    fn touch(&mut self) -> &mut TripSession {
        self.last_seen = Instant::now();
        &mut self.session
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Session not found".to_string())
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> TripSession {
        let session = TripSession::new();
        self.sessions.write().await.insert(
            session.id,
            Entry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(session_id = %session.id, "Trip session started");
        session
    }

    pub async fn get(&self, id: Uuid) -> AppResult<TripSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or_else(not_found)?;
        Ok(entry.touch().clone())
    }

    /// Runs `f` against the session under the write lock.
    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut TripSession) -> R) -> AppResult<R> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or_else(not_found)?;
        Ok(f(entry.touch()))
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                tracing::debug!(session_id = %id, "Trip session ended");
                Ok(())
            }
            None => Err(not_found()),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions not read or updated within `ttl`. Returns how many went.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= ttl);
        before - sessions.len()
    }

    /// Sweeps idle sessions every `every` until the runtime shuts down.
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let dropped = store.sweep_idle(ttl).await;
                if dropped > 0 {
                    let remaining = store.len().await;
                    tracing::info!(dropped, remaining, "Idle sessions dropped");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitoria() -> Origin {
        Origin {
            coordinate: Coordinate::new(-20.2976, -40.2958),
            source: OriginSource::Default,
        }
    }

    fn route(distance_km: f64) -> RouteResult {
        RouteResult {
            points: vec![Coordinate::new(-20.2976, -40.2958), Coordinate::new(-20.33, -40.29)],
            distance_km,
            duration_min: 20,
            is_real: true,
        }
    }

    #[test]
    fn click_before_origin_is_refused() {
        let mut session = TripSession::new();
        let result = session.begin_destination(Coordinate::new(-20.3, -40.3));

        assert!(matches!(result, Err(AppError::PreconditionMissing(_))));
        assert!(session.destination.is_none());
        assert_eq!(session.status, Status::Idle);
    }

    #[test]
    fn origin_is_set_once() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        assert!(matches!(session.set_origin(vitoria()), Err(AppError::Conflict(_))));
    }

    #[test]
    fn click_then_label() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();

        let ticket = session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();
        assert_eq!(session.status, Status::IdentifyingLocation);

        assert!(session.finish_destination(ticket, "Rua Sete, Centro".to_string()));
        assert_eq!(session.status, Status::LocationSelected);
        assert_eq!(
            session.destination.unwrap().label.as_deref(),
            Some("Rua Sete, Centro")
        );
    }

    #[test]
    fn late_label_from_older_click_is_dropped() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();

        let first = session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();
        let second = session.begin_destination(Coordinate::new(-20.4, -40.4)).unwrap();

        assert!(session.finish_destination(second, "Segundo".to_string()));
        assert!(!session.finish_destination(first, "Primeiro".to_string()));

        let destination = session.destination.unwrap();
        assert_eq!(destination.coordinate, Coordinate::new(-20.4, -40.4));
        assert_eq!(destination.label.as_deref(), Some("Segundo"));
    }

    #[test]
    fn new_click_clears_previous_trip() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        let ticket = session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();
        session.finish_destination(ticket, "A".to_string());
        let pending = session.begin_calculation(Surcharges::default()).unwrap();
        session.finish_calculation(pending.ticket, route(10.0), &PricingConfig::default());
        assert!(session.confirmation_visible);

        session.begin_destination(Coordinate::new(-20.4, -40.4)).unwrap();

        assert!(session.route.is_none());
        assert!(session.quote.is_none());
        assert!(!session.confirmation_visible);
    }

    #[test]
    fn calculation_needs_destination() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        let result = session.begin_calculation(Surcharges::default());
        assert!(matches!(result, Err(AppError::PreconditionMissing(msg)) if msg == PICK_DESTINATION));
    }

    #[test]
    fn calculation_prices_the_route() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();

        let surcharges = Surcharges {
            emergency: true,
            weekend: true,
            ..Default::default()
        };
        let pending = session.begin_calculation(surcharges).unwrap();
        assert_eq!(session.status, Status::Calculating);
        assert!(session.finish_calculation(pending.ticket, route(10.0), &PricingConfig::default()));

        assert_eq!(session.quote.unwrap().price, 55.0);
        assert_eq!(session.status, Status::RouteCalculated);
        assert!(session.confirmation_visible);
    }

    #[test]
    fn calculation_for_replaced_destination_is_dropped() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();
        let pending = session.begin_calculation(Surcharges::default()).unwrap();

        session.begin_destination(Coordinate::new(-20.4, -40.4)).unwrap();

        assert!(!session.finish_calculation(pending.ticket, route(10.0), &PricingConfig::default()));
        assert!(session.route.is_none());
    }

    #[test]
    fn outbound_requires_quote() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();

        assert!(matches!(
            session.outbound_trip(),
            Err(AppError::PreconditionMissing(msg)) if msg == CALCULATE_FIRST
        ));
    }

    #[test]
    fn send_before_label_arrives_uses_fallback_label() {
        let mut session = TripSession::new();
        session.set_origin(vitoria()).unwrap();
        session.begin_destination(Coordinate::new(-20.3, -40.3)).unwrap();
        let pending = session.begin_calculation(Surcharges::default()).unwrap();
        session.finish_calculation(pending.ticket, route(3.0), &PricingConfig::default());

        let trip = session.outbound_trip().unwrap();
        assert_eq!(trip.destination_label, UNKNOWN_PLACE_LABEL);
    }

    #[test]
    fn cancel_and_send_hide_confirmation() {
        let mut session = TripSession::new();
        session.confirmation_visible = true;
        session.cancel();
        assert_eq!(session.status, Status::Cancelled);
        assert!(!session.confirmation_visible);

        session.confirmation_visible = true;
        session.mark_sent();
        assert_eq!(session.status.text(), "Enviado para WhatsApp!");
        assert!(!session.confirmation_visible);
    }

    #[test]
    fn status_serializes_with_tone() {
        let json = serde_json::to_value(Status::Calculating).unwrap();
        assert_eq!(json["text"], "Calculando rota...");
        assert_eq!(json["tone"], "warning");
    }

    #[tokio::test]
    async fn store_lifecycle() {
        let store = SessionStore::new();
        let session = store.create().await;

        assert_eq!(store.len().await, 1);
        store
            .update(session.id, |s| s.set_origin(vitoria()))
            .await
            .unwrap()
            .unwrap();
        assert!(store.get(session.id).await.unwrap().origin.is_some());

        store.remove(session.id).await.unwrap();
        assert!(matches!(store.get(session.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let store = SessionStore::new();
        let active = store.create().await;
        let abandoned = store.create().await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.get(active.id).await.unwrap();

        assert_eq!(store.sweep_idle(Duration::from_millis(40)).await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get(active.id).await.is_ok());
        assert!(matches!(store.get(abandoned.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn sweeper_reclaims_abandoned_tabs() {
        let store = SessionStore::new();
        for _ in 0..100 {
            store.create().await;
        }

        let sweeper = store.spawn_sweeper(Duration::from_millis(20), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.abort();

        assert_eq!(store.len().await, 0);
    }
}
