use serde::{Deserialize, Serialize};

use crate::utils::geo::Coordinate;

const NAME_PLACEHOLDER: &str = "[Seu nome]";
const PHONE_PLACEHOLDER: &str = "[Seu telefone]";
const PET_PLACEHOLDER: &str = "[Nome e tipo do pet]";
const NOTES_PLACEHOLDER: &str = "[Adicionar se necessário]";

/// Owner details typed into the contact form. Nothing here is validated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub pet: Option<String>,
    pub notes: Option<String>,
}

/// Placeholders the client shows in the empty contact form
#[derive(Debug, Clone, Serialize)]
pub struct ContactPlaceholders {
    pub name: &'static str,
    pub phone: &'static str,
    pub pet: &'static str,
    pub notes: &'static str,
}

pub const CONTACT_PLACEHOLDERS: ContactPlaceholders = ContactPlaceholders {
    name: NAME_PLACEHOLDER,
    phone: PHONE_PLACEHOLDER,
    pet: PET_PLACEHOLDER,
    notes: NOTES_PLACEHOLDER,
};

/// Trip facts that go into the outbound request
#[derive(Debug, Clone)]
pub struct OutboundTrip {
    pub destination_label: String,
    pub distance_km: f64,
    pub price: f64,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

fn or_placeholder<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => placeholder,
    }
}

pub fn location_link(at: Coordinate) -> String {
    format!("https://www.google.com/maps?q={},{}", at.lat, at.lng)
}

pub fn directions_link(from: Coordinate, to: Coordinate) -> String {
    format!(
        "https://www.google.com/maps/dir/{},{}/{},{}",
        from.lat, from.lng, to.lat, to.lng
    )
}

pub fn build_message(trip: &OutboundTrip, contact: &ContactDetails) -> String {
    let name = or_placeholder(&contact.name, NAME_PLACEHOLDER);
    let phone = or_placeholder(&contact.phone, PHONE_PLACEHOLDER);
    let pet = or_placeholder(&contact.pet, PET_PLACEHOLDER);
    let notes = or_placeholder(&contact.notes, NOTES_PLACEHOLDER);

    format!(
        "🐾 *Pet Ride Express* - Solicitação de Corrida

📍 *Destino:* {destination}
📏 *Distância:* {distance:.2} km
💰 *Valor estimado:* R$ {price:.2}
📌 *Localização atual:* [Abrir no mapa]({origin_link})
🗺️ *Rota completa:* [Abrir no Google Maps]({route_link})

🐕 Preciso de transporte para meu pet!

*Dados do proprietário:*
• Nome: {name}
• Telefone: {phone}
• Pet: {pet}
• Observações: {notes}

Aguardo contato! 🚗🐾",
        destination = trip.destination_label,
        distance = trip.distance_km,
        price = trip.price,
        origin_link = location_link(trip.origin),
        route_link = directions_link(trip.origin, trip.destination),
    )
}

/// `wa.me` deep link that opens a chat with `phone_number` pre-filled with `message`
pub fn messaging_link(phone_number: &str, message: &str) -> String {
    format!(
        "https://wa.me/{}?text={}",
        phone_number,
        urlencoding::encode(message)
    )
}
