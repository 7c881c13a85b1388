pub mod geo;
pub mod jwt;
pub mod message;
pub mod pricing;
