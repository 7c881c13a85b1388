pub mod auth;
pub mod trip;
