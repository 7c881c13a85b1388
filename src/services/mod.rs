pub mod credentials;
pub mod error;
pub mod geocoding;
pub mod limiter;
pub mod routing;

pub use credentials::{ConfiguredCredentials, CredentialVerifier, NoCredentials};
pub use error::ServiceError;
pub use geocoding::{describe_location, NominatimGeocoder, ReverseGeocoder};
pub use routing::{OrsRouteProvider, RouteProvider, RouteResolver, RouteResult};
