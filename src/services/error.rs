use thiserror::Error;

/// Failure talking to an upstream service. Callers recover from all of these.
#[derive(Error, Debug)]
pub enum ServiceError {
    // The request never got an answer (DNS, connect, timeout)
    #[error("Network failure: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Service not configured: {0}")]
    NotConfigured(&'static str),

    // Our own outbound quota had no slot in time
    #[error("No request slot within {0:?}")]
    Throttled(std::time::Duration),
}

impl ServiceError {
    pub fn is_network(&self) -> bool {
        matches!(self, ServiceError::Network(_))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_body() {
            ServiceError::Malformed(err.to_string())
        } else {
            ServiceError::Network(err)
        }
    }
}
