use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::services::error::ServiceError;

/// OpenRouteService free tier: 40 directions requests per minute
pub fn ors_limiter() -> DefaultDirectRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(40).unwrap_or(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// Nominatim usage policy: at most one request per second
pub fn nominatim_limiter() -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(NonZeroU32::MIN))
}

/// Waits for a slot, giving up after `max_wait` so callers can fall back.
pub async fn acquire(
    limiter: &DefaultDirectRateLimiter,
    max_wait: Duration,
) -> Result<(), ServiceError> {
    tokio::time::timeout(max_wait, limiter.until_ready())
        .await
        .map_err(|_| ServiceError::Throttled(max_wait))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_slot_is_immediate() {
        let limiter = nominatim_limiter();
        assert!(acquire(&limiter, Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_quota_gives_up() {
        let limiter = nominatim_limiter();
        acquire(&limiter, Duration::from_millis(50)).await.unwrap();

        let result = acquire(&limiter, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ServiceError::Throttled(_))));
    }
}
