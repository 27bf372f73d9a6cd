use crate::AppState;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;

/// Process-wide request limiter.
///
/// Allows `max` requests per `window`. Capacity refills continuously
/// (one request every `window / max`), so the window slides rather than
/// resetting on a fixed boundary. Not keyed by client.
pub struct AppRateLimiter {
    limiter: DefaultDirectRateLimiter,
    max: NonZeroU32,
    window: Duration,
}

impl std::fmt::Debug for AppRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRateLimiter")
            .field("max", &self.max)
            .field("window", &self.window)
            .finish()
    }
}

impl AppRateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        let max = NonZeroU32::new(max).unwrap_or(nonzero!(1u32));
        let quota = Quota::with_period(window / max.get())
            .unwrap_or_else(|| Quota::per_minute(max))
            .allow_burst(max);

        Self {
            limiter: RateLimiter::direct(quota),
            max,
            window,
        }
    }

    /// Consume one request slot. Returns `false` when over the limit.
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn max(&self) -> u32 {
        self.max.get()
    }

    /// Human-readable window, e.g. `1 minute` or `30 seconds`.
    pub fn window_label(&self) -> String {
        match self.window.as_secs() {
            60 => "1 minute".to_string(),
            1 => "1 second".to_string(),
            secs if secs % 60 == 0 => format!("{} minutes", secs / 60),
            secs => format!("{secs} seconds"),
        }
    }

    /// The 429 response sent to over-limit callers.
    pub fn rejection(&self) -> Response {
        let max = self.max();
        let window = self.window_label();
        let body = json!({
            "statusCode": 429,
            "error": "Too Many Requests",
            "message": format!(
                "Has excedido el límite de {max} solicitudes por {window}. Inténtalo más tarde."
            ),
        });
        (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
    }
}

/// Middleware to enforce rate limits
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.config.resilience.rate_limit_enabled && !state.rate_limiter.check() {
        tracing::warn!(
            path = %req.uri().path(),
            max = state.rate_limiter.max(),
            window = %state.rate_limiter.window_label(),
            "Rate limit exceeded"
        );
        return state.rate_limiter.rejection();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = AppRateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());

        // Next should fail (immediate)
        assert!(!limiter.check());
    }

    #[test]
    fn test_refill() {
        // 5 per 500ms -> one slot every 100ms
        let limiter = AppRateLimiter::new(5, Duration::from_millis(500));
        for _ in 0..5 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());

        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn test_window_label() {
        assert_eq!(
            AppRateLimiter::new(10, Duration::from_secs(60)).window_label(),
            "1 minute"
        );
        assert_eq!(
            AppRateLimiter::new(10, Duration::from_secs(30)).window_label(),
            "30 seconds"
        );
        assert_eq!(
            AppRateLimiter::new(10, Duration::from_secs(120)).window_label(),
            "2 minutes"
        );
    }

    #[test]
    fn test_zero_max_clamped() {
        let limiter = AppRateLimiter::new(0, Duration::from_secs(60));
        assert_eq!(limiter.max(), 1);
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
