// =============================================================================
// Rate-Limit Tracker: request weight budget for the Binance REST API
// =============================================================================
//
// Binance allows 1200 request weight per minute per IP; we cap ourselves at
// 1000. The `X-MBX-USED-WEIGHT-1M` header of every response is the source of
// truth. A reading older than one minute is stale: the exchange window has
// rolled over, so it no longer blocks requests.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ScanError;

/// Hard ceiling at which we refuse to send additional requests.
pub const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;
/// Length of the exchange's weight window.
const WEIGHT_WINDOW: Duration = Duration::from_secs(60);

/// Thread-safe request weight tracker.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    last_update: Mutex<Option<Instant>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            last_update: Mutex::new(None),
        }
    }

    /// Record the used weight reported by the exchange.
    pub fn record_used_weight(&self, weight: u32) {
        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        *self.last_update.lock() = Some(Instant::now());

        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated");
    }

    /// Update from the HTTP response headers returned by Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let weight = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok());
        if let Some(weight) = weight {
            self.record_used_weight(weight);
        }
    }

    /// Weight used in the current window; 0 once the last reading is stale.
    pub fn used_weight(&self) -> u32 {
        let fresh = self
            .last_update
            .lock()
            .is_some_and(|at| at.elapsed() < WEIGHT_WINDOW);
        if fresh {
            self.used_weight_1m.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Check that `weight` more request weight fits under the hard limit.
    pub fn check(&self, weight: u32) -> Result<(), ScanError> {
        let used = self.used_weight();
        if used.saturating_add(weight) <= WEIGHT_HARD_LIMIT {
            return Ok(());
        }
        warn!(
            current_weight = used,
            requested_weight = weight,
            hard_limit = WEIGHT_HARD_LIMIT,
            "request blocked — would exceed rate-limit"
        );
        Err(ScanError::RateLimited {
            used,
            requested: weight,
            limit: WEIGHT_HARD_LIMIT,
        })
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn fresh_tracker_allows_requests() {
        let tracker = RateLimitTracker::new();
        assert_eq!(tracker.used_weight(), 0);
        assert!(tracker.check(WEIGHT_HARD_LIMIT).is_ok());
    }

    #[test]
    fn header_updates_weight() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("420"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.used_weight(), 420);
    }

    #[test]
    fn malformed_header_is_ignored() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("lots"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.used_weight(), 0);
    }

    #[test]
    fn blocks_requests_over_the_cap() {
        let tracker = RateLimitTracker::new();
        tracker.record_used_weight(990);
        assert!(tracker.check(10).is_ok());
        let err = tracker.check(11).unwrap_err();
        assert_eq!(
            err,
            ScanError::RateLimited {
                used: 990,
                requested: 11,
                limit: WEIGHT_HARD_LIMIT
            }
        );
    }
}
