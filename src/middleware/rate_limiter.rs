// Per-user rate limiting for payment submissions

use governor::{clock::Clock, clock::DefaultClock, DefaultKeyedRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct PaymentRateLimiter {
    /// `None` when the configured rate is zero (unlimited).
    limiter: Option<Arc<DefaultKeyedRateLimiter<Uuid>>>,
}

impl PaymentRateLimiter {
    pub fn per_minute(rate: u32) -> Self {
        Self {
            limiter: NonZeroU32::new(rate)
                .map(|rate| Arc::new(DefaultKeyedRateLimiter::keyed(Quota::per_minute(rate)))),
        }
    }

    pub fn check(&self, user_id: Uuid) -> AppResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter.check_key(&user_id).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            AppError::RateLimited {
                retry_after_secs: wait.as_secs().max(1),
            }
        })
    }
}
