//! Client-side request limits for the analysis endpoint
//!
//! The per-minute limit waits for a free slot. The daily quota does not wait: once it
//! is used up, requests fail with `QuotaExceeded` until the local date changes.

use std::num::NonZeroU32;
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use crate::error::AnalysisError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
pub const DEFAULT_MAX_REQUESTS_PER_DAY: u32 = 1000;

#[derive(Debug)]
struct DailyCount {
    date: NaiveDate,
    used: u32,
}

pub struct ApiRateLimiter {
    /// None when the per-minute limit is disabled (configured as 0)
    per_minute: Option<DirectLimiter>,
    max_per_day: u32,
    daily: Mutex<DailyCount>,
}

impl ApiRateLimiter {
    /// A limit of 0 disables that limit
    pub fn new(requests_per_minute: u32, max_requests_per_day: u32) -> Self {
        let per_minute =
            NonZeroU32::new(requests_per_minute).map(|n| RateLimiter::direct(Quota::per_minute(n)));

        Self {
            per_minute,
            max_per_day: max_requests_per_day,
            daily: Mutex::new(DailyCount {
                date: Local::now().date_naive(),
                used: 0,
            }),
        }
    }

    /// Reserve one request: fail on an exhausted daily quota, otherwise wait for a
    /// per-minute slot
    pub async fn acquire(&self) -> Result<(), AnalysisError> {
        self.take_daily(Local::now().date_naive())?;

        if let Some(limiter) = &self.per_minute {
            if limiter.check().is_err() {
                debug!("Per-minute analysis limit reached, waiting for a slot");
                limiter.until_ready().await;
            }
        }
        Ok(())
    }

    /// Requests left today
    pub fn remaining_daily(&self) -> u32 {
        if self.max_per_day == 0 {
            return u32::MAX;
        }
        let today = Local::now().date_naive();
        let daily = self.daily.lock().unwrap_or_else(|e| e.into_inner());
        if daily.date != today {
            self.max_per_day
        } else {
            self.max_per_day.saturating_sub(daily.used)
        }
    }

    fn take_daily(&self, today: NaiveDate) -> Result<(), AnalysisError> {
        if self.max_per_day == 0 {
            return Ok(());
        }

        let mut daily = self.daily.lock().unwrap_or_else(|e| e.into_inner());
        if daily.date != today {
            daily.date = today;
            daily.used = 0;
        }
        if daily.used >= self.max_per_day {
            warn!(limit = self.max_per_day, "Daily analysis quota exhausted");
            return Err(AnalysisError::QuotaExceeded {
                limit: self.max_per_day,
            });
        }
        daily.used += 1;
        Ok(())
    }
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_MAX_REQUESTS_PER_DAY)
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("per_minute", &self.per_minute.is_some())
            .field("max_per_day", &self.max_per_day)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_daily_quota_is_enforced() {
        let limiter = ApiRateLimiter::new(0, 2);
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert_eq!(limiter.remaining_daily(), 0);
        assert!(matches!(
            limiter.acquire().await,
            Err(AnalysisError::QuotaExceeded { limit: 2 })
        ));
    }

    #[test]
    fn test_daily_quota_resets_on_new_date() {
        let limiter = ApiRateLimiter::new(0, 1);
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        limiter.take_daily(day).unwrap();
        assert!(limiter.take_daily(day).is_err());
        limiter.take_daily(day.succ_opt().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_zero_limits_disable_limiting() {
        let limiter = ApiRateLimiter::new(0, 0);
        for _ in 0..100 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(limiter.remaining_daily(), u32::MAX);
    }
}
