// Statistics API access. Collection code depends on `StatsFetcher` only.

mod upyun;

pub use upyun::UpyunClient;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::error::FetchError;
use crate::models::{AccountHealth, BandwidthSample, StatusCodeBucket};

/// The statistics API reports and expects local time in UTC+8.
const API_UTC_OFFSET_HOURS: i64 = 8;
const API_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which traffic the status-code detail call describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowSource {
    /// Edge traffic served to clients.
    Cdn,
    /// Requests the edge forwarded to the origin.
    Backsource,
}

impl FlowSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowSource::Cdn => "cdn",
            FlowSource::Backsource => "backsource",
        }
    }
}

/// Longest lookback the statistics API is asked for (30 days).
pub const MAX_WINDOW_SECONDS: u64 = 30 * 24 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("range_seconds ({range}) must be greater than delay_seconds ({delay})")]
    Inverted { range: u64, delay: u64 },
    #[error("range_seconds ({0}) must be <= {max}", max = MAX_WINDOW_SECONDS)]
    TooLong(u64),
}

/// Lookback window: from `now - range_seconds` to `now - delay_seconds`. The delay compensates
/// for upstream reporting lag. Always `delay < range <= MAX_WINDOW_SECONDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    range_seconds: u64,
    delay_seconds: u64,
}

impl CollectionWindow {
    pub fn new(range_seconds: u64, delay_seconds: u64) -> Result<Self, WindowError> {
        if range_seconds > MAX_WINDOW_SECONDS {
            return Err(WindowError::TooLong(range_seconds));
        }
        if range_seconds <= delay_seconds {
            return Err(WindowError::Inverted {
                range: range_seconds,
                delay: delay_seconds,
            });
        }
        Ok(Self {
            range_seconds,
            delay_seconds,
        })
    }

    pub fn range_seconds(&self) -> u64 {
        self.range_seconds
    }

    pub fn delay_seconds(&self) -> u64 {
        self.delay_seconds
    }

    /// Start and end as naive API-local timestamps.
    pub fn bounds_at(&self, now: DateTime<Utc>) -> (NaiveDateTime, NaiveDateTime) {
        let local = now.naive_utc() + TimeDelta::hours(API_UTC_OFFSET_HOURS);
        // both offsets are bounded by MAX_WINDOW_SECONDS
        let start = local - TimeDelta::seconds(self.range_seconds as i64);
        let end = local - TimeDelta::seconds(self.delay_seconds as i64);
        (start, end)
    }

    /// `(start_time, end_time)` query values.
    pub fn query_bounds_at(&self, now: DateTime<Utc>) -> (String, String) {
        let (start, end) = self.bounds_at(now);
        (
            start.format(API_TIME_FORMAT).to_string(),
            end.format(API_TIME_FORMAT).to_string(),
        )
    }
}

#[async_trait]
pub trait StatsFetcher: Send + Sync {
    /// Edge bandwidth/request series of one domain.
    async fn fetch_bandwidth(
        &self,
        domain: &str,
        window: CollectionWindow,
    ) -> Result<Vec<BandwidthSample>, FetchError>;

    /// Status-code detail buckets of one domain for the given traffic source.
    async fn fetch_status_detail(
        &self,
        domain: &str,
        window: CollectionWindow,
        source: FlowSource,
    ) -> Result<Vec<StatusCodeBucket>, FetchError>;

    /// Account-wide status counters.
    async fn fetch_account_health(
        &self,
        window: CollectionWindow,
    ) -> Result<AccountHealth, FetchError>;

    /// Domains currently configured on the account.
    async fn fetch_domains(&self) -> Result<Vec<String>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_bounds_are_api_local_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        let window = CollectionWindow::new(1800, 300).unwrap();
        let (start, end) = window.query_bounds_at(now);
        assert_eq!(start, "2024-03-01 08:00:00");
        assert_eq!(end, "2024-03-01 08:25:00");
    }

    #[test]
    fn window_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 16, 10, 0).unwrap();
        let (start, end) = CollectionWindow::new(1800, 0).unwrap().query_bounds_at(now);
        assert_eq!(start, "2024-03-01 23:40:00");
        assert_eq!(end, "2024-03-02 00:10:00");
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        assert_eq!(
            CollectionWindow::new(300, 300),
            Err(WindowError::Inverted {
                range: 300,
                delay: 300
            })
        );
        assert!(CollectionWindow::new(60, 600).is_err());
    }

    #[test]
    fn window_rejects_ranges_past_thirty_days() {
        assert_eq!(
            CollectionWindow::new(u64::MAX, 0),
            Err(WindowError::TooLong(u64::MAX))
        );
        let longest = CollectionWindow::new(MAX_WINDOW_SECONDS, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let (start, _) = longest.query_bounds_at(now);
        assert_eq!(start, "2024-03-01 08:00:00");
    }

    #[test]
    fn flow_source_query_values() {
        assert_eq!(FlowSource::Cdn.as_str(), "cdn");
        assert_eq!(FlowSource::Backsource.as_str(), "backsource");
    }
}
