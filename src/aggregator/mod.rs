// Reduction of one cycle's samples into point-in-time gauges.
//
// Every function here is pure. A `None` result means the input is degenerate (no samples,
// zero totals, zero denominators) and nothing must be emitted for that family; callers
// never substitute zeros.

use crate::models::{
    AccountHealth, BandwidthSample, StatusCode, StatusCodeBucket, StatusCounts, StatusGroup,
};

/// Width of one upstream sample bucket, used for the per-minute request rate.
pub const SAMPLE_GRANULARITY_MINUTES: f64 = 5.0;

/// Bandwidth is reported in MiB/s for every family (bytes / 1024²).
pub const BYTES_PER_MEBIBYTE: f64 = 1024.0 * 1024.0;

/// Per-bucket averages of one traffic series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficAverages {
    pub requests_per_minute: f64,
    pub bandwidth_mib: f64,
}

/// Object and byte cache hit ratios in percent. Either side is `None` when no bucket had a
/// non-zero denominator for it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HitRates {
    pub object_pct: Option<f64>,
    pub byte_pct: Option<f64>,
}

impl HitRates {
    pub fn is_empty(&self) -> bool {
        self.object_pct.is_none() && self.byte_pct.is_none()
    }
}

/// Percentages per `status` label, in exposition order (codes of a class, then the class).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRates {
    entries: Vec<(&'static str, f64)>,
}

impl StatusRates {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
    }

    pub fn code(&self, code: StatusCode) -> f64 {
        self.get(code.label()).unwrap_or(0.0)
    }

    pub fn group(&self, group: StatusGroup) -> f64 {
        self.get(group.label()).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Back-source traffic. The two halves are guarded independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OriginTraffic {
    pub averages: Option<TrafficAverages>,
    pub status: Option<StatusRates>,
}

impl OriginTraffic {
    pub fn is_empty(&self) -> bool {
        self.averages.is_none() && self.status.is_none()
    }
}

/// Average requests and bandwidth per bucket of the edge traffic series.
pub fn average_bandwidth_and_requests(samples: &[BandwidthSample]) -> Option<TrafficAverages> {
    let (requests, bandwidth) = samples
        .iter()
        .fold((0.0, 0.0), |(r, b), s| (r + s.requests, b + s.bandwidth));
    averages(requests, bandwidth, samples.len())
}

/// Share of each status code and status class among all classified responses.
///
/// Only codes in `StatusCode::ALL` take part; other codes never reached the decoded buckets,
/// so the denominator is the classified total rather than the bucket request count.
pub fn classify_status_codes(buckets: &[StatusCodeBucket]) -> Option<StatusRates> {
    let mut counts = StatusCounts::default();
    for b in buckets {
        counts.merge(&b.counts);
    }
    status_rates(&counts)
}

/// Cache hit ratios as the mean of per-bucket ratios (not hits summed over requests summed).
/// Buckets with a zero denominator do not take part in that side's mean.
pub fn hit_rate(buckets: &[StatusCodeBucket]) -> HitRates {
    HitRates {
        object_pct: mean_ratio_pct(buckets.iter().map(|b| (b.hits, b.requests))),
        byte_pct: mean_ratio_pct(buckets.iter().map(|b| (b.hit_bytes, b.bytes))),
    }
}

/// Bandwidth/request averages and status classification of back-source buckets.
pub fn origin_traffic_aggregate(buckets: &[StatusCodeBucket]) -> OriginTraffic {
    let (requests, bandwidth) = buckets
        .iter()
        .fold((0.0, 0.0), |(r, bw), b| (r + b.requests as f64, bw + b.bandwidth));
    OriginTraffic {
        averages: averages(requests, bandwidth, buckets.len()),
        status: classify_status_codes(buckets),
    }
}

/// Status classification of the account-wide health record.
pub fn classify_account_health(health: &AccountHealth) -> Option<StatusRates> {
    status_rates(&health.counts)
}

/// Rounds to three decimals, the precision every percentage is published with.
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn averages(requests_total: f64, bandwidth_total: f64, n: usize) -> Option<TrafficAverages> {
    if n == 0 || requests_total == 0.0 || bandwidth_total == 0.0 {
        return None;
    }
    let n = n as f64;
    let out = TrafficAverages {
        requests_per_minute: requests_total / n / SAMPLE_GRANULARITY_MINUTES,
        bandwidth_mib: bandwidth_total / n / BYTES_PER_MEBIBYTE,
    };
    (out.requests_per_minute.is_finite() && out.bandwidth_mib.is_finite()).then_some(out)
}

/// Group shares sum to exactly 100 before rounding. Each published value is rounded on its
/// own, so the published groups can sum to 100 ± 0.002.
fn status_rates(counts: &StatusCounts) -> Option<StatusRates> {
    let total = counts.total();
    if total == 0 {
        return None;
    }
    let pct = |n: u64| round3(n as f64 / total as f64 * 100.0);

    let mut entries = Vec::with_capacity(StatusCode::ALL.len() + StatusGroup::ALL.len());
    for group in StatusGroup::ALL {
        for code in StatusCode::ALL.iter().filter(|c| c.group() == group) {
            entries.push((code.label(), pct(counts.get(*code))));
        }
        entries.push((group.label(), pct(counts.group_total(group))));
    }
    Some(StatusRates { entries })
}

fn mean_ratio_pct(pairs: impl Iterator<Item = (u64, u64)>) -> Option<f64> {
    let (sum, n) = pairs
        .filter(|(_, den)| *den > 0)
        .fold((0.0, 0usize), |(sum, n), (num, den)| {
            (sum + num as f64 / den as f64, n + 1)
        });
    if n == 0 {
        return None;
    }
    Some(round3(sum / n as f64 * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round3_keeps_three_decimals() {
        assert_eq!(round3(66.666_666), 66.667);
        assert_eq!(round3(12.0), 12.0);
        assert_eq!(round3(0.000_4), 0.0);
    }

    #[test]
    fn averages_guard_zero_and_empty() {
        assert!(averages(0.0, 10.0, 3).is_none());
        assert!(averages(10.0, 0.0, 3).is_none());
        assert!(averages(10.0, 10.0, 0).is_none());
        assert!(averages(f64::INFINITY, 10.0, 1).is_none());
    }

    #[test]
    fn mean_ratio_skips_zero_denominators() {
        let got = mean_ratio_pct([(1, 2), (0, 0), (1, 1)].into_iter());
        assert_eq!(got, Some(75.0));
        assert_eq!(mean_ratio_pct([(0, 0)].into_iter()), None);
    }
}
