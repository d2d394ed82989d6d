// Bandwidth / request time series (v2 statistics endpoint).

use serde::{Deserialize, Serialize};

use super::lenient::f64_lenient;

/// One time bucket of edge traffic. Buckets are five minutes wide upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandwidthSample {
    #[serde(rename = "reqs", default, deserialize_with = "f64_lenient")]
    pub requests: f64,
    /// Bytes per second averaged over the bucket.
    #[serde(default, deserialize_with = "f64_lenient")]
    pub bandwidth: f64,
    #[serde(default, deserialize_with = "f64_lenient")]
    pub bytes: f64,
    #[serde(default, deserialize_with = "f64_lenient")]
    pub time: f64,
}

/// Response envelope of the bandwidth endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BandwidthSeries {
    #[serde(default)]
    pub data: Vec<BandwidthSample>,
    #[serde(default)]
    pub interval: Option<String>,
}
