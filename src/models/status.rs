// HTTP status-code buckets (flow/common_data endpoint) and the account-wide health record.
//
// The wire format carries one `_NNN` field per status code. Only the codes in `StatusCode::ALL`
// are kept; anything else is dropped while decoding and never reaches a ratio denominator.

use serde::{Deserialize, Serialize};

use super::lenient::{f64_lenient, u64_lenient};

/// The closed set of status codes the exporter classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StatusCode {
    Ok200,
    Partial206,
    Moved301,
    /// 302 and 303 share one slot.
    Found302,
    NotModified304,
    BadRequest400,
    Forbidden403,
    NotFound404,
    LengthRequired411,
    ClientClosed499,
    Internal500,
    BadGateway502,
    Unavailable503,
    GatewayTimeout504,
}

const CODE_COUNT: usize = 14;

impl StatusCode {
    pub const ALL: [StatusCode; CODE_COUNT] = [
        StatusCode::Ok200,
        StatusCode::Partial206,
        StatusCode::Moved301,
        StatusCode::Found302,
        StatusCode::NotModified304,
        StatusCode::BadRequest400,
        StatusCode::Forbidden403,
        StatusCode::NotFound404,
        StatusCode::LengthRequired411,
        StatusCode::ClientClosed499,
        StatusCode::Internal500,
        StatusCode::BadGateway502,
        StatusCode::Unavailable503,
        StatusCode::GatewayTimeout504,
    ];

    /// Label value used for the `status` label.
    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Ok200 => "200",
            StatusCode::Partial206 => "206",
            StatusCode::Moved301 => "301",
            StatusCode::Found302 => "302",
            StatusCode::NotModified304 => "304",
            StatusCode::BadRequest400 => "400",
            StatusCode::Forbidden403 => "403",
            StatusCode::NotFound404 => "404",
            StatusCode::LengthRequired411 => "411",
            StatusCode::ClientClosed499 => "499",
            StatusCode::Internal500 => "500",
            StatusCode::BadGateway502 => "502",
            StatusCode::Unavailable503 => "503",
            StatusCode::GatewayTimeout504 => "504",
        }
    }

    pub fn group(self) -> StatusGroup {
        match self {
            StatusCode::Ok200 | StatusCode::Partial206 => StatusGroup::Success,
            StatusCode::Moved301 | StatusCode::Found302 | StatusCode::NotModified304 => {
                StatusGroup::Redirect
            }
            StatusCode::BadRequest400
            | StatusCode::Forbidden403
            | StatusCode::NotFound404
            | StatusCode::LengthRequired411
            | StatusCode::ClientClosed499 => StatusGroup::ClientError,
            StatusCode::Internal500
            | StatusCode::BadGateway502
            | StatusCode::Unavailable503
            | StatusCode::GatewayTimeout504 => StatusGroup::ServerError,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 2xx / 3xx / 4xx / 5xx roll-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StatusGroup {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusGroup {
    pub const ALL: [StatusGroup; 4] = [
        StatusGroup::Success,
        StatusGroup::Redirect,
        StatusGroup::ClientError,
        StatusGroup::ServerError,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusGroup::Success => "2xx",
            StatusGroup::Redirect => "3xx",
            StatusGroup::ClientError => "4xx",
            StatusGroup::ServerError => "5xx",
        }
    }
}

/// Per-code counters indexed by `StatusCode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts([u64; CODE_COUNT]);

impl StatusCounts {
    pub fn get(&self, code: StatusCode) -> u64 {
        self.0[code.index()]
    }

    pub fn add(&mut self, code: StatusCode, n: u64) {
        let slot = &mut self.0[code.index()];
        *slot = slot.saturating_add(n);
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        for code in StatusCode::ALL {
            self.add(code, other.get(code));
        }
    }

    /// Sum over every classified code.
    pub fn total(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn group_total(&self, group: StatusGroup) -> u64 {
        StatusCode::ALL
            .iter()
            .filter(|c| c.group() == group)
            .fold(0u64, |acc, c| acc.saturating_add(self.get(*c)))
    }
}

impl FromIterator<(StatusCode, u64)> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = (StatusCode, u64)>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for (code, n) in iter {
            counts.add(code, n);
        }
        counts
    }
}

/// One time bucket of the status-code detail series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(from = "RawStatusBucket")]
pub struct StatusCodeBucket {
    pub counts: StatusCounts,
    pub requests: u64,
    pub bytes: u64,
    pub hit_bytes: u64,
    pub hits: u64,
    /// Bytes per second.
    pub bandwidth: f64,
}

/// Account-wide status counters, not tied to a domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(from = "RawStatusBucket")]
pub struct AccountHealth {
    pub counts: StatusCounts,
    pub requests: u64,
}

#[derive(Deserialize)]
struct RawStatusBucket {
    #[serde(rename = "_200", default, deserialize_with = "u64_lenient")]
    c200: u64,
    #[serde(rename = "_206", default, deserialize_with = "u64_lenient")]
    c206: u64,
    #[serde(rename = "_301", default, deserialize_with = "u64_lenient")]
    c301: u64,
    #[serde(rename = "_302", default, deserialize_with = "u64_lenient")]
    c302: u64,
    #[serde(rename = "_303", default, deserialize_with = "u64_lenient")]
    c303: u64,
    #[serde(rename = "_304", default, deserialize_with = "u64_lenient")]
    c304: u64,
    #[serde(rename = "_400", default, deserialize_with = "u64_lenient")]
    c400: u64,
    #[serde(rename = "_403", default, deserialize_with = "u64_lenient")]
    c403: u64,
    #[serde(rename = "_404", default, deserialize_with = "u64_lenient")]
    c404: u64,
    #[serde(rename = "_411", default, deserialize_with = "u64_lenient")]
    c411: u64,
    #[serde(rename = "_499", default, deserialize_with = "u64_lenient")]
    c499: u64,
    #[serde(rename = "_500", default, deserialize_with = "u64_lenient")]
    c500: u64,
    #[serde(rename = "_502", default, deserialize_with = "u64_lenient")]
    c502: u64,
    #[serde(rename = "_503", default, deserialize_with = "u64_lenient")]
    c503: u64,
    #[serde(rename = "_504", default, deserialize_with = "u64_lenient")]
    c504: u64,
    #[serde(default, deserialize_with = "f64_lenient")]
    bandwidth: f64,
    #[serde(default, deserialize_with = "u64_lenient")]
    reqs: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    hit_bytes: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    hit: u64,
    #[serde(default, deserialize_with = "u64_lenient")]
    bytes: u64,
}

impl RawStatusBucket {
    fn counts(&self) -> StatusCounts {
        [
            (StatusCode::Ok200, self.c200),
            (StatusCode::Partial206, self.c206),
            (StatusCode::Moved301, self.c301),
            (StatusCode::Found302, self.c302),
            (StatusCode::Found302, self.c303),
            (StatusCode::NotModified304, self.c304),
            (StatusCode::BadRequest400, self.c400),
            (StatusCode::Forbidden403, self.c403),
            (StatusCode::NotFound404, self.c404),
            (StatusCode::LengthRequired411, self.c411),
            (StatusCode::ClientClosed499, self.c499),
            (StatusCode::Internal500, self.c500),
            (StatusCode::BadGateway502, self.c502),
            (StatusCode::Unavailable503, self.c503),
            (StatusCode::GatewayTimeout504, self.c504),
        ]
        .into_iter()
        .collect()
    }
}

impl From<RawStatusBucket> for StatusCodeBucket {
    fn from(raw: RawStatusBucket) -> Self {
        StatusCodeBucket {
            counts: raw.counts(),
            requests: raw.reqs,
            bytes: raw.bytes,
            hit_bytes: raw.hit_bytes,
            hits: raw.hit,
            bandwidth: raw.bandwidth,
        }
    }
}

impl From<RawStatusBucket> for AccountHealth {
    fn from(raw: RawStatusBucket) -> Self {
        AccountHealth {
            counts: raw.counts(),
            requests: raw.reqs,
        }
    }
}
