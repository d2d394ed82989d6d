// UPYUN REST client (reqwest). Bearer-token auth; the bucket listing uses its own token.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{CollectionWindow, FlowSource, StatsFetcher};
use crate::config::UpyunConfig;
use crate::error::FetchError;
use crate::models::{AccountHealth, BandwidthSample, BandwidthSeries, BucketList, StatusCodeBucket};
use crate::version::{NAME, VERSION};

const BANDWIDTH_PATH: &str = "/v2/statistics";
const FLOW_DETAIL_PATH: &str = "/flow/common_data";
const HEALTH_PATH: &str = "/flow/health_degree";
const BUCKETS_PATH: &str = "/buckets";

/// Response bodies quoted in errors are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct UpyunClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    bucket_token: String,
}

impl UpyunClient {
    pub fn new(config: &UpyunConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(format!("{NAME}/{VERSION}"))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            bucket_token: config.bucket_token.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        token: &str,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.api_base, endpoint);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|source| FetchError::Transport { endpoint, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        decode_body(endpoint, subject, &body)
    }
}

#[async_trait]
impl StatsFetcher for UpyunClient {
    #[instrument(skip(self), fields(endpoint = BANDWIDTH_PATH))]
    async fn fetch_bandwidth(
        &self,
        domain: &str,
        window: CollectionWindow,
    ) -> Result<Vec<BandwidthSample>, FetchError> {
        let (start, end) = window.query_bounds_at(Utc::now());
        let query = bandwidth_query(domain, start, end);
        let series: BandwidthSeries = self
            .get_json(BANDWIDTH_PATH, &self.token, &query, domain)
            .await?;
        debug!(
            samples = series.data.len(),
            interval = series.interval.as_deref().unwrap_or("-"),
            "bandwidth series fetched"
        );
        Ok(series.data)
    }

    #[instrument(skip(self), fields(endpoint = FLOW_DETAIL_PATH))]
    async fn fetch_status_detail(
        &self,
        domain: &str,
        window: CollectionWindow,
        source: FlowSource,
    ) -> Result<Vec<StatusCodeBucket>, FetchError> {
        let (start, end) = window.query_bounds_at(Utc::now());
        let query = detail_query(domain, start, end, source);
        self.get_json(FLOW_DETAIL_PATH, &self.token, &query, domain)
            .await
    }

    #[instrument(skip(self), fields(endpoint = HEALTH_PATH))]
    async fn fetch_account_health(
        &self,
        window: CollectionWindow,
    ) -> Result<AccountHealth, FetchError> {
        let (start, end) = window.query_bounds_at(Utc::now());
        let query = vec![("start_time", start), ("end_time", end)];
        let body: HealthBody = self
            .get_json(HEALTH_PATH, &self.token, &query, "account")
            .await?;
        Ok(body.into_health())
    }

    #[instrument(skip(self), fields(endpoint = BUCKETS_PATH))]
    async fn fetch_domains(&self) -> Result<Vec<String>, FetchError> {
        let query = vec![
            ("business_type", "file".to_string()),
            ("type", "ucdn".to_string()),
        ];
        let list: BucketList = self
            .get_json(BUCKETS_PATH, &self.bucket_token, &query, "bucket list")
            .await?;
        Ok(list.into_domains())
    }
}

/// Health is a single record, or a series that gets summed.
#[derive(Deserialize)]
#[serde(untagged)]
enum HealthBody {
    Single(AccountHealth),
    Series(Vec<AccountHealth>),
}

impl HealthBody {
    fn into_health(self) -> AccountHealth {
        match self {
            HealthBody::Single(h) => h,
            HealthBody::Series(items) => {
                items
                    .iter()
                    .fold(AccountHealth::default(), |mut acc, h| {
                        acc.counts.merge(&h.counts);
                        acc.requests = acc.requests.saturating_add(h.requests);
                        acc
                    })
            }
        }
    }
}

fn bandwidth_query(domain: &str, start: String, end: String) -> Vec<(&'static str, String)> {
    vec![
        ("start_time", start),
        ("end_time", end),
        ("flow_type", "cdn".to_string()),
        ("flow_source", "backsource".to_string()),
        ("domain", domain.to_string()),
    ]
}

fn detail_query(
    domain: &str,
    start: String,
    end: String,
    source: FlowSource,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("start_time", start),
        ("end_time", end),
        ("query_type", "domain".to_string()),
        ("query_value", domain.to_string()),
        ("sum_data", "true".to_string()),
    ];
    match source {
        // `httpcode` covers 206..504 only, so 200 is requested explicitly.
        FlowSource::Cdn => {
            query.push(("full_region_isp", "true".to_string()));
            query.push(("fields", "httpcode,hit_bytes,hit,bytes,reqs,_200".to_string()));
        }
        FlowSource::Backsource => {
            query.push(("flow_source", source.as_str().to_string()));
        }
    }
    query
}

fn decode_body<T: DeserializeOwned>(
    endpoint: &'static str,
    subject: &str,
    body: &str,
) -> Result<T, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::Empty {
            endpoint,
            subject: subject.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|source| FetchError::Decode {
        endpoint,
        subject: subject.to_string(),
        source,
    })
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdn_detail_query_requests_hit_fields() {
        let q = detail_query("a.example.com", "s".into(), "e".into(), FlowSource::Cdn);
        assert!(q.contains(&("query_value", "a.example.com".to_string())));
        assert!(q.contains(&("full_region_isp", "true".to_string())));
        assert!(q.iter().any(|(k, v)| *k == "fields" && v.contains("_200")));
        assert!(!q.iter().any(|(k, _)| *k == "flow_source"));
    }

    #[test]
    fn backsource_detail_query_sets_flow_source() {
        let q = detail_query("a.example.com", "s".into(), "e".into(), FlowSource::Backsource);
        assert!(q.contains(&("flow_source", "backsource".to_string())));
        assert!(!q.iter().any(|(k, _)| *k == "fields"));
    }

    #[test]
    fn bandwidth_query_targets_domain() {
        let q = bandwidth_query("a.example.com", "s".into(), "e".into());
        assert!(q.contains(&("domain", "a.example.com".to_string())));
        assert!(q.contains(&("flow_type", "cdn".to_string())));
    }

    #[test]
    fn empty_body_is_empty_error() {
        let err = decode_body::<Vec<StatusCodeBucket>>(FLOW_DETAIL_PATH, "a", "  ").unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn object_body_for_detail_is_decode_error() {
        let err = decode_body::<Vec<StatusCodeBucket>>(FLOW_DETAIL_PATH, "a", "{}").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn health_series_is_summed() {
        let body: HealthBody =
            serde_json::from_str(r#"[{"_200": 3, "reqs": 4}, {"_200": 1, "_500": 2, "reqs": 3}]"#)
                .unwrap();
        let health = body.into_health();
        assert_eq!(health.requests, 7);
        assert_eq!(health.counts.total(), 6);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let out = truncate_body(&body);
        assert_eq!(out.len(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(truncate_body("short"), "short");
    }
}
