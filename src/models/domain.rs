// Monitored domains: the bucket listing as returned by the API, and the immutable
// snapshot handed to each collection cycle.

use serde::Deserialize;
use std::sync::Arc;

/// Substrings of provider-owned test domains that are never monitored.
const EXCLUDED_DOMAIN_MARKERS: [&str; 2] = ["upaiyun", "upcdn"];

/// Domains visible to one collection cycle. Cloning shares the underlying list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSnapshot(Arc<[String]>);

impl DomainSnapshot {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(domains.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a DomainSnapshot {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketList {
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub bucket_id: i64,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub domains: Vec<BucketDomain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketDomain {
    pub domain: String,
    #[serde(default)]
    pub status: String,
}

impl BucketList {
    /// Customer domains across all buckets, in listing order, without provider test
    /// domains or duplicates.
    pub fn into_domains(self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for bucket in self.buckets {
            for d in bucket.domains {
                let excluded = EXCLUDED_DOMAIN_MARKERS
                    .iter()
                    .any(|marker| d.domain.contains(marker));
                if excluded || d.domain.is_empty() || out.contains(&d.domain) {
                    continue;
                }
                out.push(d.domain);
            }
        }
        out
    }
}
