// Sample types decoded from the UPYUN statistics API

mod domain;
mod lenient;
mod status;
mod traffic;

pub use domain::{Bucket, BucketDomain, BucketList, DomainSnapshot};
pub use status::{AccountHealth, StatusCode, StatusCodeBucket, StatusCounts, StatusGroup};
pub use traffic::{BandwidthSample, BandwidthSeries};
