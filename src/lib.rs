// Library for tests to access modules

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod routes;
pub mod sink;
pub mod version;
pub mod worker;
