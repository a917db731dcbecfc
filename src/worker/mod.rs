// Cache router, the service-worker side: fetch interception, caching strategies, cache lifecycle.

pub mod cache_set;
pub mod lifecycle;
pub mod network;
pub mod request;
pub mod router;
pub mod stats;
pub mod storage;
mod strategies;
