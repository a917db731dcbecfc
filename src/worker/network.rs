use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderName, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use super::request::{FetchRequest, FetchResponse};

/// The network as seen from the worker. `Err` means no response at all;
/// an HTTP error status is still `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Redirects are handed back to the caller instead of being followed.
    pub fn new() -> Result<Self> {
        let client = Client::builder().redirect(Policy::none()).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Headers owned by a single connection, never forwarded.
pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    *name == HOST || *name == CONNECTION || *name == TRANSFER_ENCODING || *name == CONTENT_LENGTH
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self.client.request(req.method.clone(), req.url.clone());
        for (name, value) in req.headers.iter() {
            if !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }
        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        debug!(
            "network {} {} -> {} ({} bytes)",
            req.method,
            req.url,
            status.as_u16(),
            body.len()
        );

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
