//! HTTP seam for export downloads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, REFERER};
use tracing::debug;

use crate::config::AssetConfig;
use crate::error::AssetError;
use crate::kind::ExportRequest;
use crate::Result;

/// Performs one GET against an export endpoint and returns the body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &ExportRequest) -> Result<Vec<u8>>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &AssetConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &ExportRequest) -> Result<Vec<u8>> {
        let mut builder = self.http_client.get(&request.url);
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer);
        }
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let body = response.bytes().await?;
        debug!(url = %request.url, bytes = body.len(), "Export downloaded");
        Ok(body.to_vec())
    }
}
