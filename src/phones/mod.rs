use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub mod model;

pub use model::{ProxyMethod, UpstreamResponse};

/// Product ids are forwarded as a single path segment.
static PRODUCT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid product id pattern"));

pub fn is_valid_product_id(id: &str) -> bool {
    PRODUCT_ID.is_match(id)
}

/// Seam over the external product API so routes can be tested without a network.
#[async_trait]
pub trait PhonesUpstream: Send + Sync {
    async fn forward(
        &self,
        method: ProxyMethod,
        id: Option<&str>,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse>;
}

#[derive(Clone)]
pub struct PhonesClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for PhonesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonesClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PhonesClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid phones API URL")?;
        let http = Client::builder()
            .user_agent(concat!("school-cms/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    /// `{base}` for collection calls, `{base}/{id}` for item calls.
    pub fn endpoint(&self, id: Option<&str>) -> Result<Url> {
        match id {
            None => Ok(self.base_url.clone()),
            Some(id) if is_valid_product_id(id) => {
                let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), id);
                Url::parse(&joined).context("invalid product URL")
            }
            Some(id) => Err(anyhow!("invalid product id {id:?}")),
        }
    }

    pub fn build_request(
        &self,
        method: ProxyMethod,
        id: Option<&str>,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let method = match method {
            ProxyMethod::Get => Method::GET,
            ProxyMethod::Post => Method::POST,
            ProxyMethod::Put => Method::PUT,
            ProxyMethod::Delete => Method::DELETE,
        };
        let mut builder = self
            .http
            .request(method, self.endpoint(id)?)
            .header("Accept", "*/*");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().context("failed to build phones request")
    }
}

#[async_trait]
impl PhonesUpstream for PhonesClient {
    async fn forward(
        &self,
        method: ProxyMethod,
        id: Option<&str>,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse> {
        let request = self.build_request(method, id, body)?;
        debug!(method = method.as_str(), url = %request.url(), "forwarding to phones API");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach phones API")?;
        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .context("failed to read phones API response")?;
        if !(200..300).contains(&status) {
            warn!(status, body = %body, "phones API returned an error");
        }
        Ok(UpstreamResponse { status, body })
    }
}
