//! HTTP client for the CMS routes, used by the headless views and the seeder.

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::model::{Envelope, Record};
use crate::resource::Resource;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// Non-2xx status or a `success: false` envelope.
    #[error("{status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|s| s.as_u16()),
            ClientError::Url(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CmsClient {
    http: Client,
    base_url: Url,
}

impl CmsClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!("school-cms/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    /// One page, newest first.
    pub async fn list(
        &self,
        resource: &Resource,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Record>, ClientError> {
        let mut url = self.url(resource.path)?;
        url.query_pairs_mut()
            .append_pair("start", &start.to_string())
            .append_pair("limit", &limit.to_string());
        debug!(%url, "listing records");
        let res = self.http.get(url).send().await?;
        unwrap_envelope(res).await
    }

    pub async fn get(&self, resource: &Resource, id: i64) -> Result<Record, ClientError> {
        let url = self.url(&format!("{}/{}", resource.path, id))?;
        let res = self.http.get(url).send().await?;
        unwrap_envelope(res).await
    }

    pub async fn create<T: Serialize + ?Sized>(
        &self,
        resource: &Resource,
        item: &T,
    ) -> Result<Record, ClientError> {
        let res = self
            .http
            .post(self.url(resource.path)?)
            .json(item)
            .send()
            .await?;
        first_record(unwrap_envelope(res).await?)
    }

    /// `fields` must be a JSON object; `id` is added to it.
    pub async fn update(
        &self,
        resource: &Resource,
        id: i64,
        fields: &Value,
    ) -> Result<Record, ClientError> {
        let mut body = fields.clone();
        if let Some(map) = body.as_object_mut() {
            map.insert("id".into(), json!(id));
        }
        let res = self
            .http
            .put(self.url(resource.path)?)
            .json(&body)
            .send()
            .await?;
        first_record(unwrap_envelope(res).await?)
    }

    pub async fn delete(&self, resource: &Resource, id: i64) -> Result<Record, ClientError> {
        let res = self
            .http
            .delete(self.url(resource.path)?)
            .json(&json!({ "id": id }))
            .send()
            .await?;
        first_record(unwrap_envelope(res).await?)
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, ClientError> {
    let status = res.status();
    let envelope: Envelope<T> = match res.json().await {
        Ok(envelope) => envelope,
        Err(err) if status.is_success() => return Err(err.into()),
        Err(_) => {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            })
        }
    };
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } if status.is_success() => Ok(data),
        Envelope { message, .. } => Err(ClientError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| "request failed".to_string()),
        }),
    }
}

fn first_record(records: Vec<Record>) -> Result<Record, ClientError> {
    records.into_iter().next().ok_or_else(|| ClientError::Api {
        status: 200,
        message: "response contained no record".to_string(),
    })
}
