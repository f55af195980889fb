//! Content store backed by an HTTP gateway.
//!
//! Uploads are `POST`ed as JSON `{ "data": <base64>, "tags": [...] }` to the
//! upload endpoint, which answers `{ "id": <objectId> }`. Reads are plain
//! `GET`s of the locator URL.

use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use iryshare_core::{Locator, ObjectId};

use crate::content::{ContentStore, Tag};
use crate::error::{Result, StoreError};

#[derive(Serialize)]
struct UploadBody<'a> {
    data: String,
    tags: &'a [Tag],
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

/// HTTP gateway client.
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    http: Client,
    gateway: Url,
    upload_url: Url,
}

impl HttpContentStore {
    /// Create a client. `timeout` applies to every request when set.
    pub fn new(gateway: Url, upload_url: Url, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            gateway,
            upload_url,
        })
    }

    pub fn gateway(&self) -> &Url {
        &self.gateway
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn upload(&self, data: Bytes, tags: &[Tag]) -> Result<ObjectId> {
        let body = UploadBody {
            data: Base64::encode_string(&data),
            tags,
        };

        let response = self
            .http
            .post(self.upload_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Upload(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "gateway rejected upload");
            return Err(StoreError::Upload(format!("gateway returned {status}: {detail}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Network(format!("reading upload response failed: {e}")))?;
        let id = parse_upload_response(&body)?;

        debug!(object_id = %id, bytes = data.len(), "uploaded object");
        Ok(id)
    }

    async fn fetch(&self, locator: &Locator) -> Result<Bytes> {
        let response = self
            .http
            .get(locator.url().clone())
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("GET {locator} failed: {e}")))?;

        match response.status() {
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|e| StoreError::Network(format!("reading {locator} failed: {e}"))),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(locator.to_string())),
            status => Err(StoreError::Http {
                status: status.as_u16(),
                url: locator.to_string(),
            }),
        }
    }

    fn locator(&self, id: &ObjectId) -> Result<Locator> {
        Ok(Locator::new(&self.gateway, id.clone())?)
    }
}

fn parse_upload_response(body: &[u8]) -> Result<ObjectId> {
    let parsed: UploadResponse = serde_json::from_slice(body)
        .map_err(|e| StoreError::Serialization(format!("invalid upload response: {e}")))?;
    Ok(ObjectId::new(parsed.id)?)
}
