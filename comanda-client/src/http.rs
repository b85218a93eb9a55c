//! HTTP client for the Comanda server API
//!
//! Thin reqwest wrapper that unpacks the server's response envelope
//! (`{ code, message, data }`) and maps non-success codes onto
//! [`ClientError`].

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shared::models::{ClosedDay, MenuEntry, Order};
use shared::sync::{BatchRequest, BatchResponse};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

const SUCCESS_CODE: &str = "E0000";

/// Server response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    message: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

/// HTTP client for one server
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tenant_id: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::unpack(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;
        Self::unpack(response).await
    }

    async fn unpack<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let envelope: Envelope<T> = response.json().await?;
        if envelope.code != SUCCESS_CODE {
            return Err(ClientError::Server {
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope
            .data
            .ok_or_else(|| ClientError::InvalidResponse("missing data field".into()))
    }

    // ========== Sync API ==========

    /// Push a batch of queued operations
    pub async fn submit_batch(&self, batch: &BatchRequest) -> ClientResult<BatchResponse> {
        self.post("/api/sync/batch", batch).await
    }

    // ========== Orders API ==========

    pub async fn create_order<B: serde::Serialize>(&self, order: &B) -> ClientResult<Order> {
        self.post("/api/orders", order).await
    }

    pub async fn fetch_order(&self, id: &str) -> ClientResult<Order> {
        self.get(&format!("/api/orders/{id}")).await
    }

    pub async fn fetch_active_orders(&self) -> ClientResult<Vec<Order>> {
        self.get(&format!("/api/orders/active?tenant_id={}", self.tenant_id))
            .await
    }

    // ========== Menu API ==========

    pub async fn fetch_menu(&self) -> ClientResult<Vec<MenuEntry>> {
        self.get(&format!("/api/menu?tenant_id={}", self.tenant_id))
            .await
    }

    pub async fn upsert_menu_entry(&self, entry: &MenuEntry) -> ClientResult<MenuEntry> {
        self.post("/api/menu", entry).await
    }

    // ========== Day API ==========

    pub async fn close_day(&self) -> ClientResult<ClosedDay> {
        #[derive(serde::Serialize)]
        struct CloseRequest<'a> {
            tenant_id: &'a str,
        }
        self.post(
            "/api/day/close",
            &CloseRequest {
                tenant_id: &self.tenant_id,
            },
        )
        .await
    }

    pub async fn fetch_closed_days(&self) -> ClientResult<Vec<ClosedDay>> {
        self.get(&format!("/api/day/closed?tenant_id={}", self.tenant_id))
            .await
    }
}
