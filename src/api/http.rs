//! reqwest-backed [`TrackingApi`].
//!
//! GETs retry transient failures (timeouts, connect errors, 429, 5xx) with
//! backoff; mutations are sent once.

use async_trait::async_trait;
use backon::Retryable;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::{normalize_list, normalize_object};
use crate::config::ApiConfig;
use crate::interfaces::tracking_api::{ApiError, Result, TrackingApi};
use crate::model::{
    Dealer, EntityRef, Id, LocationRecord, Notification, OrderTracking, Warehouse, Workflow,
};
use crate::utils::retry::{http_backoff, is_retryable_error, is_retryable_status};

/// HTTP client for the portal backend.
pub struct HttpTrackingApi {
    client: Client,
    base_url: String,
    token: Option<String>,
    max_retries: usize,
}

impl HttpTrackingApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::InvalidRequest("base URL not configured".to_string()));
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON body, retrying transient failures.
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let attempt = || async move {
            let response = self.request(Method::GET, path).query(query).send().await?;
            let response = check_status(path, response).await?;
            Ok::<_, ApiError>(response.json::<Value>().await?)
        };

        attempt
            .retry(http_backoff(self.max_retries))
            .when(is_transient)
            .notify(|err, delay| {
                warn!(endpoint = path, error = %err, ?delay, "Retrying REST request");
            })
            .await
    }

    /// Send a body-less mutation once.
    async fn send(&self, method: Method, path: &str) -> Result<()> {
        let response = self.request(method, path).send().await?;
        check_status(path, response).await?;
        Ok(())
    }
}

fn is_transient(err: &ApiError) -> bool {
    match err {
        ApiError::Http(e) => is_retryable_error(e),
        ApiError::Status { status, .. } => reqwest::StatusCode::from_u16(*status)
            .map(is_retryable_status)
            .unwrap_or(false),
        _ => false,
    }
}

/// Map non-2xx responses to typed errors.
async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(200).collect();
    debug!(endpoint, status = %status, body = %body, "REST request failed");

    Err(match status.as_u16() {
        401 => ApiError::Unauthorized,
        403 => ApiError::Forbidden(endpoint.to_string()),
        404 => ApiError::NotFound(endpoint.to_string()),
        code => ApiError::Status {
            endpoint: endpoint.to_string(),
            status: code,
            body,
        },
    })
}

fn require_id(id: &Id, what: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ApiError::InvalidRequest(format!("empty {what} id")));
    }
    Ok(())
}

#[async_trait]
impl TrackingApi for HttpTrackingApi {
    #[tracing::instrument(name = "api.live_locations", skip(self))]
    async fn live_locations(&self, driver_phone: Option<&str>) -> Result<Vec<LocationRecord>> {
        let path = "/tracking/live-locations";
        let query: Vec<(&str, &str)> = driver_phone
            .filter(|p| !p.trim().is_empty())
            .map(|p| vec![("driverPhone", p.trim())])
            .unwrap_or_default();
        let body = self.get_json(path, &query).await?;
        normalize_list(path, body)
    }

    #[tracing::instrument(name = "api.order_tracking", skip(self), fields(order_id = %order_id))]
    async fn order_tracking(&self, order_id: &Id) -> Result<OrderTracking> {
        require_id(order_id, "order")?;
        let path = format!("/tracking/order/{order_id}");
        let body = self.get_json(&path, &[]).await?;
        normalize_object(&path, body)
    }

    #[tracing::instrument(name = "api.workflow", skip(self), fields(kind = %entity.kind, id = %entity.id))]
    async fn workflow(&self, entity: &EntityRef) -> Result<Workflow> {
        require_id(&entity.id, entity.kind.as_str())?;
        let path = format!("/workflow/{}/{}", entity.kind, entity.id);
        let body = self.get_json(&path, &[]).await?;
        normalize_object(&path, body)
    }

    #[tracing::instrument(name = "api.notifications", skip(self))]
    async fn notifications(&self) -> Result<Vec<Notification>> {
        let path = "/notifications";
        let body = self.get_json(path, &[]).await?;
        normalize_list(path, body)
    }

    #[tracing::instrument(name = "api.mark_notification_read", skip(self), fields(id = %id))]
    async fn mark_notification_read(&self, id: &Id) -> Result<()> {
        require_id(id, "notification")?;
        self.send(Method::PATCH, &format!("/notifications/{id}/read"))
            .await
    }

    #[tracing::instrument(name = "api.delete_notification", skip(self), fields(id = %id))]
    async fn delete_notification(&self, id: &Id) -> Result<()> {
        require_id(id, "notification")?;
        self.send(Method::DELETE, &format!("/notifications/{id}"))
            .await
    }

    #[tracing::instrument(name = "api.warehouses", skip(self))]
    async fn warehouses(&self) -> Result<Vec<Warehouse>> {
        let path = "/warehouses";
        let body = self.get_json(path, &[]).await?;
        normalize_list(path, body)
    }

    #[tracing::instrument(name = "api.dealers", skip(self))]
    async fn dealers(&self) -> Result<Vec<Dealer>> {
        let path = "/dealers";
        let body = self.get_json(path, &[]).await?;
        normalize_list(path, body)
    }
}
