use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::stripe_api::{
        FieldUpdate, RemoteCustomer, RemotePlan, RemoteSubscription, StripeApi, SubscriptionPatch,
    },
    infra::http_client::build_client,
};

const LIST_PAGE_SIZE: &str = "100";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    error_type: String,
    message: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

/// Form parameters for a subscription update. Fields left unset in the
/// patch are not sent; clearing `tax_percent` sends the empty value.
pub fn patch_form(patch: &SubscriptionPatch) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();

    if let Some(quantity) = patch.quantity {
        params.push(("quantity".to_string(), quantity.to_string()));
    }
    if let Some(plan) = &patch.plan {
        params.push(("plan".to_string(), plan.clone()));
    }
    if let Some(trial_end) = patch.trial_end {
        params.push(("trial_end".to_string(), trial_end.timestamp().to_string()));
    }
    if let Some(cancel_at_period_end) = patch.cancel_at_period_end {
        params.push((
            "cancel_at_period_end".to_string(),
            cancel_at_period_end.to_string(),
        ));
    }
    match &patch.tax_percent {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => params.push(("tax_percent".to_string(), String::new())),
        FieldUpdate::Set(value) => params.push(("tax_percent".to_string(), value.to_string())),
    }
    if let Some(prorate) = patch.prorate {
        let behavior = if prorate { "create_prorations" } else { "none" };
        params.push(("proration_behavior".to_string(), behavior.to_string()));
    }

    params
}

impl StripeClient {
    pub fn new(secret_key: SecretString, base_url: &Url) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client()?,
            secret_key,
            base_url: base_url.clone(),
        })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Payment platform base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self
            .client
            .get(self.url(segments)?)
            .header("Authorization", self.auth_header())
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        self.handle_response(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(String, String)],
    ) -> AppResult<T> {
        let response = self
            .client
            .post(self.url(segments)?)
            .header("Authorization", self.auth_header())
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        self.handle_response(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> AppResult<T> {
        let response = self
            .client
            .delete(self.url(segments)?)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(transport_error)?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let detail = serde_json::from_str::<StripeErrorResponse>(&body)
                .map(|e| {
                    let message = e.error.message.unwrap_or(e.error.error_type);
                    match e.error.code {
                        Some(code) => format!("{} ({})", message, code),
                        None => message,
                    }
                })
                .unwrap_or_else(|_| format!("HTTP {}", status));

            return Err(match status {
                StatusCode::NOT_FOUND => AppError::NotFound,
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::warn!(status = %status, "Payment platform rate limited request");
                    AppError::RemoteUnavailable(detail)
                }
                s if s.is_server_error() => {
                    tracing::error!(status = %status, error = %detail, "Payment platform error");
                    AppError::RemoteUnavailable(detail)
                }
                _ => {
                    tracing::warn!(status = %status, error = %detail, "Payment platform rejected request");
                    AppError::RemoteRejected(detail)
                }
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse payment platform response");
            AppError::MalformedRemote(format!("Failed to parse response: {}", e))
        })
    }
}

/// Platform object ids are `[A-Za-z0-9_]` only; anything else would
/// address a different resource once placed in a URL path.
fn object_id(id: &str) -> AppResult<&str> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(id)
    } else {
        Err(AppError::InvalidArgument(format!("invalid object id: {:?}", id)))
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::RemoteUnavailable(format!("Request failed: {}", e))
}

#[async_trait]
impl StripeApi for StripeClient {
    async fn retrieve_subscription(&self, id: &str) -> AppResult<RemoteSubscription> {
        self.get(&["subscriptions", object_id(id)?], &[]).await
    }

    async fn update_subscription(
        &self,
        id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<RemoteSubscription> {
        self.post_form(&["subscriptions", object_id(id)?], &patch_form(patch))
            .await
    }

    async fn cancel_subscription(&self, id: &str) -> AppResult<RemoteSubscription> {
        self.delete(&["subscriptions", object_id(id)?]).await
    }

    async fn list_subscriptions(&self, customer_id: &str) -> AppResult<Vec<RemoteSubscription>> {
        let mut all = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![
                ("customer", customer_id),
                ("status", "all"),
                ("limit", LIST_PAGE_SIZE),
            ];
            if let Some(cursor) = starting_after.as_deref() {
                query.push(("starting_after", cursor));
            }

            let page: StripeList<RemoteSubscription> = self.get(&["subscriptions"], &query).await?;
            let next_cursor = page.data.last().map(|s| s.id.clone());
            all.extend(page.data);

            match next_cursor {
                Some(cursor) if page.has_more => starting_after = Some(cursor),
                _ => break,
            }
        }

        Ok(all)
    }

    async fn retrieve_customer(&self, id: &str) -> AppResult<RemoteCustomer> {
        self.get(&["customers", object_id(id)?], &[]).await
    }

    async fn retrieve_plan(&self, id: &str) -> AppResult<RemotePlan> {
        self.get(&["plans", object_id(id)?], &[]).await
    }

    async fn retrieve_order(&self, id: &str) -> AppResult<serde_json::Value> {
        self.get(&["orders", object_id(id)?], &[]).await
    }
}
