use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::stripe_api::{Expandable, RemoteOrder, StripeApi, timestamp_to_datetime},
    application::use_cases::customer::CustomerUseCases,
    domain::entities::order::{Order, OrderStatus},
};

#[derive(Debug, Clone)]
pub struct OrderUpsert {
    pub stripe_id: String,
    pub customer_id: Option<Uuid>,
    pub status: OrderStatus,
    pub amount_subtotal: i64,
    pub amount_total: i64,
    pub currency: String,
    pub application: Option<String>,
    pub client_secret: Option<String>,
    pub ip_address: Option<String>,
    pub payment_intent: Option<String>,
    pub automatic_tax: Value,
    pub billing_details: Option<Value>,
    pub discounts: Option<Value>,
    pub line_items: Value,
    pub payment: Value,
    pub shipping_cost: Option<Value>,
    pub shipping_details: Option<Value>,
    pub tax_details: Option<Value>,
    pub total_details: Value,
    pub created: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Order>>;
    /// Update-or-create keyed by `stripe_id`.
    async fn upsert(&self, input: &OrderUpsert) -> AppResult<Order>;
    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>>;
}

/// Pre-mapping transform: lift `payment.payment_intent` to the top level.
///
/// The nested value may be an id or an expanded object; a missing one
/// becomes null.
pub fn prepare_order_payload(mut raw: Value) -> AppResult<Value> {
    let payment_intent = match raw.pointer("/payment/payment_intent") {
        Some(Value::String(id)) => Value::String(id.clone()),
        Some(Value::Object(intent)) => intent.get("id").cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    };

    let object = raw
        .as_object_mut()
        .ok_or_else(|| AppError::MalformedRemote("order payload is not an object".to_string()))?;
    object.insert("payment_intent".to_string(), payment_intent);
    Ok(raw)
}

pub fn map_remote_order(remote: RemoteOrder, customer_id: Option<Uuid>) -> AppResult<OrderUpsert> {
    let status = OrderStatus::from_stripe(&remote.status).ok_or_else(|| {
        AppError::MalformedRemote(format!(
            "order {} has unknown status {}",
            remote.id, remote.status
        ))
    })?;

    Ok(OrderUpsert {
        created: timestamp_to_datetime("created", remote.created)?,
        stripe_id: remote.id,
        customer_id,
        status,
        amount_subtotal: remote.amount_subtotal,
        amount_total: remote.amount_total,
        currency: remote.currency.to_lowercase(),
        application: remote.application,
        client_secret: remote.client_secret,
        ip_address: remote.ip_address,
        payment_intent: remote.payment_intent,
        automatic_tax: remote.automatic_tax,
        billing_details: remote.billing_details,
        discounts: remote.discounts,
        line_items: remote.line_items,
        payment: remote.payment,
        shipping_cost: remote.shipping_cost,
        shipping_details: remote.shipping_details,
        tax_details: remote.tax_details,
        total_details: remote.total_details,
    })
}

pub struct OrderUseCases {
    order_repo: Arc<dyn OrderRepo>,
    customers: Arc<CustomerUseCases>,
    stripe: Arc<dyn StripeApi>,
}

impl OrderUseCases {
    pub fn new(
        order_repo: Arc<dyn OrderRepo>,
        customers: Arc<CustomerUseCases>,
        stripe: Arc<dyn StripeApi>,
    ) -> Self {
        Self {
            order_repo,
            customers,
            stripe,
        }
    }

    pub async fn get_order(&self, stripe_id: &str) -> AppResult<Order> {
        self.order_repo
            .get_by_stripe_id(stripe_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Transform, map and store a raw order payload.
    pub async fn sync_order(&self, raw: Value) -> AppResult<Order> {
        let prepared = prepare_order_payload(raw)?;
        let remote: RemoteOrder = serde_json::from_value(prepared)
            .map_err(|e| AppError::MalformedRemote(format!("order payload: {}", e)))?;

        let customer_id = match &remote.customer {
            Some(Expandable::Object(customer)) => {
                Some(self.customers.sync_customer(customer).await?.id)
            }
            Some(Expandable::Id(stripe_id)) => {
                match self.customers.get_or_sync_customer(stripe_id).await {
                    Ok(customer) => Some(customer.id),
                    Err(AppError::NotFound) => {
                        tracing::warn!(order = %remote.id, customer = %stripe_id, "Order customer no longer exists");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };

        let input = map_remote_order(remote, customer_id)?;
        let order = self.order_repo.upsert(&input).await?;
        tracing::debug!(order_id = %order.id, stripe_id = %order.stripe_id, status = %order.status, "Synced order");
        Ok(order)
    }

    pub async fn refresh_order(&self, stripe_id: &str) -> AppResult<Order> {
        let raw = self.stripe.retrieve_order(stripe_id).await?;
        self.sync_order(raw).await
    }

    pub async fn list_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
        self.customers.get_customer(customer_id).await?;
        self.order_repo.list_by_customer(customer_id).await
    }
}
