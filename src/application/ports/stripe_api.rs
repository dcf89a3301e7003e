use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::app_error::{AppError, AppResult};

// ============================================================================
// Boundary field types
// ============================================================================

/// A remote field that distinguishes "not sent" from "sent as null".
///
/// Use with `#[serde(default)]`: a missing key stays `Absent`, JSON `null`
/// becomes `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteField<T> {
    Absent,
    Null,
    Present(T),
}

impl<T> Default for RemoteField<T> {
    fn default() -> Self {
        RemoteField::Absent
    }
}

impl<T> RemoteField<T> {
    /// Apply this field to the locally stored value.
    /// Absent keeps the local value, null clears it, present replaces it.
    pub fn merge(self, local: Option<T>) -> Option<T> {
        match self {
            RemoteField::Absent => local,
            RemoteField::Null => None,
            RemoteField::Present(value) => Some(value),
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            RemoteField::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn try_map<U, F>(self, f: F) -> AppResult<RemoteField<U>>
    where
        F: FnOnce(T) -> AppResult<U>,
    {
        Ok(match self {
            RemoteField::Absent => RemoteField::Absent,
            RemoteField::Null => RemoteField::Null,
            RemoteField::Present(value) => RemoteField::Present(f(value)?),
        })
    }
}

impl<'de, T> Deserialize<'de> for RemoteField<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => RemoteField::Present(value),
            None => RemoteField::Null,
        })
    }
}

/// An id-or-object reference, as the platform returns for expandable fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

/// Local write intent for a nullable remote field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    Keep,
    /// Reset the remote field to its empty value.
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

/// Convert a unix timestamp from the platform into a UTC instant.
pub fn timestamp_to_datetime(field: &str, secs: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::MalformedRemote(format!("{} is out of range: {}", field, secs)))
}

// ============================================================================
// Remote objects
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCustomer {
    pub id: String,
    #[serde(default)]
    pub email: RemoteField<String>,
    #[serde(default)]
    pub description: RemoteField<String>,
    #[serde(default)]
    pub currency: RemoteField<String>,
    #[serde(default)]
    pub balance: RemoteField<i64>,
    #[serde(default)]
    pub delinquent: RemoteField<bool>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub created: RemoteField<i64>,
}

impl Expandable<RemoteCustomer> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(customer) => &customer.id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePlan {
    pub id: String,
    #[serde(default)]
    pub nickname: RemoteField<String>,
    #[serde(default)]
    pub amount: RemoteField<i64>,
    pub currency: String,
    pub interval: String,
    #[serde(default = "default_interval_count")]
    pub interval_count: i32,
    #[serde(default)]
    pub trial_period_days: RemoteField<i32>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub metadata: RemoteField<std::collections::HashMap<String, String>>,
}

fn default_interval_count() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    pub customer: Expandable<RemoteCustomer>,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub canceled_at: RemoteField<i64>,
    #[serde(default)]
    pub ended_at: RemoteField<i64>,
    #[serde(default)]
    pub trial_start: RemoteField<i64>,
    #[serde(default)]
    pub trial_end: RemoteField<i64>,
    #[serde(default)]
    pub start: RemoteField<i64>,
    #[serde(default)]
    pub quantity: RemoteField<i64>,
    #[serde(default)]
    pub tax_percent: RemoteField<Decimal>,
    #[serde(default)]
    pub plan: RemoteField<RemotePlan>,
}

/// Order payload after the pre-mapping transform (see `use_cases::order`).
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    pub amount_subtotal: i64,
    pub amount_total: i64,
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub automatic_tax: serde_json::Value,
    #[serde(default)]
    pub billing_details: Option<serde_json::Value>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<Expandable<RemoteCustomer>>,
    #[serde(default)]
    pub discounts: Option<serde_json::Value>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub line_items: serde_json::Value,
    #[serde(default)]
    pub payment: serde_json::Value,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub shipping_cost: Option<serde_json::Value>,
    #[serde(default)]
    pub shipping_details: Option<serde_json::Value>,
    pub status: String,
    #[serde(default)]
    pub tax_details: Option<serde_json::Value>,
    #[serde(default)]
    pub total_details: serde_json::Value,
    pub created: i64,
}

// ============================================================================
// Writes
// ============================================================================

/// Partial update of a remote subscription. Unset fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub quantity: Option<i64>,
    /// Remote plan id.
    pub plan: Option<String>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
    pub tax_percent: FieldUpdate<Decimal>,
    pub prorate: Option<bool>,
}

impl SubscriptionPatch {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.plan.is_none()
            && self.trial_end.is_none()
            && self.cancel_at_period_end.is_none()
            && self.tax_percent == FieldUpdate::Keep
    }
}

// ============================================================================
// Port
// ============================================================================

/// The remote payment platform, source of truth for every mirrored object.
///
/// `AppError::NotFound` means the remote object does not exist (404).
#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn retrieve_subscription(&self, id: &str) -> AppResult<RemoteSubscription>;

    async fn update_subscription(
        &self,
        id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<RemoteSubscription>;

    /// Cancel immediately. The canceled object is returned.
    async fn cancel_subscription(&self, id: &str) -> AppResult<RemoteSubscription>;

    async fn list_subscriptions(&self, customer_id: &str) -> AppResult<Vec<RemoteSubscription>>;

    async fn retrieve_customer(&self, id: &str) -> AppResult<RemoteCustomer>;

    async fn retrieve_plan(&self, id: &str) -> AppResult<RemotePlan>;

    /// Raw order JSON; the order pipeline transforms it before mapping.
    async fn retrieve_order(&self, id: &str) -> AppResult<serde_json::Value>;
}
