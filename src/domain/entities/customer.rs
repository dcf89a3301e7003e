use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::subscription::Subscription;

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub stripe_id: String,
    pub email: Option<String>,
    pub description: Option<String>,
    pub currency: String,
    /// Balance in the smallest currency unit; negative means credit.
    pub balance: i64,
    pub delinquent: bool,
    /// Set when the remote customer was deleted. The row is kept so orders
    /// and subscriptions still resolve.
    pub deleted: bool,
    pub created: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Roll-up over a customer's subscriptions: does any of them grant access at `now`.
pub fn any_valid_subscription<'a, I>(subscriptions: I, now: DateTime<Utc>) -> bool
where
    I: IntoIterator<Item = &'a Subscription>,
{
    subscriptions.into_iter().any(|s| s.is_valid_at(now))
}
