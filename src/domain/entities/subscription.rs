use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Convert from the payment platform's status string.
    /// Returns None for values this crate does not know about.
    pub fn from_stripe(s: &str) -> Option<Self> {
        match s {
            "trialing" => Some(SubscriptionStatus::Trialing),
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Canceled),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Some(SubscriptionStatus::IncompleteExpired),
            "paused" => Some(SubscriptionStatus::Paused),
            _ => None,
        }
    }

    /// Trialing and active subscriptions grant access.
    pub fn is_current(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Trialing | SubscriptionStatus::Active
        )
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local mirror of a remote subscription.
///
/// Rows are only ever written from remote payloads; the status predicates
/// below are the single source of truth for "does this grant access".
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub stripe_id: String,
    pub customer_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub quantity: i32,
    pub tax_percent: Option<Decimal>,
    pub start: Option<DateTime<Utc>>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_status_current(&self) -> bool {
        self.status.is_current()
    }

    /// Canceled at period end but the paid period has not lapsed yet.
    pub fn is_status_temporarily_current(&self) -> bool {
        self.is_status_temporarily_current_at(Utc::now())
    }

    pub fn is_status_temporarily_current_at(&self, now: DateTime<Utc>) -> bool {
        self.cancel_at_period_end && now < self.current_period_end
    }

    pub fn is_in_trial(&self) -> bool {
        self.is_in_trial_at(Utc::now())
    }

    pub fn is_in_trial_at(&self, now: DateTime<Utc>) -> bool {
        self.trial_end.is_some_and(|trial_end| now < trial_end)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_status_current()
            || self.is_status_temporarily_current_at(now)
            || self.is_in_trial_at(now)
    }

    /// True once the subscription has terminated and will not come back.
    pub fn has_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<current_period_start={}, current_period_end={}, status={}, quantity={}, stripe_id={}>",
            self.current_period_start,
            self.current_period_end,
            self.status,
            self.quantity,
            self.stripe_id
        )
    }
}
