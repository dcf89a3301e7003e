use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Submitted,
    Processing,
    Complete,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Processing => "processing",
            OrderStatus::Complete => "complete",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn from_stripe(s: &str) -> Option<Self> {
        match s {
            "open" => Some(OrderStatus::Open),
            "submitted" => Some(OrderStatus::Submitted),
            "processing" => Some(OrderStatus::Processing),
            "complete" => Some(OrderStatus::Complete),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    /// Whether the customer has actually placed the order.
    pub fn is_placed(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Processing | OrderStatus::Complete
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase by a customer: line items, totals, payment and shipping details.
///
/// Nested platform structures (line items, tax, discounts, shipping) are kept
/// as opaque JSON; only the fields the crate reasons about are typed.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub stripe_id: String,
    /// Kept as None when the customer disappears; orders matter for audit.
    pub customer_id: Option<Uuid>,
    pub status: OrderStatus,
    pub amount_subtotal: i64,
    pub amount_total: i64,
    pub currency: String,
    pub application: Option<String>,
    pub client_secret: Option<String>,
    pub ip_address: Option<String>,
    pub payment_intent: Option<String>,
    pub automatic_tax: serde_json::Value,
    pub billing_details: Option<serde_json::Value>,
    pub discounts: Option<serde_json::Value>,
    pub line_items: serde_json::Value,
    pub payment: serde_json::Value,
    pub shipping_cost: Option<serde_json::Value>,
    pub shipping_details: Option<serde_json::Value>,
    pub tax_details: Option<serde_json::Value>,
    pub total_details: serde_json::Value,
    pub created: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let when = self.created.format("%m/%d/%Y");
        match self.status {
            OrderStatus::Open | OrderStatus::Canceled => {
                write!(f, "Created on {} ({})", when, self.status)
            }
            _ => write!(f, "Placed on {} ({})", when, self.status),
        }
    }
}
