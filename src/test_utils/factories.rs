//! Test data factories.
//!
//! Row factories create a complete, valid object with sensible defaults; use
//! the closure parameter to override specific fields. The `remote_*_json`
//! helpers build payloads shaped like the payment platform's responses.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::entities::{
    customer::Customer,
    order::{Order, OrderStatus},
    plan::{Plan, PlanInterval},
    subscription::{Subscription, SubscriptionStatus},
};

fn test_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Create a test customer with sensible defaults.
pub fn create_test_customer(overrides: impl FnOnce(&mut Customer)) -> Customer {
    let now = test_now();
    let mut customer = Customer {
        id: Uuid::new_v4(),
        stripe_id: format!("cus_{}", Uuid::new_v4().simple()),
        email: Some("customer@example.com".to_string()),
        description: None,
        currency: "usd".to_string(),
        balance: 0,
        delinquent: false,
        deleted: false,
        created: Some(now - Duration::days(60)),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut customer);
    customer
}

/// Create a test plan with sensible defaults.
pub fn create_test_plan(overrides: impl FnOnce(&mut Plan)) -> Plan {
    let now = test_now();
    let mut plan = Plan {
        id: Uuid::new_v4(),
        stripe_id: format!("plan_{}", Uuid::new_v4().simple()),
        name: Some("Gold".to_string()),
        amount: Some(2000),
        currency: "usd".to_string(),
        interval: PlanInterval::Month,
        interval_count: 1,
        trial_period_days: None,
        active: true,
        metadata: HashMap::new(),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut plan);
    plan
}

/// Create an active, non-trialing test subscription in the middle of its period.
pub fn create_test_subscription(
    customer_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let now = test_now();
    let mut sub = Subscription {
        id: Uuid::new_v4(),
        stripe_id: format!("sub_{}", Uuid::new_v4().simple()),
        customer_id,
        plan_id: None,
        status: SubscriptionStatus::Active,
        quantity: 1,
        tax_percent: None,
        start: Some(now - Duration::days(31)),
        current_period_start: now - Duration::days(1),
        current_period_end: now + Duration::days(29),
        trial_start: None,
        trial_end: None,
        cancel_at_period_end: false,
        canceled_at: None,
        ended_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut sub);
    sub
}

/// Create a submitted test order.
pub fn create_test_order(overrides: impl FnOnce(&mut Order)) -> Order {
    let now = test_now();
    let mut order = Order {
        id: Uuid::new_v4(),
        stripe_id: format!("order_{}", Uuid::new_v4().simple()),
        customer_id: None,
        status: OrderStatus::Submitted,
        amount_subtotal: 1000,
        amount_total: 1200,
        currency: "usd".to_string(),
        application: None,
        client_secret: None,
        ip_address: None,
        payment_intent: Some("pi_test".to_string()),
        automatic_tax: json!({ "enabled": false }),
        billing_details: None,
        discounts: None,
        line_items: json!({ "data": [] }),
        payment: json!({ "payment_intent": "pi_test" }),
        shipping_cost: None,
        shipping_details: None,
        tax_details: None,
        total_details: json!({ "amount_discount": 0, "amount_tax": 200 }),
        created: now,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut order);
    order
}

// ============================================================================
// Remote payloads
// ============================================================================

pub fn remote_plan_json(id: &str) -> Value {
    json!({
        "id": id,
        "object": "plan",
        "nickname": "Gold",
        "amount": 2000,
        "currency": "usd",
        "interval": "month",
        "interval_count": 1,
        "trial_period_days": null,
        "active": true,
        "metadata": {}
    })
}

pub fn remote_customer_json(id: &str) -> Value {
    json!({
        "id": id,
        "object": "customer",
        "email": format!("{}@example.com", id),
        "description": null,
        "currency": "usd",
        "balance": 0,
        "delinquent": false,
        "created": (test_now() - Duration::days(60)).timestamp()
    })
}

/// An active monthly subscription on `plan_gold`, one day into its period.
pub fn remote_subscription_json(id: &str, customer_id: &str) -> Value {
    let now = test_now();
    json!({
        "id": id,
        "object": "subscription",
        "customer": customer_id,
        "status": "active",
        "start": (now - Duration::days(31)).timestamp(),
        "current_period_start": (now - Duration::days(1)).timestamp(),
        "current_period_end": (now + Duration::days(29)).timestamp(),
        "cancel_at_period_end": false,
        "canceled_at": null,
        "ended_at": null,
        "trial_start": null,
        "trial_end": null,
        "quantity": 1,
        "tax_percent": null,
        "plan": remote_plan_json("plan_gold")
    })
}

/// A submitted order as the platform returns it, before the pre-mapping transform.
pub fn remote_order_json(id: &str, customer_id: Option<&str>) -> Value {
    json!({
        "id": id,
        "object": "order",
        "amount_subtotal": 1000,
        "amount_total": 1200,
        "application": null,
        "automatic_tax": { "enabled": false, "status": null },
        "billing_details": null,
        "client_secret": format!("{}_secret", id),
        "currency": "usd",
        "customer": customer_id,
        "discounts": [],
        "ip_address": null,
        "line_items": { "object": "list", "data": [] },
        "payment": {
            "payment_intent": format!("pi_{}", id),
            "status": "requires_payment_method"
        },
        "shipping_cost": null,
        "shipping_details": null,
        "status": "submitted",
        "tax_details": null,
        "total_details": { "amount_discount": 0, "amount_shipping": 0, "amount_tax": 200 },
        "created": test_now().timestamp()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_subscription_with_defaults() {
        let customer_id = Uuid::new_v4();
        let sub = create_test_subscription(customer_id, |_| {});
        assert_eq!(sub.customer_id, customer_id);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.current_period_end > sub.current_period_start);
        assert!(sub.is_valid());
    }

    #[test]
    fn test_create_subscription_with_overrides() {
        let sub = create_test_subscription(Uuid::new_v4(), |s| {
            s.quantity = 7;
            s.status = SubscriptionStatus::PastDue;
        });
        assert_eq!(sub.quantity, 7);
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
    }
}
