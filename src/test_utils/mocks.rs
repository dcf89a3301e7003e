//! In-memory implementations of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        customer::{CustomerRepo, CustomerUpsert},
        order::{OrderRepo, OrderUpsert},
        plan::{PlanRepo, PlanUpsert},
        subscription::{SubscriptionRepo, SubscriptionUpsert},
    },
    domain::entities::{
        customer::Customer,
        order::Order,
        plan::Plan,
        subscription::{Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// InMemoryCustomerRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryCustomerRepo {
    pub customers: Mutex<HashMap<Uuid, Customer>>,
}

impl InMemoryCustomerRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, customer: Customer) {
        self.customers.lock().unwrap().insert(customer.id, customer);
    }
}

#[async_trait]
impl CustomerRepo for InMemoryCustomerRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.customers.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Customer>> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .values()
            .find(|c| c.stripe_id == stripe_id)
            .cloned())
    }

    async fn upsert(&self, input: &CustomerUpsert) -> AppResult<Customer> {
        let mut customers = self.customers.lock().unwrap();
        let now = Utc::now();
        let existing = customers
            .values()
            .find(|c| c.stripe_id == input.stripe_id)
            .cloned();

        let customer = Customer {
            id: existing.as_ref().map(|c| c.id).unwrap_or_else(Uuid::new_v4),
            stripe_id: input.stripe_id.clone(),
            email: input.email.clone(),
            description: input.description.clone(),
            currency: input.currency.clone(),
            balance: input.balance,
            delinquent: input.delinquent,
            deleted: input.deleted,
            created: input.created,
            created_at: existing.and_then(|c| c.created_at).or(Some(now)),
            updated_at: Some(now),
        };

        customers.insert(customer.id, customer.clone());
        Ok(customer)
    }
}

// ============================================================================
// InMemoryPlanRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPlanRepo {
    pub plans: Mutex<HashMap<Uuid, Plan>>,
}

impl InMemoryPlanRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, plan: Plan) {
        self.plans.lock().unwrap().insert(plan.id, plan);
    }
}

#[async_trait]
impl PlanRepo for InMemoryPlanRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self.plans.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Plan>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .values()
            .find(|p| p.stripe_id == stripe_id)
            .cloned())
    }

    async fn upsert(&self, input: &PlanUpsert) -> AppResult<Plan> {
        let mut plans = self.plans.lock().unwrap();
        let now = Utc::now();
        let existing = plans
            .values()
            .find(|p| p.stripe_id == input.stripe_id)
            .cloned();

        let plan = Plan {
            id: existing.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            stripe_id: input.stripe_id.clone(),
            name: input.name.clone(),
            amount: input.amount,
            currency: input.currency.clone(),
            interval: input.interval,
            interval_count: input.interval_count,
            trial_period_days: input.trial_period_days,
            active: input.active,
            metadata: input.metadata.clone(),
            created_at: existing.and_then(|p| p.created_at).or(Some(now)),
            updated_at: Some(now),
        };

        plans.insert(plan.id, plan.clone());
        Ok(plan)
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, sub: Subscription) {
        self.subscriptions.lock().unwrap().insert(sub.id, sub);
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.stripe_id == stripe_id)
            .cloned())
    }

    async fn upsert(&self, input: &SubscriptionUpsert) -> AppResult<Subscription> {
        let mut subs = self.subscriptions.lock().unwrap();
        let now = Utc::now();
        let existing = subs
            .values()
            .find(|s| s.stripe_id == input.stripe_id)
            .cloned();

        let sub = Subscription {
            id: existing.as_ref().map(|s| s.id).unwrap_or_else(Uuid::new_v4),
            stripe_id: input.stripe_id.clone(),
            customer_id: input.customer_id,
            plan_id: input.plan_id,
            status: input.status,
            quantity: input.quantity,
            tax_percent: input.tax_percent,
            start: input.start,
            current_period_start: input.current_period_start,
            current_period_end: input.current_period_end,
            trial_start: input.trial_start,
            trial_end: input.trial_end,
            cancel_at_period_end: input.cancel_at_period_end,
            canceled_at: input.canceled_at,
            ended_at: input.ended_at,
            created_at: existing.and_then(|s| s.created_at).or(Some(now)),
            updated_at: Some(now),
        };

        subs.insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn list_unended(&self) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.ended_at.is_none())
            .cloned()
            .collect())
    }

    async fn mark_ended(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Subscription> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.get_mut(&id).ok_or(AppError::NotFound)?;
        sub.status = SubscriptionStatus::Canceled;
        sub.cancel_at_period_end = false;
        sub.canceled_at = sub.canceled_at.or(Some(at));
        sub.ended_at = sub.ended_at.or(Some(at));
        sub.updated_at = Some(Utc::now());
        Ok(sub.clone())
    }
}

// ============================================================================
// InMemoryOrderRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderRepo {
    pub orders: Mutex<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepo for InMemoryOrderRepo {
    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.stripe_id == stripe_id)
            .cloned())
    }

    async fn upsert(&self, input: &OrderUpsert) -> AppResult<Order> {
        let mut orders = self.orders.lock().unwrap();
        let now = Utc::now();
        let existing = orders
            .values()
            .find(|o| o.stripe_id == input.stripe_id)
            .cloned();

        let order = Order {
            id: existing.as_ref().map(|o| o.id).unwrap_or_else(Uuid::new_v4),
            stripe_id: input.stripe_id.clone(),
            customer_id: input.customer_id,
            status: input.status,
            amount_subtotal: input.amount_subtotal,
            amount_total: input.amount_total,
            currency: input.currency.clone(),
            application: input.application.clone(),
            client_secret: input.client_secret.clone(),
            ip_address: input.ip_address.clone(),
            payment_intent: input.payment_intent.clone(),
            automatic_tax: input.automatic_tax.clone(),
            billing_details: input.billing_details.clone(),
            discounts: input.discounts.clone(),
            line_items: input.line_items.clone(),
            payment: input.payment.clone(),
            shipping_cost: input.shipping_cost.clone(),
            shipping_details: input.shipping_details.clone(),
            tax_details: input.tax_details.clone(),
            total_details: input.total_details.clone(),
            created: input.created,
            created_at: existing.and_then(|o| o.created_at).or(Some(now)),
            updated_at: Some(now),
        };

        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.customer_id == Some(customer_id))
            .cloned()
            .collect())
    }
}
