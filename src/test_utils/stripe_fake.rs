//! In-memory stand-in for the payment platform.
//!
//! Objects are stored as raw JSON so the same deserialization path as the
//! real client is exercised. Writes apply the patch the way the platform
//! does for the fields this crate sends.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::stripe_api::{
        FieldUpdate, RemoteCustomer, RemotePlan, RemoteSubscription, StripeApi, SubscriptionPatch,
    },
};

#[derive(Default)]
pub struct FakeStripeApi {
    subscriptions: Mutex<HashMap<String, Value>>,
    customers: Mutex<HashMap<String, Value>>,
    plans: Mutex<HashMap<String, Value>>,
    orders: Mutex<HashMap<String, Value>>,
    /// Lag requested for the next write, by subscription id.
    pending_lag: Mutex<HashMap<String, u32>>,
    /// Pre-write snapshot and how many more responses still return it.
    lagging: Mutex<HashMap<String, (Value, u32)>>,
    calls: Mutex<Vec<&'static str>>,
    unavailable: AtomicBool,
}

fn object_id(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}

fn parse<T: DeserializeOwned>(value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::MalformedRemote(e.to_string()))
}

impl FakeStripeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_subscription(&self, value: Value) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(object_id(&value), value);
    }

    pub fn insert_customer(&self, value: Value) {
        self.customers.lock().unwrap().insert(object_id(&value), value);
    }

    pub fn insert_plan(&self, value: Value) {
        self.plans.lock().unwrap().insert(object_id(&value), value);
    }

    pub fn insert_order(&self, value: Value) {
        self.orders.lock().unwrap().insert(object_id(&value), value);
    }

    /// Delete a subscription out-of-band.
    pub fn remove_subscription(&self, id: &str) {
        self.subscriptions.lock().unwrap().remove(id);
    }

    pub fn set_status(&self, id: &str, status: &str) {
        if let Some(sub) = self.subscriptions.lock().unwrap().get_mut(id) {
            sub["status"] = json!(status);
        }
    }

    /// The next write to `id` is applied, but its response and the following
    /// reads show the pre-write state, `responses` times in total.
    pub fn set_read_lag(&self, id: &str, responses: u32) {
        self.pending_lag
            .lock()
            .unwrap()
            .insert(id.to_string(), responses);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| **m == method)
            .count()
    }

    fn record(&self, method: &'static str) -> AppResult<()> {
        self.calls.lock().unwrap().push(method);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    fn current_subscription(&self, id: &str) -> AppResult<Value> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    /// Apply `mutate` to the stored subscription and return what the
    /// platform would answer, honoring any requested lag.
    fn write_subscription<F>(&self, id: &str, mutate: F) -> AppResult<RemoteSubscription>
    where
        F: FnOnce(&mut Value) -> AppResult<()>,
    {
        let before = self.current_subscription(id)?;
        let mut after = before.clone();
        mutate(&mut after)?;
        self.subscriptions
            .lock()
            .unwrap()
            .insert(id.to_string(), after.clone());

        if let Some(lag) = self.pending_lag.lock().unwrap().remove(id)
            && lag > 0
        {
            self.lagging
                .lock()
                .unwrap()
                .insert(id.to_string(), (before, lag));
        }
        self.respond(id, after)
    }

    fn respond(&self, id: &str, fresh: Value) -> AppResult<RemoteSubscription> {
        let mut lagging = self.lagging.lock().unwrap();
        let stale = match lagging.get_mut(id) {
            Some((snapshot, remaining)) => {
                *remaining -= 1;
                Some((snapshot.clone(), *remaining))
            }
            None => None,
        };
        if let Some((_, 0)) = stale {
            lagging.remove(id);
        }
        drop(lagging);
        parse(stale.map(|(snapshot, _)| snapshot).unwrap_or(fresh))
    }

    fn apply_patch(&self, sub: &mut Value, patch: &SubscriptionPatch) -> AppResult<()> {
        let now = Utc::now();

        if let Some(quantity) = patch.quantity {
            sub["quantity"] = json!(quantity);
        }
        if let Some(plan_id) = &patch.plan {
            let plan = self
                .plans
                .lock()
                .unwrap()
                .get(plan_id)
                .cloned()
                .ok_or_else(|| AppError::RemoteRejected(format!("No such plan: {}", plan_id)))?;
            sub["plan"] = plan;
        }
        if let Some(trial_end) = patch.trial_end {
            sub["trial_end"] = json!(trial_end.timestamp());
            if trial_end > now {
                sub["status"] = json!("trialing");
                sub["current_period_end"] = json!(trial_end.timestamp());
            }
        }
        if let Some(cancel_at_period_end) = patch.cancel_at_period_end {
            sub["cancel_at_period_end"] = json!(cancel_at_period_end);
            sub["canceled_at"] = if cancel_at_period_end {
                json!(now.timestamp())
            } else {
                Value::Null
            };
        }
        match &patch.tax_percent {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => sub["tax_percent"] = Value::Null,
            FieldUpdate::Set(value) => {
                sub["tax_percent"] = serde_json::to_value(value)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StripeApi for FakeStripeApi {
    async fn retrieve_subscription(&self, id: &str) -> AppResult<RemoteSubscription> {
        self.record("retrieve_subscription")?;
        let fresh = self.current_subscription(id)?;
        self.respond(id, fresh)
    }

    async fn update_subscription(
        &self,
        id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<RemoteSubscription> {
        self.record("update_subscription")?;
        self.write_subscription(id, |sub| self.apply_patch(sub, patch))
    }

    async fn cancel_subscription(&self, id: &str) -> AppResult<RemoteSubscription> {
        self.record("cancel_subscription")?;
        let now = Utc::now().timestamp();
        self.write_subscription(id, |sub| {
            sub["status"] = json!("canceled");
            sub["cancel_at_period_end"] = json!(false);
            sub["canceled_at"] = json!(now);
            sub["ended_at"] = json!(now);
            Ok(())
        })
    }

    async fn list_subscriptions(&self, customer_id: &str) -> AppResult<Vec<RemoteSubscription>> {
        self.record("list_subscriptions")?;
        let subs: Vec<Value> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s["customer"].as_str() == Some(customer_id)
                    || s["customer"]["id"].as_str() == Some(customer_id)
            })
            .cloned()
            .collect();
        subs.into_iter().map(parse).collect()
    }

    async fn retrieve_customer(&self, id: &str) -> AppResult<RemoteCustomer> {
        self.record("retrieve_customer")?;
        let value = self
            .customers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(AppError::NotFound)?;
        parse(value)
    }

    async fn retrieve_plan(&self, id: &str) -> AppResult<RemotePlan> {
        self.record("retrieve_plan")?;
        let value = self
            .plans
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(AppError::NotFound)?;
        parse(value)
    }

    async fn retrieve_order(&self, id: &str) -> AppResult<Value> {
        self.record("retrieve_order")?;
        self.orders
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(AppError::NotFound)
    }
}
