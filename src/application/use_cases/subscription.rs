use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::stripe_api::{
        Expandable, FieldUpdate, RemoteField, RemoteSubscription, StripeApi, SubscriptionPatch,
        timestamp_to_datetime,
    },
    application::use_cases::{customer::CustomerUseCases, plan::PlanUseCases},
    domain::entities::subscription::{Subscription, SubscriptionStatus},
};

/// Fractional digits the local `tax_percent` column stores.
const TAX_PERCENT_SCALE: u32 = 2;

// ============================================================================
// Settings
// ============================================================================

/// What to do when a cancellation is requested while the trial is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialCancelPolicy {
    /// Keep trial access until it lapses, whatever the caller asked for.
    Defer,
    /// End the subscription right away, whatever the caller asked for.
    Immediate,
}

impl std::str::FromStr for TrialCancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "defer" => Ok(TrialCancelPolicy::Defer),
            "immediate" => Ok(TrialCancelPolicy::Immediate),
            _ => Err(format!("Invalid trial cancel policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub trial_cancel_policy: TrialCancelPolicy,
    /// Extra reads allowed when a write response does not reflect the write yet.
    pub consistency_rereads: u32,
    pub reread_delay: std::time::Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            trial_cancel_policy: TrialCancelPolicy::Defer,
            consistency_rereads: 2,
            reread_delay: std::time::Duration::from_millis(500),
        }
    }
}

// ============================================================================
// Persistence port
// ============================================================================

#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
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
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Subscription>>;
    /// Update-or-create keyed by `stripe_id`.
    async fn upsert(&self, input: &SubscriptionUpsert) -> AppResult<Subscription>;
    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Subscription>>;
    /// Subscriptions whose `ended_at` is not set yet.
    async fn list_unended(&self) -> AppResult<Vec<Subscription>>;
    /// Mark a subscription canceled and ended at `at`, keeping an earlier
    /// `canceled_at` if one is recorded.
    async fn mark_ended(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Subscription>;
}

// ============================================================================
// Pure rules
// ============================================================================

fn optional_timestamp(
    field: &str,
    value: &RemoteField<i64>,
    local: Option<DateTime<Utc>>,
) -> AppResult<Option<DateTime<Utc>>> {
    Ok(value
        .clone()
        .try_map(|ts| timestamp_to_datetime(field, ts))?
        .merge(local))
}

/// Map a remote subscription onto the local row.
///
/// `plan_id` is the already-resolved plan reference, with the same
/// absent/null/present meaning as the remote `plan` field.
pub fn map_remote_subscription(
    remote: &RemoteSubscription,
    customer_id: Uuid,
    plan_id: RemoteField<Uuid>,
    existing: Option<&Subscription>,
) -> AppResult<SubscriptionUpsert> {
    let mut status = SubscriptionStatus::from_stripe(&remote.status).ok_or_else(|| {
        AppError::MalformedRemote(format!(
            "subscription {} has unknown status {}",
            remote.id, remote.status
        ))
    })?;

    let current_period_start =
        timestamp_to_datetime("current_period_start", remote.current_period_start)?;
    let current_period_end =
        timestamp_to_datetime("current_period_end", remote.current_period_end)?;
    if current_period_end < current_period_start {
        return Err(AppError::MalformedRemote(format!(
            "subscription {} period ends before it starts",
            remote.id
        )));
    }

    let ended_at = optional_timestamp("ended_at", &remote.ended_at, existing.and_then(|s| s.ended_at))?;
    if ended_at.is_some() && status != SubscriptionStatus::Canceled {
        tracing::warn!(
            stripe_id = %remote.id,
            status = %status,
            "Ended subscription reported with non-canceled status, forcing canceled"
        );
        status = SubscriptionStatus::Canceled;
    }

    let quantity = match &remote.quantity {
        RemoteField::Present(q) => i32::try_from(*q)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                AppError::MalformedRemote(format!(
                    "subscription {} has quantity {}",
                    remote.id, q
                ))
            })?,
        _ => existing.map(|s| s.quantity).unwrap_or(1),
    };

    Ok(SubscriptionUpsert {
        stripe_id: remote.id.clone(),
        customer_id,
        plan_id: plan_id.merge(existing.and_then(|s| s.plan_id)),
        status,
        quantity,
        tax_percent: remote
            .tax_percent
            .clone()
            .merge(existing.and_then(|s| s.tax_percent)),
        start: optional_timestamp("start", &remote.start, existing.and_then(|s| s.start))?,
        current_period_start,
        current_period_end,
        trial_start: optional_timestamp(
            "trial_start",
            &remote.trial_start,
            existing.and_then(|s| s.trial_start),
        )?,
        trial_end: optional_timestamp(
            "trial_end",
            &remote.trial_end,
            existing.and_then(|s| s.trial_end),
        )?,
        cancel_at_period_end: remote.cancel_at_period_end,
        canceled_at: optional_timestamp(
            "canceled_at",
            &remote.canceled_at,
            existing.and_then(|s| s.canceled_at),
        )?,
        ended_at,
    })
}

/// New trial end for an extension by `delta`, truncated to whole seconds.
///
/// A running trial is pushed out from `max(trial_end, now)`; otherwise the
/// next billing date moves from `current_period_end`.
pub fn extension_target(
    sub: &Subscription,
    delta: Duration,
    now: DateTime<Utc>,
) -> AppResult<DateTime<Utc>> {
    if delta <= Duration::zero() {
        return Err(AppError::InvalidArgument(
            "extension must be a positive duration".to_string(),
        ));
    }

    let base = match sub.trial_end {
        Some(trial_end) if sub.is_in_trial_at(now) => trial_end.max(now),
        _ => sub.current_period_end,
    };

    base.checked_add_signed(delta)
        .map(|target| target.trunc_subsecs(0))
        .ok_or_else(|| AppError::InvalidArgument("extension is out of range".to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    AtPeriodEnd,
    Immediately,
}

pub fn resolve_cancel_mode(
    sub: &Subscription,
    at_period_end: bool,
    policy: TrialCancelPolicy,
    now: DateTime<Utc>,
) -> CancelMode {
    if sub.is_in_trial_at(now) {
        return match policy {
            TrialCancelPolicy::Defer => CancelMode::AtPeriodEnd,
            TrialCancelPolicy::Immediate => CancelMode::Immediately,
        };
    }
    if at_period_end {
        CancelMode::AtPeriodEnd
    } else {
        CancelMode::Immediately
    }
}

// ============================================================================
// Use cases
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdateInput {
    pub quantity: Option<i32>,
    /// Local plan id.
    pub plan_id: Option<Uuid>,
    pub tax_percent: FieldUpdate<Decimal>,
    pub prorate: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub refreshed: usize,
    pub ended: usize,
    pub failed: usize,
}

pub struct SubscriptionUseCases {
    subscription_repo: Arc<dyn SubscriptionRepo>,
    customers: Arc<CustomerUseCases>,
    plans: Arc<PlanUseCases>,
    stripe: Arc<dyn StripeApi>,
    settings: SyncSettings,
}

impl SubscriptionUseCases {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepo>,
        customers: Arc<CustomerUseCases>,
        plans: Arc<PlanUseCases>,
        stripe: Arc<dyn StripeApi>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            subscription_repo,
            customers,
            plans,
            stripe,
            settings,
        }
    }

    pub async fn get_subscription(&self, id: Uuid) -> AppResult<Subscription> {
        self.subscription_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Mirror a remote subscription, resolving its customer and plan first.
    pub async fn sync_subscription(&self, remote: &RemoteSubscription) -> AppResult<Subscription> {
        let customer = match &remote.customer {
            Expandable::Object(customer) => self.customers.sync_customer(customer).await?,
            Expandable::Id(stripe_id) => self.customers.get_or_sync_customer(stripe_id).await?,
        };

        let plan_id = match &remote.plan {
            RemoteField::Present(plan) => RemoteField::Present(self.plans.sync_plan(plan).await?.id),
            RemoteField::Null => RemoteField::Null,
            RemoteField::Absent => RemoteField::Absent,
        };

        let existing = self.subscription_repo.get_by_stripe_id(&remote.id).await?;
        let input = map_remote_subscription(remote, customer.id, plan_id, existing.as_ref())?;
        let sub = self.subscription_repo.upsert(&input).await?;

        tracing::debug!(
            subscription_id = %sub.id,
            stripe_id = %sub.stripe_id,
            status = %sub.status,
            "Synced subscription"
        );
        Ok(sub)
    }

    /// Pull a subscription by its remote id.
    pub async fn sync_remote_by_stripe_id(&self, stripe_id: &str) -> AppResult<Subscription> {
        match self.stripe.retrieve_subscription(stripe_id).await {
            Ok(remote) => self.sync_subscription(&remote).await,
            Err(AppError::NotFound) => {
                match self.subscription_repo.get_by_stripe_id(stripe_id).await? {
                    Some(local) => self.reconcile_missing(&local).await,
                    None => Err(AppError::NotFound),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Re-read a local subscription from the remote platform.
    pub async fn refresh(&self, id: Uuid) -> AppResult<Subscription> {
        let sub = self.get_subscription(id).await?;
        match self.stripe.retrieve_subscription(&sub.stripe_id).await {
            Ok(remote) => self.sync_subscription(&remote).await,
            Err(AppError::NotFound) => self.reconcile_missing(&sub).await,
            Err(e) => Err(e),
        }
    }

    /// The remote object is gone: the local row becomes canceled and ended.
    pub async fn reconcile_missing(&self, sub: &Subscription) -> AppResult<Subscription> {
        if sub.has_ended() && sub.status == SubscriptionStatus::Canceled {
            return Ok(sub.clone());
        }
        tracing::warn!(
            subscription_id = %sub.id,
            stripe_id = %sub.stripe_id,
            "Subscription no longer exists remotely, marking ended"
        );
        self.subscription_repo.mark_ended(sub.id, Utc::now()).await
    }

    /// Push the trial end (and with it the next billing date) out by `delta`.
    pub async fn extend(&self, id: Uuid, delta: Duration) -> AppResult<Subscription> {
        let sub = self.get_subscription(id).await?;
        let target = extension_target(&sub, delta, Utc::now())?;
        let patch = SubscriptionPatch {
            trial_end: Some(target),
            prorate: Some(false),
            ..Default::default()
        };

        let response = self
            .stripe
            .update_subscription(&sub.stripe_id, &patch)
            .await?;
        let expected = target.timestamp();
        let confirmed = self
            .confirm(&sub.stripe_id, response, "trial_end", |r| {
                r.trial_end.as_option() == Some(&expected)
            })
            .await?;

        let updated = self.sync_subscription(&confirmed).await?;
        tracing::info!(
            subscription_id = %updated.id,
            trial_end = %target,
            "Extended subscription"
        );
        Ok(updated)
    }

    pub async fn cancel(&self, id: Uuid, at_period_end: bool) -> AppResult<Subscription> {
        let sub = self.get_subscription(id).await?;
        let mode = resolve_cancel_mode(
            &sub,
            at_period_end,
            self.settings.trial_cancel_policy,
            Utc::now(),
        );
        if mode == CancelMode::AtPeriodEnd && !at_period_end {
            tracing::info!(subscription_id = %sub.id, "Cancellation during trial deferred to period end");
        }

        let confirmed = match mode {
            CancelMode::AtPeriodEnd => {
                let patch = SubscriptionPatch {
                    cancel_at_period_end: Some(true),
                    ..Default::default()
                };
                let response = match self.stripe.update_subscription(&sub.stripe_id, &patch).await {
                    Ok(response) => response,
                    Err(AppError::NotFound) => return self.reconcile_missing(&sub).await,
                    Err(e) => return Err(e),
                };
                self.confirm(&sub.stripe_id, response, "cancel_at_period_end", |r| {
                    r.cancel_at_period_end
                })
                .await?
            }
            CancelMode::Immediately => {
                let response = match self.stripe.cancel_subscription(&sub.stripe_id).await {
                    Ok(response) => response,
                    Err(AppError::NotFound) => {
                        match self.stripe.retrieve_subscription(&sub.stripe_id).await {
                            Ok(response) => response,
                            Err(AppError::NotFound) => return self.reconcile_missing(&sub).await,
                            Err(e) => return Err(e),
                        }
                    }
                    Err(e) => return Err(e),
                };
                self.confirm(&sub.stripe_id, response, "status", |r| {
                    SubscriptionStatus::from_stripe(&r.status) == Some(SubscriptionStatus::Canceled)
                })
                .await?
            }
        };

        let updated = self.sync_subscription(&confirmed).await?;
        tracing::info!(
            subscription_id = %updated.id,
            mode = ?mode,
            status = %updated.status,
            "Canceled subscription"
        );
        Ok(updated)
    }

    /// Change quantity, plan or tax rate remotely, then mirror the result.
    pub async fn update(&self, id: Uuid, input: SubscriptionUpdateInput) -> AppResult<Subscription> {
        if input.quantity.is_some_and(|q| q <= 0) {
            return Err(AppError::InvalidArgument(
                "quantity must be positive".to_string(),
            ));
        }

        if let FieldUpdate::Set(rate) = &input.tax_percent {
            if rate.normalize().scale() > TAX_PERCENT_SCALE {
                return Err(AppError::InvalidArgument(format!(
                    "tax_percent allows at most {} decimal places",
                    TAX_PERCENT_SCALE
                )));
            }
        }

        let sub = self.get_subscription(id).await?;

        let plan_stripe_id = match input.plan_id {
            Some(plan_id) => match self.plans.get_plan(plan_id).await {
                Ok(plan) => Some(plan.stripe_id),
                Err(AppError::NotFound) => {
                    return Err(AppError::InvalidArgument(format!("unknown plan {}", plan_id)));
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let patch = SubscriptionPatch {
            quantity: input.quantity.map(i64::from),
            plan: plan_stripe_id.clone(),
            tax_percent: input.tax_percent.clone(),
            prorate: input.prorate,
            ..Default::default()
        };
        if patch.is_empty() {
            return Err(AppError::InvalidArgument("nothing to update".to_string()));
        }

        let response = self
            .stripe
            .update_subscription(&sub.stripe_id, &patch)
            .await?;
        let confirmed = self
            .confirm(&sub.stripe_id, response, "update", |r| {
                let quantity_ok = patch
                    .quantity
                    .is_none_or(|q| r.quantity.as_option() == Some(&q));
                let plan_ok = plan_stripe_id
                    .as_deref()
                    .is_none_or(|p| r.plan.as_option().map(|plan| plan.id.as_str()) == Some(p));
                let tax_ok = match &patch.tax_percent {
                    FieldUpdate::Keep => true,
                    FieldUpdate::Clear => r.tax_percent.as_option().is_none(),
                    FieldUpdate::Set(value) => r.tax_percent.as_option() == Some(value),
                };
                quantity_ok && plan_ok && tax_ok
            })
            .await?;

        let updated = self.sync_subscription(&confirmed).await?;
        tracing::info!(subscription_id = %updated.id, "Updated subscription");
        Ok(updated)
    }

    /// Mirror every remote subscription the customer has, in any status.
    pub async fn sync_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Subscription>> {
        let customer = self.customers.get_customer(customer_id).await?;
        let remotes = self.stripe.list_subscriptions(&customer.stripe_id).await?;

        let mut synced = Vec::with_capacity(remotes.len());
        for remote in &remotes {
            synced.push(self.sync_subscription(remote).await?);
        }
        Ok(synced)
    }

    /// Refresh every subscription that has not ended. Failures are logged
    /// and counted; they do not stop the pass.
    pub async fn resync_all(&self) -> AppResult<ResyncReport> {
        let subs = self.subscription_repo.list_unended().await?;
        let mut report = ResyncReport::default();

        for sub in subs {
            match self.refresh(sub.id).await {
                Ok(updated) if updated.has_ended() => report.ended += 1,
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    tracing::warn!(
                        subscription_id = %sub.id,
                        stripe_id = %sub.stripe_id,
                        error = ?e,
                        "Failed to refresh subscription"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Re-read until `check` holds on the remote state, within the
    /// configured budget. Local state is not touched on failure.
    async fn confirm<F>(
        &self,
        stripe_id: &str,
        response: RemoteSubscription,
        what: &str,
        check: F,
    ) -> AppResult<RemoteSubscription>
    where
        F: Fn(&RemoteSubscription) -> bool,
    {
        let mut latest = response;
        let mut rereads = 0;

        while !check(&latest) {
            if rereads >= self.settings.consistency_rereads {
                tracing::warn!(stripe_id = %stripe_id, what = %what, rereads, "Remote write not reflected");
                return Err(AppError::NotConfirmed(format!(
                    "{} of subscription {} not reflected remotely",
                    what, stripe_id
                )));
            }
            rereads += 1;
            tokio::time::sleep(self.settings.reread_delay).await;
            latest = self.stripe.retrieve_subscription(stripe_id).await?;
        }

        Ok(latest)
    }
}
