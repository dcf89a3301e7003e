use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::stripe_api::{RemotePlan, StripeApi},
    domain::entities::plan::{Plan, PlanInterval},
};

#[derive(Debug, Clone)]
pub struct PlanUpsert {
    pub stripe_id: String,
    pub name: Option<String>,
    pub amount: Option<i64>,
    pub currency: String,
    pub interval: PlanInterval,
    pub interval_count: i32,
    pub trial_period_days: Option<i32>,
    pub active: bool,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>>;
    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Plan>>;
    /// Update-or-create keyed by `stripe_id`.
    async fn upsert(&self, input: &PlanUpsert) -> AppResult<Plan>;
}

pub fn map_remote_plan(remote: &RemotePlan, existing: Option<&Plan>) -> AppResult<PlanUpsert> {
    let interval: PlanInterval = remote
        .interval
        .parse()
        .map_err(AppError::MalformedRemote)?;

    if remote.interval_count < 1 {
        return Err(AppError::MalformedRemote(format!(
            "plan {} has interval_count {}",
            remote.id, remote.interval_count
        )));
    }

    Ok(PlanUpsert {
        stripe_id: remote.id.clone(),
        name: remote
            .nickname
            .clone()
            .merge(existing.and_then(|p| p.name.clone())),
        amount: remote.amount.clone().merge(existing.and_then(|p| p.amount)),
        currency: remote.currency.to_lowercase(),
        interval,
        interval_count: remote.interval_count,
        trial_period_days: remote
            .trial_period_days
            .clone()
            .merge(existing.and_then(|p| p.trial_period_days)),
        active: remote.active,
        metadata: remote
            .metadata
            .clone()
            .merge(existing.map(|p| p.metadata.clone()))
            .unwrap_or_default(),
    })
}

pub struct PlanUseCases {
    plan_repo: Arc<dyn PlanRepo>,
    stripe: Arc<dyn StripeApi>,
}

impl PlanUseCases {
    pub fn new(plan_repo: Arc<dyn PlanRepo>, stripe: Arc<dyn StripeApi>) -> Self {
        Self { plan_repo, stripe }
    }

    pub async fn get_plan(&self, id: Uuid) -> AppResult<Plan> {
        self.plan_repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn sync_plan(&self, remote: &RemotePlan) -> AppResult<Plan> {
        let existing = self.plan_repo.get_by_stripe_id(&remote.id).await?;
        let input = map_remote_plan(remote, existing.as_ref())?;
        let plan = self.plan_repo.upsert(&input).await?;
        tracing::debug!(plan_id = %plan.id, stripe_id = %plan.stripe_id, "Synced plan");
        Ok(plan)
    }

    /// Local plan by remote id, pulling it from the platform on a miss.
    pub async fn get_or_sync_plan(&self, stripe_id: &str) -> AppResult<Plan> {
        if let Some(plan) = self.plan_repo.get_by_stripe_id(stripe_id).await? {
            return Ok(plan);
        }
        let remote = self.stripe.retrieve_plan(stripe_id).await?;
        self.sync_plan(&remote).await
    }

    /// Re-read a plan from the platform and overwrite the local row.
    pub async fn refresh_plan(&self, stripe_id: &str) -> AppResult<Plan> {
        let remote = self.stripe.retrieve_plan(stripe_id).await?;
        self.sync_plan(&remote).await
    }
}
