use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::stripe_api::{RemoteCustomer, StripeApi, timestamp_to_datetime},
    application::use_cases::subscription::SubscriptionRepo,
    domain::entities::customer::{Customer, any_valid_subscription},
};

#[derive(Debug, Clone)]
pub struct CustomerUpsert {
    pub stripe_id: String,
    pub email: Option<String>,
    pub description: Option<String>,
    pub currency: String,
    pub balance: i64,
    pub delinquent: bool,
    pub deleted: bool,
    pub created: Option<chrono::DateTime<Utc>>,
}

#[async_trait]
pub trait CustomerRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Customer>>;
    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Customer>>;
    /// Update-or-create keyed by `stripe_id`.
    async fn upsert(&self, input: &CustomerUpsert) -> AppResult<Customer>;
}

/// Map a remote customer onto the local row.
///
/// A deleted remote customer only carries its id, so everything except the
/// `deleted` flag is taken from the existing row.
pub fn map_remote_customer(
    remote: &RemoteCustomer,
    existing: Option<&Customer>,
    default_currency: &str,
) -> AppResult<CustomerUpsert> {
    let created = remote
        .created
        .clone()
        .try_map(|ts| timestamp_to_datetime("created", ts))?
        .merge(existing.and_then(|c| c.created));

    Ok(CustomerUpsert {
        stripe_id: remote.id.clone(),
        email: remote
            .email
            .clone()
            .merge(existing.and_then(|c| c.email.clone())),
        description: remote
            .description
            .clone()
            .merge(existing.and_then(|c| c.description.clone())),
        currency: remote
            .currency
            .clone()
            .merge(existing.map(|c| c.currency.clone()))
            .unwrap_or_else(|| default_currency.to_string())
            .to_lowercase(),
        balance: remote
            .balance
            .clone()
            .merge(existing.map(|c| c.balance))
            .unwrap_or(0),
        delinquent: remote
            .delinquent
            .clone()
            .merge(existing.map(|c| c.delinquent))
            .unwrap_or(false),
        deleted: remote.deleted,
        created,
    })
}

pub struct CustomerUseCases {
    customer_repo: Arc<dyn CustomerRepo>,
    subscription_repo: Arc<dyn SubscriptionRepo>,
    stripe: Arc<dyn StripeApi>,
    default_currency: String,
}

impl CustomerUseCases {
    pub fn new(
        customer_repo: Arc<dyn CustomerRepo>,
        subscription_repo: Arc<dyn SubscriptionRepo>,
        stripe: Arc<dyn StripeApi>,
        default_currency: String,
    ) -> Self {
        Self {
            customer_repo,
            subscription_repo,
            stripe,
            default_currency,
        }
    }

    pub async fn get_customer(&self, id: Uuid) -> AppResult<Customer> {
        self.customer_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn sync_customer(&self, remote: &RemoteCustomer) -> AppResult<Customer> {
        let existing = self.customer_repo.get_by_stripe_id(&remote.id).await?;
        let input = map_remote_customer(remote, existing.as_ref(), &self.default_currency)?;
        let customer = self.customer_repo.upsert(&input).await?;
        if customer.deleted {
            tracing::info!(customer_id = %customer.id, stripe_id = %customer.stripe_id, "Customer deleted remotely");
        } else {
            tracing::debug!(customer_id = %customer.id, stripe_id = %customer.stripe_id, "Synced customer");
        }
        Ok(customer)
    }

    /// Local customer by remote id, pulling it from the platform on a miss.
    pub async fn get_or_sync_customer(&self, stripe_id: &str) -> AppResult<Customer> {
        if let Some(customer) = self.customer_repo.get_by_stripe_id(stripe_id).await? {
            return Ok(customer);
        }
        let remote = self.stripe.retrieve_customer(stripe_id).await?;
        self.sync_customer(&remote).await
    }

    pub async fn refresh_customer(&self, stripe_id: &str) -> AppResult<Customer> {
        let remote = self.stripe.retrieve_customer(stripe_id).await?;
        self.sync_customer(&remote).await
    }

    /// Whether the customer holds a valid subscription, optionally to one plan.
    pub async fn has_active_subscription(
        &self,
        customer_id: Uuid,
        plan_id: Option<Uuid>,
    ) -> AppResult<bool> {
        let customer = self.get_customer(customer_id).await?;
        let subscriptions = self.subscription_repo.list_by_customer(customer.id).await?;
        let now = Utc::now();
        Ok(any_valid_subscription(
            subscriptions
                .iter()
                .filter(|s| plan_id.is_none() || s.plan_id == plan_id),
            now,
        ))
    }

    pub async fn has_any_active_subscription(&self, customer_id: Uuid) -> AppResult<bool> {
        self.has_active_subscription(customer_id, None).await
    }
}
