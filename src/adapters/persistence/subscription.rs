use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{SubscriptionRepo, SubscriptionUpsert},
    domain::entities::subscription::Subscription,
};

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        stripe_id: row.get("stripe_id"),
        customer_id: row.get("customer_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        quantity: row.get("quantity"),
        tax_percent: row.get("tax_percent"),
        start: row.get("start"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        trial_start: row.get("trial_start"),
        trial_end: row.get("trial_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        canceled_at: row.get("canceled_at"),
        ended_at: row.get("ended_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, stripe_id, customer_id, plan_id, status, quantity, tax_percent, start,
    current_period_start, current_period_end, trial_start, trial_end,
    cancel_at_period_end, canceled_at, ended_at, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE stripe_id = $1",
            SELECT_COLS
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn upsert(&self, input: &SubscriptionUpsert) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                id, stripe_id, customer_id, plan_id, status, quantity, tax_percent, start,
                current_period_start, current_period_end, trial_start, trial_end,
                cancel_at_period_end, canceled_at, ended_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW())
            ON CONFLICT (stripe_id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                quantity = EXCLUDED.quantity,
                tax_percent = EXCLUDED.tax_percent,
                start = EXCLUDED.start,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                trial_start = EXCLUDED.trial_start,
                trial_end = EXCLUDED.trial_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                canceled_at = EXCLUDED.canceled_at,
                ended_at = EXCLUDED.ended_at,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.stripe_id)
        .bind(input.customer_id)
        .bind(input.plan_id)
        .bind(input.status)
        .bind(input.quantity)
        .bind(input.tax_percent)
        .bind(input.start)
        .bind(input.current_period_start)
        .bind(input.current_period_end)
        .bind(input.trial_start)
        .bind(input.trial_end)
        .bind(input.cancel_at_period_end)
        .bind(input.canceled_at)
        .bind(input.ended_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE customer_id = $1 ORDER BY current_period_end DESC",
            SELECT_COLS
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn list_unended(&self) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE ended_at IS NULL ORDER BY updated_at ASC",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn mark_ended(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET
                status = 'canceled',
                cancel_at_period_end = FALSE,
                canceled_at = COALESCE(canceled_at, $2),
                ended_at = COALESCE(ended_at, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }
}
