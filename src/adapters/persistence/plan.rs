use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::plan::{PlanRepo, PlanUpsert},
    domain::entities::plan::Plan,
};

fn row_to_plan(row: &sqlx::postgres::PgRow) -> Plan {
    let id: Uuid = row.get("id");
    let metadata_json: serde_json::Value = row.get("metadata");
    let metadata: HashMap<String, String> =
        parse_json_with_fallback(&metadata_json, "metadata", "plan", &id.to_string());

    Plan {
        id,
        stripe_id: row.get("stripe_id"),
        name: row.get("name"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        interval: row.get("interval"),
        interval_count: row.get("interval_count"),
        trial_period_days: row.get("trial_period_days"),
        active: row.get("active"),
        metadata,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, stripe_id, name, amount, currency, interval, interval_count,
    trial_period_days, active, metadata, created_at, updated_at
"#;

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!("SELECT {} FROM plans WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan))
    }

    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE stripe_id = $1",
            SELECT_COLS
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan))
    }

    async fn upsert(&self, input: &PlanUpsert) -> AppResult<Plan> {
        let metadata = serde_json::to_value(&input.metadata)
            .map_err(|e| AppError::Internal(format!("Failed to encode plan metadata: {}", e)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO plans (
                id, stripe_id, name, amount, currency, interval, interval_count,
                trial_period_days, active, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
            ON CONFLICT (stripe_id) DO UPDATE SET
                name = EXCLUDED.name,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                interval = EXCLUDED.interval,
                interval_count = EXCLUDED.interval_count,
                trial_period_days = EXCLUDED.trial_period_days,
                active = EXCLUDED.active,
                metadata = EXCLUDED.metadata,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.stripe_id)
        .bind(&input.name)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.interval)
        .bind(input.interval_count)
        .bind(input.trial_period_days)
        .bind(input.active)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_plan(&row))
    }
}
