use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::customer::{CustomerRepo, CustomerUpsert},
    domain::entities::customer::Customer,
};

fn row_to_customer(row: &sqlx::postgres::PgRow) -> Customer {
    Customer {
        id: row.get("id"),
        stripe_id: row.get("stripe_id"),
        email: row.get("email"),
        description: row.get("description"),
        currency: row.get("currency"),
        balance: row.get("balance"),
        delinquent: row.get("delinquent"),
        deleted: row.get("deleted"),
        created: row.get("created"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, stripe_id, email, description, currency, balance, delinquent, deleted,
    created, created_at, updated_at
"#;

#[async_trait]
impl CustomerRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_customer))
    }

    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE stripe_id = $1",
            SELECT_COLS
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_customer))
    }

    async fn upsert(&self, input: &CustomerUpsert) -> AppResult<Customer> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customers (
                id, stripe_id, email, description, currency, balance, delinquent, deleted,
                created, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            ON CONFLICT (stripe_id) DO UPDATE SET
                email = EXCLUDED.email,
                description = EXCLUDED.description,
                currency = EXCLUDED.currency,
                balance = EXCLUDED.balance,
                delinquent = EXCLUDED.delinquent,
                deleted = EXCLUDED.deleted,
                created = EXCLUDED.created,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.stripe_id)
        .bind(&input.email)
        .bind(&input.description)
        .bind(&input.currency)
        .bind(input.balance)
        .bind(input.delinquent)
        .bind(input.deleted)
        .bind(input.created)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_customer(&row))
    }
}
