use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::order::{OrderRepo, OrderUpsert},
    domain::entities::order::Order,
};

fn row_to_order(row: &sqlx::postgres::PgRow) -> Order {
    Order {
        id: row.get("id"),
        stripe_id: row.get("stripe_id"),
        customer_id: row.get("customer_id"),
        status: row.get("status"),
        amount_subtotal: row.get("amount_subtotal"),
        amount_total: row.get("amount_total"),
        currency: row.get("currency"),
        application: row.get("application"),
        client_secret: row.get("client_secret"),
        ip_address: row.get("ip_address"),
        payment_intent: row.get("payment_intent"),
        automatic_tax: row.get("automatic_tax"),
        billing_details: row.get("billing_details"),
        discounts: row.get("discounts"),
        line_items: row.get("line_items"),
        payment: row.get("payment"),
        shipping_cost: row.get("shipping_cost"),
        shipping_details: row.get("shipping_details"),
        tax_details: row.get("tax_details"),
        total_details: row.get("total_details"),
        created: row.get("created"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, stripe_id, customer_id, status, amount_subtotal, amount_total, currency,
    application, client_secret, ip_address, payment_intent, automatic_tax,
    billing_details, discounts, line_items, payment, shipping_cost,
    shipping_details, tax_details, total_details, created, created_at, updated_at
"#;

#[async_trait]
impl OrderRepo for PostgresPersistence {
    async fn get_by_stripe_id(&self, stripe_id: &str) -> AppResult<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE stripe_id = $1",
            SELECT_COLS
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_order))
    }

    async fn upsert(&self, input: &OrderUpsert) -> AppResult<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (
                id, stripe_id, customer_id, status, amount_subtotal, amount_total, currency,
                application, client_secret, ip_address, payment_intent, automatic_tax,
                billing_details, discounts, line_items, payment, shipping_cost,
                shipping_details, tax_details, total_details, created, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, NOW(), NOW())
            ON CONFLICT (stripe_id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                status = EXCLUDED.status,
                amount_subtotal = EXCLUDED.amount_subtotal,
                amount_total = EXCLUDED.amount_total,
                currency = EXCLUDED.currency,
                application = EXCLUDED.application,
                client_secret = EXCLUDED.client_secret,
                ip_address = EXCLUDED.ip_address,
                payment_intent = EXCLUDED.payment_intent,
                automatic_tax = EXCLUDED.automatic_tax,
                billing_details = EXCLUDED.billing_details,
                discounts = EXCLUDED.discounts,
                line_items = EXCLUDED.line_items,
                payment = EXCLUDED.payment,
                shipping_cost = EXCLUDED.shipping_cost,
                shipping_details = EXCLUDED.shipping_details,
                tax_details = EXCLUDED.tax_details,
                total_details = EXCLUDED.total_details,
                created = EXCLUDED.created,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.stripe_id)
        .bind(input.customer_id)
        .bind(input.status)
        .bind(input.amount_subtotal)
        .bind(input.amount_total)
        .bind(&input.currency)
        .bind(&input.application)
        .bind(&input.client_secret)
        .bind(&input.ip_address)
        .bind(&input.payment_intent)
        .bind(&input.automatic_tax)
        .bind(&input.billing_details)
        .bind(&input.discounts)
        .bind(&input.line_items)
        .bind(&input.payment)
        .bind(&input.shipping_cost)
        .bind(&input.shipping_details)
        .bind(&input.tax_details)
        .bind(&input.total_details)
        .bind(input.created)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_order(&row))
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE customer_id = $1 ORDER BY created DESC",
            SELECT_COLS
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_order).collect())
    }
}
