use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/active-subscription", get(active_subscription))
        .route("/{id}/orders", get(list_orders))
        .route("/{id}/sync-subscriptions", post(sync_subscriptions))
}

#[derive(Deserialize)]
struct ActiveSubscriptionQuery {
    plan_id: Option<Uuid>,
}

#[derive(Serialize)]
struct ActiveSubscriptionResponse {
    customer_id: Uuid,
    plan_id: Option<Uuid>,
    /// Restricted to `plan_id` when one was given.
    has_active_subscription: bool,
    has_any_active_subscription: bool,
}

async fn active_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActiveSubscriptionQuery>,
) -> AppResult<impl IntoResponse> {
    let customers = &app_state.customer_use_cases;
    let has_active_subscription = customers.has_active_subscription(id, query.plan_id).await?;
    let has_any_active_subscription = customers.has_any_active_subscription(id).await?;

    Ok(Json(ActiveSubscriptionResponse {
        customer_id: id,
        plan_id: query.plan_id,
        has_active_subscription,
        has_any_active_subscription,
    }))
}

async fn list_orders(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let orders = app_state.order_use_cases.list_for_customer(id).await?;
    Ok(Json(orders))
}

async fn sync_subscriptions(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let subs = app_state
        .subscription_use_cases
        .sync_for_customer(id)
        .await?;
    Ok(Json(subs))
}
