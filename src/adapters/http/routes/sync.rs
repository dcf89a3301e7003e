//! Pull a single remote object into the local store by its platform id.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/{stripe_id}", post(sync_subscription))
        .route("/orders/{stripe_id}", post(sync_order))
        .route("/plans/{stripe_id}", post(sync_plan))
        .route("/customers/{stripe_id}", post(sync_customer))
}

async fn sync_subscription(
    State(app_state): State<AppState>,
    Path(stripe_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let sub = app_state
        .subscription_use_cases
        .sync_remote_by_stripe_id(&stripe_id)
        .await?;
    Ok(Json(sub))
}

async fn sync_order(
    State(app_state): State<AppState>,
    Path(stripe_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let order = app_state.order_use_cases.refresh_order(&stripe_id).await?;
    Ok(Json(order))
}

async fn sync_plan(
    State(app_state): State<AppState>,
    Path(stripe_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.refresh_plan(&stripe_id).await?;
    Ok(Json(plan))
}

async fn sync_customer(
    State(app_state): State<AppState>,
    Path(stripe_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let customer = app_state
        .customer_use_cases
        .refresh_customer(&stripe_id)
        .await?;
    Ok(Json(customer))
}
