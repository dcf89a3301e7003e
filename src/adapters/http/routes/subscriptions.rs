use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::{
        ports::stripe_api::{FieldUpdate, RemoteField},
        use_cases::subscription::SubscriptionUpdateInput,
    },
    domain::entities::subscription::Subscription,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_subscription).patch(update_subscription))
        .route("/{id}/sync", post(sync_subscription))
        .route("/{id}/extend", post(extend_subscription))
        .route("/{id}/cancel", post(cancel_subscription))
}

/// A subscription together with its access predicates evaluated now.
#[derive(Serialize)]
struct SubscriptionResponse {
    #[serde(flatten)]
    subscription: Subscription,
    is_status_current: bool,
    is_status_temporarily_current: bool,
    is_in_trial: bool,
    is_valid: bool,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(subscription: Subscription) -> Self {
        let now = Utc::now();
        Self {
            is_status_current: subscription.is_status_current(),
            is_status_temporarily_current: subscription.is_status_temporarily_current_at(now),
            is_in_trial: subscription.is_in_trial_at(now),
            is_valid: subscription.is_valid_at(now),
            subscription,
        }
    }
}

async fn get_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sub = app_state
        .subscription_use_cases
        .get_subscription(id)
        .await?;
    Ok(Json(SubscriptionResponse::from(sub)))
}

async fn sync_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sub = app_state.subscription_use_cases.refresh(id).await?;
    Ok(Json(SubscriptionResponse::from(sub)))
}

#[derive(Deserialize)]
struct ExtendPayload {
    seconds: i64,
}

async fn extend_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExtendPayload>,
) -> AppResult<impl IntoResponse> {
    let delta = chrono::Duration::try_seconds(payload.seconds).ok_or_else(|| {
        AppError::InvalidArgument(format!("extension out of range: {}s", payload.seconds))
    })?;
    let sub = app_state.subscription_use_cases.extend(id, delta).await?;
    Ok(Json(SubscriptionResponse::from(sub)))
}

#[derive(Deserialize)]
struct CancelPayload {
    #[serde(default = "default_at_period_end")]
    at_period_end: bool,
}

fn default_at_period_end() -> bool {
    true
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelPayload>,
) -> AppResult<impl IntoResponse> {
    let sub = app_state
        .subscription_use_cases
        .cancel(id, payload.at_period_end)
        .await?;
    Ok(Json(SubscriptionResponse::from(sub)))
}

#[derive(Deserialize)]
struct UpdatePayload {
    quantity: Option<i32>,
    plan_id: Option<Uuid>,
    /// `null` clears the tax rate; a missing key leaves it alone.
    #[serde(default)]
    tax_percent: RemoteField<Decimal>,
    prorate: Option<bool>,
}

async fn update_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePayload>,
) -> AppResult<impl IntoResponse> {
    let tax_percent = match payload.tax_percent {
        RemoteField::Absent => FieldUpdate::Keep,
        RemoteField::Null => FieldUpdate::Clear,
        RemoteField::Present(value) => FieldUpdate::Set(value),
    };
    let input = SubscriptionUpdateInput {
        quantity: payload.quantity,
        plan_id: payload.plan_id,
        tax_percent,
        prorate: payload.prorate,
    };
    let sub = app_state.subscription_use_cases.update(id, input).await?;
    Ok(Json(SubscriptionResponse::from(sub)))
}
