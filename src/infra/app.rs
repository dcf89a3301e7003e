use axum::{Router, http, middleware};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::adapters::{
    self,
    http::{app_state::AppState, middleware::bearer_auth},
};

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .nest("/api", adapters::http::routes::router())
        .layer(middleware::from_fn_with_state(app_state.clone(), bearer_auth))
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http-request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    request_id = %request_id
                )
            }),
        )
}
