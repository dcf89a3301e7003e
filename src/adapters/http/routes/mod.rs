pub mod customers;
pub mod subscriptions;
pub mod sync;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/subscriptions", subscriptions::router())
        .nest("/customers", customers::router())
        .nest("/sync", sync::router())
}
