use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        customer::CustomerUseCases, order::OrderUseCases, plan::PlanUseCases,
        subscription::SubscriptionUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub customer_use_cases: Arc<CustomerUseCases>,
    pub plan_use_cases: Arc<PlanUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub order_use_cases: Arc<OrderUseCases>,
}
