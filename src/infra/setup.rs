use crate::{
    adapters::http::app_state::AppState,
    application::ports::stripe_api::StripeApi,
    infra::{
        config::AppConfig, error::InfraError, postgres_persistence, stripe_client::StripeClient,
    },
    use_cases::{
        customer::{CustomerRepo, CustomerUseCases},
        order::{OrderRepo, OrderUseCases},
        plan::{PlanRepo, PlanUseCases},
        subscription::{SubscriptionRepo, SubscriptionUseCases},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let stripe = Arc::new(
        StripeClient::new(config.stripe_secret_key.clone(), &config.stripe_api_base)
            .map_err(InfraError::HttpClient)?,
    ) as Arc<dyn StripeApi>;

    let customer_repo_arc = postgres_arc.clone() as Arc<dyn CustomerRepo>;
    let plan_repo_arc = postgres_arc.clone() as Arc<dyn PlanRepo>;
    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let order_repo_arc = postgres_arc.clone() as Arc<dyn OrderRepo>;

    let customer_use_cases = Arc::new(CustomerUseCases::new(
        customer_repo_arc,
        subscription_repo_arc.clone(),
        stripe.clone(),
        config.default_currency.clone(),
    ));

    let plan_use_cases = Arc::new(PlanUseCases::new(plan_repo_arc, stripe.clone()));

    let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
        subscription_repo_arc,
        customer_use_cases.clone(),
        plan_use_cases.clone(),
        stripe.clone(),
        config.sync_settings(),
    ));

    let order_use_cases = Arc::new(OrderUseCases::new(
        order_repo_arc,
        customer_use_cases.clone(),
        stripe,
    ));

    Ok(AppState {
        config: Arc::new(config),
        customer_use_cases,
        plan_use_cases,
        subscription_use_cases,
        order_use_cases,
    })
}

pub fn init_tracing(log_file: Option<&str>) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stripe_sync=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let json_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|source| InfraError::LogFile {
                path: path.to_string(),
                source,
            })?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(true)
                    .with_span_list(true)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();

    Ok(())
}
