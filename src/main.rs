use std::sync::Arc;

use food_dispatch::api;
use food_dispatch::config::{Config, LogFormat};
use food_dispatch::engine::scheduler::run_assignment_scheduler;
use food_dispatch::error::AppError;
use food_dispatch::geo::geocoder::{Geocoder, MapQuestGeocoder, StaticGeocoder};
use food_dispatch::notify::{MailerSendNotifier, Notifier, OutboxNotifier};
use food_dispatch::state::{AppState, DispatchSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let geocoder = build_geocoder(&config)?;
    let notifier = build_notifier(&config)?;

    let shared_state = Arc::new(AppState::new(
        geocoder,
        notifier,
        DispatchSettings::from_config(&config),
        config.event_buffer_size,
    ));

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_assignment_scheduler(
        shared_state.clone(),
        config.assignment_interval,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn build_geocoder(config: &Config) -> Result<Arc<dyn Geocoder>, AppError> {
    if config.geocoder.mapquest_key.is_none() {
        tracing::warn!("MAPQUEST_KEY not set; addresses will only resolve from the static table");
        return Ok(Arc::new(StaticGeocoder::new()));
    }

    let geocoder = MapQuestGeocoder::new(&config.geocoder, config.gateway_timeout)?;
    Ok(Arc::new(geocoder))
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, AppError> {
    if config.mailer.api_key.is_none() {
        tracing::warn!(
            capacity = config.mailer.outbox_capacity,
            "MAILERSEND_API_KEY not set; recent emails are kept in the in-memory outbox"
        );
        return Ok(Arc::new(OutboxNotifier::with_capacity(
            config.mailer.outbox_capacity,
        )));
    }

    let notifier = MailerSendNotifier::new(&config.mailer, config.gateway_timeout)?;
    Ok(Arc::new(notifier))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
