//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileSettingsStore, GeminiTextAdapter, WebhookDeliveryAdapter},
    composer::{Composer, Timings},
    config::{Config, ConfigError},
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let generator = Arc::new(GeminiTextAdapter::from_settings(
        config.gemini_api_key.as_deref(),
        &config.generation_api_base,
        config.generation_model.clone(),
    ));

    let delivery = Arc::new(WebhookDeliveryAdapter::new(reqwest::Client::builder().build()?));

    info!("Using settings file {}", config.settings_path.display());
    let settings = Arc::new(FileSettingsStore::new(config.settings_path.clone()));

    // --- 3. Build the Composer & Shared AppState ---
    let composer = Composer::load(generator, delivery, settings, Timings::default()).await;
    let app_state = Arc::new(AppState { composer });

    // --- 4. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
