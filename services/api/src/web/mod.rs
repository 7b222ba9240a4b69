pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the API router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/composer", get(rest::get_composer_handler))
        .route(
            "/composer/draft",
            put(rest::update_draft_handler).delete(rest::clear_draft_handler),
        )
        .route("/composer/send", post(rest::send_handler))
        .route("/composer/generate", post(rest::generate_handler))
        .route("/composer/refine", post(rest::refine_handler))
        .route("/composer/tones", get(rest::list_tones_handler))
        .route("/composer/notification", delete(rest::dismiss_notification_handler))
        .route("/settings", put(rest::save_settings_handler))
        .route("/settings/open", post(rest::open_settings_handler))
        .route("/settings/close", post(rest::close_settings_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
