//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Every handler answers with the
//! composer state as it stands after the action.

use crate::composer::{ComposerError, ComposerSnapshot};
use crate::web::protocol::{
    AiStatusView, ComposerView, ConfigPayload, DraftView, GenerateRequest,
    NotificationKindView, NotificationView, RefineRequest, SendingStatusView, ToneView,
    UpdateDraftRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use mailer_core::domain::Tone;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_composer_handler,
        update_draft_handler,
        clear_draft_handler,
        send_handler,
        generate_handler,
        refine_handler,
        dismiss_notification_handler,
        open_settings_handler,
        close_settings_handler,
        save_settings_handler,
        list_tones_handler,
    ),
    components(
        schemas(
            ComposerView, DraftView, ConfigPayload, NotificationView, NotificationKindView,
            SendingStatusView, AiStatusView, ToneView, UpdateDraftRequest, GenerateRequest,
            RefineRequest
        )
    ),
    tags(
        (name = "CF Mailer API", description = "Compose, rewrite and deliver email drafts to a worker endpoint.")
    )
)]
pub struct ApiDoc;

type HandlerResult = Result<Json<ComposerView>, (StatusCode, String)>;

fn view(snapshot: &ComposerSnapshot) -> Json<ComposerView> {
    Json(ComposerView::from(snapshot))
}

/// Rejections are conflicts with the current state; port failures are server errors.
fn reject(e: ComposerError) -> (StatusCode, String) {
    match e {
        ComposerError::Rejected(reason) => (StatusCode::CONFLICT, reason.to_string()),
        ComposerError::Port(e) => {
            error!("Composer request failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        ComposerError::Task(e) => {
            error!("Composer task failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

//=========================================================================================
// Draft Handlers
//=========================================================================================

/// Read the current composer state.
#[utoipa::path(
    get,
    path = "/composer",
    responses((status = 200, description = "Current composer state", body = ComposerView))
)]
pub async fn get_composer_handler(State(app_state): State<Arc<AppState>>) -> Json<ComposerView> {
    view(&app_state.composer.snapshot())
}

/// Edit the subject and/or body of the draft.
#[utoipa::path(
    put,
    path = "/composer/draft",
    request_body = UpdateDraftRequest,
    responses((status = 200, description = "Draft updated", body = ComposerView))
)]
pub async fn update_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<UpdateDraftRequest>,
) -> Json<ComposerView> {
    let composer = &app_state.composer;
    if let Some(subject) = request.subject {
        composer.set_subject(subject).await;
    }
    if let Some(body) = request.body {
        composer.set_body(body).await;
    }
    view(&composer.snapshot())
}

/// Reset subject and body to empty.
#[utoipa::path(
    delete,
    path = "/composer/draft",
    responses((status = 200, description = "Draft cleared", body = ComposerView))
)]
pub async fn clear_draft_handler(State(app_state): State<Arc<AppState>>) -> Json<ComposerView> {
    view(&app_state.composer.clear_draft().await)
}

//=========================================================================================
// Action Handlers
//=========================================================================================

/// Deliver the draft to the configured worker.
///
/// Answers once delivery has settled; a failed delivery is reported through
/// `sendingStatus` and the notification, not through the HTTP status.
#[utoipa::path(
    post,
    path = "/composer/send",
    responses(
        (status = 200, description = "Delivery settled", body = ComposerView),
        (status = 409, description = "A send is in progress or the body is empty")
    )
)]
pub async fn send_handler(State(app_state): State<Arc<AppState>>) -> HandlerResult {
    let outcome = app_state.composer.request_send().await.map_err(reject)?;
    info!(?outcome, "Send request settled.");
    Ok(view(&app_state.composer.snapshot()))
}

/// Replace the body with text generated from a free-form prompt.
#[utoipa::path(
    post,
    path = "/composer/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generation settled", body = ComposerView),
        (status = 409, description = "The prompt is empty or an AI request is in progress")
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> HandlerResult {
    let outcome = app_state
        .composer
        .request_generate(&request.prompt)
        .await
        .map_err(reject)?;
    info!(?outcome, "Generate request settled.");
    Ok(view(&app_state.composer.snapshot()))
}

/// List the tones a body can be refined into, in button order.
#[utoipa::path(
    get,
    path = "/composer/tones",
    responses((status = 200, description = "Available tones", body = Vec<ToneView>))
)]
pub async fn list_tones_handler() -> Json<Vec<ToneView>> {
    Json(Tone::ALL.into_iter().map(ToneView::from).collect())
}

/// Rewrite the current body into one of the fixed tones.
#[utoipa::path(
    post,
    path = "/composer/refine",
    request_body = RefineRequest,
    responses(
        (status = 200, description = "Refinement settled", body = ComposerView),
        (status = 400, description = "Unknown tone"),
        (status = 409, description = "The body is empty or an AI request is in progress")
    )
)]
pub async fn refine_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<RefineRequest>,
) -> HandlerResult {
    let tone = request
        .tone
        .parse::<Tone>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let outcome = app_state
        .composer
        .request_refine(tone)
        .await
        .map_err(reject)?;
    info!(?outcome, %tone, "Refine request settled.");
    Ok(view(&app_state.composer.snapshot()))
}

/// Hide the visible notification.
#[utoipa::path(
    delete,
    path = "/composer/notification",
    responses((status = 200, description = "Notification dismissed", body = ComposerView))
)]
pub async fn dismiss_notification_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<ComposerView> {
    view(&app_state.composer.dismiss_notification().await)
}

//=========================================================================================
// Settings Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/settings/open",
    responses((status = 200, description = "Settings dialog opened", body = ComposerView))
)]
pub async fn open_settings_handler(State(app_state): State<Arc<AppState>>) -> Json<ComposerView> {
    view(&app_state.composer.open_settings().await)
}

#[utoipa::path(
    post,
    path = "/settings/close",
    responses((status = 200, description = "Settings dialog closed", body = ComposerView))
)]
pub async fn close_settings_handler(State(app_state): State<Arc<AppState>>) -> Json<ComposerView> {
    view(&app_state.composer.close_settings().await)
}

/// Replace and persist the worker endpoint and token.
#[utoipa::path(
    put,
    path = "/settings",
    request_body = ConfigPayload,
    responses(
        (status = 200, description = "Settings saved and applied", body = ComposerView),
        (status = 500, description = "Settings applied but could not be persisted")
    )
)]
pub async fn save_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ConfigPayload>,
) -> HandlerResult {
    let snapshot = app_state
        .composer
        .save_settings(payload.into())
        .await
        .map_err(reject)?;
    Ok(view(&snapshot))
}
