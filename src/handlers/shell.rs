use super::common::success_response;
use crate::auth::AuthRouterExt;
use crate::errors::ServiceError;
use crate::shell::{
    IpcMessage, Notification, NotificationLevel, ShellCommand, ShellSnapshot, WindowState,
};
use crate::{ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NotifyRequest {
    pub level: NotificationLevel,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub body: String,
}

/// Desktop shell bridge, mounted at `/shell`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ipc", post(ipc))
        .route("/notify", post(notify))
        .route("/state", get(shell_state))
        .with_auth()
}

/// Window command from the shell chrome: `minimize`, `maximize` or `close`
#[utoipa::path(
    post,
    path = "/shell/ipc",
    request_body = IpcMessage,
    responses(
        (status = 200, description = "Resulting window state", body = ApiResponse<WindowState>),
        (status = 400, description = "Unknown channel or window closed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Shell"
)]
pub async fn ipc(
    State(state): State<AppState>,
    Json(message): Json<IpcMessage>,
) -> Result<Json<ApiResponse<WindowState>>, ServiceError> {
    let command = ShellCommand::try_from(&message)?;
    Ok(success_response(state.shell.dispatch(command).await?))
}

#[utoipa::path(
    post,
    path = "/shell/notify",
    request_body = NotifyRequest,
    responses(
        (status = 202, description = "Notification queued"),
        (status = 400, description = "Invalid notification", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Shell"
)]
pub async fn notify(
    State(state): State<AppState>,
    Json(request): Json<NotifyRequest>,
) -> Result<StatusCode, ServiceError> {
    request.validate()?;
    state
        .shell
        .notify(Notification::new(request.level, request.title, request.body))
        .await;
    Ok(StatusCode::ACCEPTED)
}

/// Window state and recent notifications
#[utoipa::path(
    get,
    path = "/shell/state",
    responses((status = 200, description = "Shell snapshot", body = ApiResponse<ShellSnapshot>)),
    security(("Bearer" = [])),
    tag = "Shell"
)]
pub async fn shell_state(State(state): State<AppState>) -> Json<ApiResponse<ShellSnapshot>> {
    success_response(state.shell.snapshot().await)
}
