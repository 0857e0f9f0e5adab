use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::{CalendarEvent, Task};
use crate::services::projects::{
    CalendarEventInput, CalendarFilter, ProjectFilter, ProjectInput, ProjectView, TaskFilter,
    TaskInput,
};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

/// Projects, their tasks and the calendar share one permission pair
pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project))
        .route("/tasks", get(list_tasks))
        .route("/tasks/:id", get(get_task))
        .route("/calendar/events", get(list_events))
        .route("/calendar/events/:id", get(get_event))
        .with_permission(perm::PROJECTS_READ);

    let write = Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:id", put(update_project).delete(delete_project))
        .route("/tasks", post(create_task))
        .route("/tasks/:id", put(update_task).delete(delete_task))
        .route("/calendar/events", post(create_event))
        .route(
            "/calendar/events/:id",
            put(update_event).delete(delete_event),
        )
        .with_permission(perm::PROJECTS_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    params(ProjectFilter),
    responses((status = 200, description = "Projects with task counters and progress", body = ApiResponse<Vec<ProjectView>>)),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<ApiResponse<Vec<ProjectView>>>, ServiceError> {
    Ok(success_response(state.services.projects.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = ApiResponse<ProjectView>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProjectView>>, ServiceError> {
    Ok(success_response(state.services.projects.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = ProjectInput,
    responses(
        (status = 201, description = "Project created", body = ApiResponse<ProjectView>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProjectView>>), ServiceError> {
    Ok(created_response(state.services.projects.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectInput,
    responses(
        (status = 200, description = "Project updated", body = ApiResponse<ProjectView>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<ApiResponse<ProjectView>>, ServiceError> {
    Ok(success_response(state.services.projects.update(id, input).await?))
}

/// Deletes the project; its tasks stay, detached
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.projects.delete(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    params(TaskFilter),
    responses((status = 200, description = "Tasks", body = ApiResponse<Vec<Task>>)),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ServiceError> {
    Ok(success_response(state.services.tasks.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task", body = ApiResponse<Task>),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Task>>, ServiceError> {
    Ok(success_response(state.services.tasks.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    request_body = TaskInput,
    responses(
        (status = 201, description = "Task created", body = ApiResponse<Task>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<TaskInput>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ServiceError> {
    Ok(created_response(state.services.tasks.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskInput,
    responses(
        (status = 200, description = "Task updated", body = ApiResponse<Task>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TaskInput>,
) -> Result<Json<ApiResponse<Task>>, ServiceError> {
    Ok(success_response(state.services.tasks.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Projects"
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.tasks.delete(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/calendar/events",
    params(CalendarFilter),
    responses((status = 200, description = "Events in the range, by start time", body = ApiResponse<Vec<CalendarEvent>>)),
    security(("Bearer" = [])),
    tag = "Calendar"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<CalendarFilter>,
) -> Result<Json<ApiResponse<Vec<CalendarEvent>>>, ServiceError> {
    Ok(success_response(state.services.calendar.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/calendar/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = ApiResponse<CalendarEvent>),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Calendar"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CalendarEvent>>, ServiceError> {
    Ok(success_response(state.services.calendar.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/calendar/events",
    request_body = CalendarEventInput,
    responses(
        (status = 201, description = "Event created", body = ApiResponse<CalendarEvent>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Calendar"
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<CalendarEventInput>,
) -> Result<(StatusCode, Json<ApiResponse<CalendarEvent>>), ServiceError> {
    Ok(created_response(state.services.calendar.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/calendar/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = CalendarEventInput,
    responses(
        (status = 200, description = "Event updated", body = ApiResponse<CalendarEvent>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Calendar"
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CalendarEventInput>,
) -> Result<Json<ApiResponse<CalendarEvent>>, ServiceError> {
    Ok(success_response(state.services.calendar.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/calendar/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Calendar"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.calendar.delete(id).await?;
    Ok(no_content_response())
}
