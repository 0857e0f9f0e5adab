use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::{Campaign, Opportunity};
use crate::services::crm::{
    CampaignFilter, CampaignInput, OpportunityFilter, OpportunityInput, StageChange, StageSummary,
};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(get_campaign))
        .route("/opportunities", get(list_opportunities))
        .route("/opportunities/pipeline", get(pipeline))
        .route("/opportunities/:id", get(get_opportunity))
        .with_permission(perm::CRM_READ);

    let write = Router::new()
        .route("/campaigns", post(create_campaign))
        .route("/campaigns/:id", put(update_campaign).delete(delete_campaign))
        .route("/opportunities", post(create_opportunity))
        .route(
            "/opportunities/:id",
            put(update_opportunity).delete(delete_opportunity),
        )
        .route("/opportunities/:id/stage", put(change_stage))
        .with_permission(perm::CRM_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    params(CampaignFilter),
    responses((status = 200, description = "Campaigns", body = ApiResponse<Vec<Campaign>>)),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(filter): Query<CampaignFilter>,
) -> Result<Json<ApiResponse<Vec<Campaign>>>, ServiceError> {
    Ok(success_response(state.services.campaigns.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}",
    params(("id" = Uuid, Path, description = "Campaign id")),
    responses(
        (status = 200, description = "Campaign", body = ApiResponse<Campaign>),
        (status = 404, description = "Campaign not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Campaign>>, ServiceError> {
    Ok(success_response(state.services.campaigns.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    request_body = CampaignInput,
    responses(
        (status = 201, description = "Campaign created", body = ApiResponse<Campaign>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(input): Json<CampaignInput>,
) -> Result<(StatusCode, Json<ApiResponse<Campaign>>), ServiceError> {
    Ok(created_response(state.services.campaigns.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/campaigns/{id}",
    params(("id" = Uuid, Path, description = "Campaign id")),
    request_body = CampaignInput,
    responses(
        (status = 200, description = "Campaign updated", body = ApiResponse<Campaign>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CampaignInput>,
) -> Result<Json<ApiResponse<Campaign>>, ServiceError> {
    Ok(success_response(state.services.campaigns.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/campaigns/{id}",
    params(("id" = Uuid, Path, description = "Campaign id")),
    responses((status = 204, description = "Campaign deleted")),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.campaigns.delete(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/opportunities",
    params(OpportunityFilter),
    responses((status = 200, description = "Opportunities", body = ApiResponse<Vec<Opportunity>>)),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn list_opportunities(
    State(state): State<AppState>,
    Query(filter): Query<OpportunityFilter>,
) -> Result<Json<ApiResponse<Vec<Opportunity>>>, ServiceError> {
    Ok(success_response(
        state.services.opportunities.list(&filter).await?,
    ))
}

/// Count, value and probability-weighted value per stage
#[utoipa::path(
    get,
    path = "/api/v1/opportunities/pipeline",
    responses((status = 200, description = "Pipeline summary", body = ApiResponse<Vec<StageSummary>>)),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn pipeline(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<StageSummary>>>, ServiceError> {
    Ok(success_response(state.services.opportunities.pipeline().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/opportunities/{id}",
    params(("id" = Uuid, Path, description = "Opportunity id")),
    responses(
        (status = 200, description = "Opportunity", body = ApiResponse<Opportunity>),
        (status = 404, description = "Opportunity not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Opportunity>>, ServiceError> {
    Ok(success_response(state.services.opportunities.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/opportunities",
    request_body = OpportunityInput,
    responses(
        (status = 201, description = "Opportunity created", body = ApiResponse<Opportunity>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn create_opportunity(
    State(state): State<AppState>,
    Json(input): Json<OpportunityInput>,
) -> Result<(StatusCode, Json<ApiResponse<Opportunity>>), ServiceError> {
    Ok(created_response(
        state.services.opportunities.create(input).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/opportunities/{id}",
    params(("id" = Uuid, Path, description = "Opportunity id")),
    request_body = OpportunityInput,
    responses(
        (status = 200, description = "Opportunity updated", body = ApiResponse<Opportunity>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn update_opportunity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<OpportunityInput>,
) -> Result<Json<ApiResponse<Opportunity>>, ServiceError> {
    Ok(success_response(
        state.services.opportunities.update(id, input).await?,
    ))
}

/// Moves an opportunity to another stage; won pins 100%, lost pins 0%
#[utoipa::path(
    put,
    path = "/api/v1/opportunities/{id}/stage",
    params(("id" = Uuid, Path, description = "Opportunity id")),
    request_body = StageChange,
    responses(
        (status = 200, description = "Stage changed", body = ApiResponse<Opportunity>),
        (status = 400, description = "Invalid probability", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn change_stage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StageChange>,
) -> Result<Json<ApiResponse<Opportunity>>, ServiceError> {
    Ok(success_response(
        state.services.opportunities.change_stage(id, change).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/opportunities/{id}",
    params(("id" = Uuid, Path, description = "Opportunity id")),
    responses((status = 204, description = "Opportunity deleted")),
    security(("Bearer" = [])),
    tag = "CRM"
)]
pub async fn delete_opportunity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.opportunities.delete(id).await?;
    Ok(no_content_response())
}
