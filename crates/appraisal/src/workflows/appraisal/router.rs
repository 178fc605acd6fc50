use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::blueprint::{
    DepartmentRole, DepartmentRoleId, StepDraft, StepId, WorkflowStep, WorkflowStore,
};
use super::catalog::{CatalogStore, TemplateDraft};
use super::domain::{ActorContext, AssessmentId, LayerEdits};
use super::machine::EngineError;
use super::release::ReleaseCoordinator;
use super::repository::{AssessmentFilter, AssessmentRepository};
use super::service::{AppraisalService, AssessmentView, OpenAssessment};

/// Router builder exposing the engine's HTTP surface. The actor context is
/// embedded in mutating request bodies by the upstream identity gateway.
pub fn appraisal_router<R, W, C>(service: Arc<AppraisalService<R, W, C>>) -> Router
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/appraisal/templates",
            post(create_template::<R, W, C>).get(list_templates::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/department-roles",
            post(create_department_role::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/department-roles/:id",
            put(update_department_role::<R, W, C>).delete(delete_department_role::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/workflows/:id",
            get(get_workflow::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/workflows/:id/steps",
            post(create_step::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/steps/:id",
            put(update_step::<R, W, C>).delete(delete_step::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments",
            post(open_assessment::<R, W, C>).get(list_assessments::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/release-all",
            post(release_all::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id",
            get(get_assessment::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/progress",
            get(get_progress::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/self",
            put(save_self::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/submit",
            post(submit::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/advance",
            post(advance::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/reject",
            post(reject::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/release",
            post(release::<R, W, C>),
        )
        .route(
            "/api/v1/appraisal/assessments/:id/acknowledge",
            post(acknowledge::<R, W, C>),
        )
        .with_state(service)
}

fn engine_error_response(error: EngineError) -> Response {
    let status = match &error {
        EngineError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EngineError::IncompleteEvidence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NoWorkflowConfigured => StatusCode::BAD_REQUEST,
        EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = match &error {
        EngineError::IncompleteEvidence { layer, missing } => json!({
            "error": error.to_string(),
            "layer": layer,
            "missing_kpis": missing,
        }),
        _ => json!({ "error": error.to_string() }),
    };

    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct OpenRequest {
    actor: ActorContext,
    #[serde(flatten)]
    open: OpenAssessment,
}

#[derive(Debug, Deserialize)]
struct ActorRequest {
    actor: ActorContext,
}

#[derive(Debug, Deserialize)]
struct EditRequest {
    actor: ActorContext,
    #[serde(default)]
    edits: LayerEdits,
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    actor: ActorContext,
    reason: String,
}

type ServiceState<R, W, C> = State<Arc<AppraisalService<R, W, C>>>;

async fn create_template<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Json(draft): Json<TemplateDraft>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.catalog().create_template(draft) {
        Ok(template) => (StatusCode::CREATED, Json(template)).into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn list_templates<R, W, C>(State(service): ServiceState<R, W, C>) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.catalog().list_templates() {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn create_department_role<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Json(department_role): Json<DepartmentRole>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.workflows().create_department_role(department_role) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn update_department_role<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(mut department_role): Json<DepartmentRole>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    department_role.id = DepartmentRoleId(id);
    match service.workflows().update_department_role(department_role) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn delete_department_role<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service
        .workflows()
        .delete_department_role(&DepartmentRoleId(id))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn get_workflow<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.workflows().steps_for(&DepartmentRoleId(id)) {
        Ok(steps) => (StatusCode::OK, Json(steps)).into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn create_step<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(draft): Json<StepDraft>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service
        .workflows()
        .create_step(&DepartmentRoleId(id), draft)
    {
        Ok(step) => (StatusCode::CREATED, Json(step)).into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn update_step<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(mut step): Json<WorkflowStep>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    step.id = StepId(id);
    match service.workflows().update_step(step) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn delete_step<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.workflows().delete_step(&StepId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => engine_error_response(error.into()),
    }
}

async fn open_assessment<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Json(request): Json<OpenRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.open(&request.actor, request.open) {
        Ok(assessment) => {
            (StatusCode::CREATED, Json(AssessmentView::of(&assessment))).into_response()
        }
        Err(error) => engine_error_response(error),
    }
}

async fn list_assessments<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Query(filter): Query<AssessmentFilter>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.list(&filter) {
        Ok(assessments) => {
            let views: Vec<AssessmentView> = assessments.iter().map(AssessmentView::of).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => engine_error_response(error),
    }
}

async fn get_assessment<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.get(&AssessmentId(id)) {
        Ok(assessment) => (StatusCode::OK, Json(assessment)).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn get_progress<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.progress(&AssessmentId(id)) {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn save_self<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(request): Json<EditRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.save_self(&AssessmentId(id), &request.actor, request.edits) {
        Ok(assessment) => (StatusCode::OK, Json(AssessmentView::of(&assessment))).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn submit<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.submit(&AssessmentId(id), &request.actor) {
        Ok(assessment) => (StatusCode::OK, Json(AssessmentView::of(&assessment))).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn advance<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(request): Json<EditRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.advance(&AssessmentId(id), &request.actor, request.edits) {
        Ok(assessment) => (StatusCode::OK, Json(AssessmentView::of(&assessment))).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn reject<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.reject(&AssessmentId(id), &request.actor, request.reason) {
        Ok(assessment) => (StatusCode::OK, Json(AssessmentView::of(&assessment))).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn release<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    let coordinator = ReleaseCoordinator::new(Arc::clone(&service));
    match coordinator.release_one(&AssessmentId(id), &request.actor) {
        Ok(assessment) => (StatusCode::OK, Json(AssessmentView::of(&assessment))).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn release_all<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    let coordinator = ReleaseCoordinator::new(Arc::clone(&service));
    match coordinator.release_all(&request.actor) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => engine_error_response(error),
    }
}

async fn acknowledge<R, W, C>(
    State(service): ServiceState<R, W, C>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    match service.acknowledge(&AssessmentId(id), &request.actor) {
        Ok(assessment) => (StatusCode::OK, Json(AssessmentView::of(&assessment))).into_response(),
        Err(error) => engine_error_response(error),
    }
}
