//! HTTP API
//!
//! A thin axum surface over [`QuestService`]. Every handler takes the service
//! lock for its whole turn, so requests, events and reloads never interleave.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::progress::engine::StartQuestError;
use crate::quest::definition::{Category, Quest};
use crate::quest::events::QuestEvent;
use crate::service::{QuestService, ServiceError, count_problems};
use crate::tasktype::ConfigValue;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Mutex<QuestService>>,
}

impl AppState {
    pub fn new(service: QuestService) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Catalog
        .route("/api/quests", get(list_quests))
        .route("/api/quests/:id", get(get_quest))
        .route("/api/categories", get(list_categories))
        .route("/api/items", get(list_items))
        .route("/api/task-types", get(list_task_types))
        .route("/api/diagnostics", get(get_diagnostics))
        .route("/api/reload", post(reload))
        // Progress
        .route("/api/events", post(post_event))
        .route("/api/participants/:id/join", post(join))
        .route("/api/participants/:id/leave", post(leave))
        .route("/api/participants/:id/progress", get(get_progress))
        .route("/api/participants/:id/quests/:quest_id/start", post(start_quest))
        .route("/api/participants/:id/quests/:quest_id/cancel", post(cancel_quest))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotJoined(_) => StatusCode::NOT_FOUND,
            ServiceError::Start(StartQuestError::UnknownQuest(_)) => StatusCode::NOT_FOUND,
            ServiceError::Start(_) | ServiceError::NotStarted(_) => StatusCode::CONFLICT,
            ServiceError::Store(_) | ServiceError::Config(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.to_string())
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}

#[derive(Serialize)]
struct CategoryView<'a> {
    #[serde(flatten)]
    category: &'a Category,
    /// Loaded quests of this category
    quests: Vec<String>,
}

async fn list_quests(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.lock().await;
    let quests = service.manager().quests();
    let quests: Vec<&Quest> = quests.iter().map(|quest| quest.as_ref()).collect();
    Json(json!({ "quests": quests })).into_response()
}

async fn get_quest(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let service = state.service.lock().await;
    match service.manager().get(&id) {
        Some(quest) => Json(quest.as_ref()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("quest '{}' does not exist", id)),
    }
}

async fn list_categories(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.lock().await;
    let manager = service.manager();
    let categories: Vec<CategoryView> = manager
        .categories()
        .into_iter()
        .map(|category| CategoryView {
            category,
            quests: manager
                .quests_in_category(&category.id)
                .into_iter()
                .map(|quest| quest.id.clone())
                .collect(),
        })
        .collect();
    Json(json!({ "categories": categories })).into_response()
}

#[derive(Serialize)]
struct TaskTypeView<'a> {
    #[serde(rename = "type")]
    type_tag: &'static str,
    description: &'static str,
    config_values: &'a [ConfigValue],
}

async fn list_items(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.lock().await;
    Json(json!({ "items": service.manager().items().items() })).into_response()
}

async fn list_task_types(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.lock().await;
    let task_types: Vec<TaskTypeView> = service
        .task_types()
        .types()
        .map(|task_type| TaskTypeView {
            type_tag: task_type.type_tag(),
            description: task_type.description(),
            config_values: task_type.config_values(),
        })
        .collect();
    Json(json!({ "task_types": task_types })).into_response()
}

async fn get_diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.lock().await;
    let diagnostics = service.diagnostics();
    let (errors, warnings) = count_problems(diagnostics);
    Json(json!({
        "errors": errors,
        "warnings": warnings,
        "files": diagnostics,
    }))
}

async fn reload(State(state): State<AppState>) -> Response {
    let mut service = state.service.lock().await;
    match service.reload() {
        Ok(diagnostics) => {
            let (errors, warnings) = count_problems(diagnostics);
            let quests = service.manager().len();
            info!("Reload requested over HTTP: {} quests", quests);
            Json(json!({
                "success": true,
                "quests": quests,
                "errors": errors,
                "warnings": warnings,
            }))
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn post_event(State(state): State<AppState>, Json(event): Json<QuestEvent>) -> impl IntoResponse {
    let mut service = state.service.lock().await;
    Json(service.handle_event(&event))
}

async fn join(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ServiceError> {
    let mut service = state.service.lock().await;
    let started = service.join(id)?;
    Ok(Json(json!({ "success": true, "started": started })).into_response())
}

async fn leave(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ServiceError> {
    let mut service = state.service.lock().await;
    if !service.leave(id)? {
        return Err(ServiceError::NotJoined(id));
    }
    Ok(Json(json!({ "success": true })).into_response())
}

async fn get_progress(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ServiceError> {
    let service = state.service.lock().await;
    let progress = service.progress(&id).ok_or(ServiceError::NotJoined(id))?;
    Ok(Json(progress).into_response())
}

async fn start_quest(
    State(state): State<AppState>,
    Path((id, quest_id)): Path<(Uuid, String)>,
) -> Result<Response, ServiceError> {
    let mut service = state.service.lock().await;
    let start = service.start_quest(id, &quest_id)?;
    Ok(Json(json!({ "success": true, "start": start })).into_response())
}

async fn cancel_quest(
    State(state): State<AppState>,
    Path((id, quest_id)): Path<(Uuid, String)>,
) -> Result<Response, ServiceError> {
    let mut service = state.service.lock().await;
    if !service.cancel_quest(id, &quest_id)? {
        return Err(ServiceError::NotStarted(quest_id));
    }
    Ok(Json(json!({ "success": true })).into_response())
}
