// SPDX-License-Identifier: MIT

//! Local development server
//!
//! Serves the classification endpoints the client talks to from an
//! in-memory rule store and the local evaluator. Every caller is treated as
//! a signed-in administrator.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{ClassifierError, Result, Role, User};
use crate::classification::jobs::ResponseDraft;
use crate::classification::preview::{EvaluationResult, Evaluator, LocalEvaluator, TestRequest};
use crate::classification::rules::{ClassificationRule, MemoryRuleStore, RuleStore};

type Responses = HashMap<(String, i64), ResponseDraft>;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn RuleStore>,
    evaluator: Arc<dyn Evaluator>,
    responses: Arc<RwLock<Responses>>,
}

pub async fn serve(port: u16) -> Result<()> {
    let app = router(Arc::new(MemoryRuleStore::new()));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes over `store`, evaluated by a [`LocalEvaluator`] on the same store
pub fn router(store: Arc<dyn RuleStore>) -> Router {
    let state = AppState {
        evaluator: Arc::new(LocalEvaluator::new(store.clone())),
        store,
        responses: Arc::new(RwLock::new(HashMap::new())),
    };

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/auth/status", get(auth_status))
        .route("/api/classification/rules", get(list_rules).post(create_rule))
        .route("/api/classification/rules/export", get(export_rules))
        .route("/api/classification/rules/import", post(import_rules))
        .route(
            "/api/classification/rules/{id}",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/api/classification/test", post(test_classification))
        .route("/api/vulnerabilities/refresh/status", get(job_status))
        .route("/api/assessment/{token}/response", post(save_response))
        .route("/api/assessment/{token}/responses", get(list_responses))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

impl IntoResponse for ClassifierError {
    fn into_response(self) -> Response {
        let status = match &self {
            ClassifierError::Validation(_)
            | ClassifierError::Edit(_)
            | ClassifierError::Json(_)
            | ClassifierError::Yaml(_) => StatusCode::BAD_REQUEST,
            ClassifierError::NotFound { .. } => StatusCode::NOT_FOUND,
            ClassifierError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ClassifierError::Forbidden(_) => StatusCode::FORBIDDEN,
            ClassifierError::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn auth_status() -> Json<User> {
    Json(User {
        id: Some(1),
        username: "admin".to_string(),
        email: None,
        roles: vec![Role::User, Role::Admin],
    })
}

async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<ClassificationRule>>> {
    Ok(Json(state.store.list().await?))
}

async fn create_rule(
    State(state): State<AppState>,
    Json(rule): Json<ClassificationRule>,
) -> Result<(StatusCode, Json<ClassificationRule>)> {
    let stored = state.store.create(&rule).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ClassificationRule>> {
    Ok(Json(state.store.get(id).await?))
}

async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(rule): Json<ClassificationRule>,
) -> Result<Json<ClassificationRule>> {
    Ok(Json(state.store.update(id, &rule).await?))
}

async fn delete_rule(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_rules(State(state): State<AppState>) -> Result<Json<Vec<ClassificationRule>>> {
    Ok(Json(state.store.export().await?))
}

async fn import_rules(
    State(state): State<AppState>,
    Json(rules): Json<Vec<ClassificationRule>>,
) -> Result<Json<Value>> {
    let imported = state.store.import(&rules).await?;
    Ok(Json(json!({ "imported": imported })))
}

async fn test_classification(
    State(state): State<AppState>,
    Json(request): Json<TestRequest>,
) -> Result<Json<EvaluationResult>> {
    Ok(Json(state.evaluator.evaluate(&request).await?))
}

/// No refresh jobs run locally
async fn job_status() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn save_response(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(draft): Json<ResponseDraft>,
) -> Json<ResponseDraft> {
    log::debug!(
        "Saved answer {:?} for requirement {} in assessment {}",
        draft.answer,
        draft.requirement_id,
        token
    );
    state
        .responses
        .write()
        .await
        .insert((token, draft.requirement_id), draft.clone());
    Json(draft)
}

async fn list_responses(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<Vec<ResponseDraft>> {
    let responses = state.responses.read().await;
    let mut drafts: Vec<ResponseDraft> = responses
        .iter()
        .filter(|((t, _), _)| *t == token)
        .map(|(_, draft)| draft.clone())
        .collect();
    drafts.sort_by_key(|d| d.requirement_id);
    Json(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let status = |e: ClassifierError| e.into_response().status();
        assert_eq!(status(ClassifierError::not_found("rule", 1)), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ClassifierError::Validation(Default::default())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(ClassifierError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ClassifierError::Forbidden("Admin".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(ClassifierError::api(409, "conflict")), StatusCode::CONFLICT);
        assert_eq!(
            status(ClassifierError::Other("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
