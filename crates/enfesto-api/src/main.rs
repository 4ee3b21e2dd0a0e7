use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use enfesto_core::{
    ingest, InMemoryLogStore, InMemoryModelStore, ItemInput, LogStore, ModelStore,
    OptimizationLog, OptimizationResult, OptimizationSession, OptimizerError, RawRecord,
    TrainedModel, TrainingLog,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::ApiConfig;

/// Stores and limits shared by every request
struct AppState {
    models: InMemoryModelStore,
    logs: InMemoryLogStore,
    max_rows: usize,
}

type SharedState = Arc<AppState>;

#[derive(Debug, Deserialize)]
struct OptimizeRequest {
    user_id: String,
    tolerance: f64,
    items: Vec<ItemInput>,
}

#[derive(Debug, Deserialize)]
struct TrainRequest {
    user_id: String,
    records: Vec<RawRecord>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ApiConfig::from_env();
    info!("Starting stack-height optimizer API");

    let state = Arc::new(AppState {
        models: InMemoryModelStore::new(),
        logs: InMemoryLogStore::new(),
        max_rows: config.max_rows(),
    });
    let app = build_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on http://{}", addr);
    info!("Try: curl http://localhost:{}/api/health", addr.port());

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/optimize", post(optimize))
        .route("/api/train", post(train))
        .route("/api/models/:user_id", get(active_model).delete(delete_models))
        .route("/api/logs/:user_id/optimizations", get(optimization_logs))
        .route(
            "/api/logs/:user_id/optimizations/:log_id",
            delete(delete_optimization_log),
        )
        .route("/api/logs/:user_id/trainings", get(training_logs))
        .route(
            "/api/logs/:user_id/trainings/:log_id",
            delete(delete_training),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "enfesto-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Main optimization endpoint
async fn optimize(
    State(state): State<SharedState>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizationResult>, AppError> {
    info!(
        "Received optimization request from '{}' with {} items at {}% tolerance",
        request.user_id,
        request.items.len(),
        request.tolerance
    );

    let items = ingest(request.items, state.max_rows)?;
    let session = OptimizationSession::new(&state.models, &state.logs);
    let result = session.optimize(&request.user_id, items, request.tolerance)?;

    info!(
        "Optimization complete: {} increased, {} decreased, {} unchanged",
        result.summary.increases, result.summary.decreases, result.summary.unchanged
    );

    Ok(Json(result))
}

async fn train(
    State(state): State<SharedState>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<TrainedModel>, AppError> {
    info!(
        "Received training request from '{}' with {} records",
        request.user_id,
        request.records.len()
    );

    let session = OptimizationSession::new(&state.models, &state.logs);
    let model = session.train(&request.user_id, &request.records)?;

    Ok(Json(model))
}

async fn active_model(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<TrainedModel>, AppError> {
    state
        .models
        .active_model(&user_id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("No active model for user '{}'", user_id)))
}

async fn delete_models(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.models.delete_models(&user_id)? {
        info!("Deleted models of '{}'", user_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("No model for user '{}'", user_id)))
    }
}

async fn optimization_logs(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OptimizationLog>>, AppError> {
    Ok(Json(state.logs.optimization_logs(&user_id)?))
}

async fn delete_optimization_log(
    State(state): State<SharedState>,
    Path((user_id, log_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if state.logs.delete_optimization_log(&user_id, &log_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("No optimization log '{}'", log_id)))
    }
}

async fn training_logs(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<TrainingLog>>, AppError> {
    Ok(Json(state.logs.training_logs(&user_id)?))
}

/// Removes one training entry and resets the user's model
async fn delete_training(
    State(state): State<SharedState>,
    Path((user_id, log_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let session = OptimizationSession::new(&state.models, &state.logs);
    if session.delete_training(&user_id, &log_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("No training log '{}'", log_id)))
    }
}

/// Application error type
struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    fn not_found(message: String) -> Self {
        AppError {
            status: StatusCode::NOT_FOUND,
            error: anyhow::anyhow!(message),
        }
    }
}

impl From<OptimizerError> for AppError {
    fn from(err: OptimizerError) -> Self {
        let status = match &err {
            OptimizerError::InvalidInput(_)
            | OptimizerError::InvalidQuantity { .. }
            | OptimizerError::TooManyItems { .. }
            | OptimizerError::NotEditable(_) => StatusCode::BAD_REQUEST,
            OptimizerError::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
            OptimizerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            error: err.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request error: {}", self.error);

        (
            self.status,
            Json(json!({
                "error": self.error.to_string(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> (Router, SharedState) {
        let state = Arc::new(AppState {
            models: InMemoryModelStore::new(),
            logs: InMemoryLogStore::new(),
            max_rows: 10,
        });
        (build_router(state.clone()), state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn batch(quantities: &[i64]) -> Value {
        let items: Vec<Value> = quantities
            .iter()
            .map(|q| json!({"referencia": "RefA", "cor": "Azul", "tamanho": "M", "qtd": q}))
            .collect();
        json!({"user_id": "u1", "tolerance": 5.0, "items": items})
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_optimize_without_model() {
        let (app, state) = app();

        let (status, body) = send(&app, "POST", "/api/optimize", Some(batch(&[24, 48, 36]))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["unchanged"], 3);
        assert_eq!(body["summary"]["stack_heights"]["RefA-Azul"]["best_stack_height"], 12);
        assert_eq!(body["summary"]["stack_heights"]["RefA-Azul"]["method"], "Regras");
        assert_eq!(body["items"][0]["id"], "RefA-Azul-M-1");
        assert_eq!(state.logs.optimization_logs("u1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_train_then_optimize_uses_model() {
        let (app, _) = app();
        let records: Vec<Value> = [48, 96, 144]
            .iter()
            .map(|q| json!({"Referência": "R", "Cor": "C", "Tamanho": "M", "Qtd": q, "Qtd_Otimizada": q}))
            .collect();

        let (status, model) = send(
            &app,
            "POST",
            "/api/train",
            Some(json!({"user_id": "u1", "records": records})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(model["global_stack_heights"][0], 48);

        let (status, _) = send(&app, "GET", "/api/models/u1", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "POST", "/api/optimize", Some(batch(&[47, 95]))).await;
        assert_eq!(body["summary"]["stack_heights"]["RefA-Azul"]["method"], "Modelo");
        assert_eq!(body["items"][0]["qtd_otimizada"], 48);
        assert_eq!(body["items"][1]["qtd_otimizada"], 96);

        let (_, trainings) = send(&app, "GET", "/api/logs/u1/trainings", None).await;
        assert_eq!(trainings[0]["status"], "Sucesso");

        let (status, _) = send(&app, "DELETE", "/api/models/u1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", "/api/models/u1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_input_errors_are_bad_requests() {
        let (app, _) = app();

        let (status, body) = send(&app, "POST", "/api/optimize", Some(batch(&[12, 0]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid quantity"));

        let (status, _) = send(&app, "POST", "/api/optimize", Some(batch(&[12; 11]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/train",
            Some(json!({"user_id": "u1", "records": []})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_optimization_log_can_be_deleted() {
        let (app, _) = app();
        send(&app, "POST", "/api/optimize", Some(batch(&[24, 36]))).await;

        let (_, logs) = send(&app, "GET", "/api/logs/u1/optimizations", None).await;
        let id = logs[0]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/logs/u1/optimizations/{}", id);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_training_deletion_resets_model() {
        let (app, _) = app();
        let records: Vec<Value> = [48, 96]
            .iter()
            .map(|q| json!({"Referência": "R", "Cor": "C", "Tamanho": "M", "Qtd": q, "Qtd_Otimizada": q}))
            .collect();
        send(
            &app,
            "POST",
            "/api/train",
            Some(json!({"user_id": "u1", "records": records})),
        )
        .await;

        let (_, trainings) = send(&app, "GET", "/api/logs/u1/trainings", None).await;
        let id = trainings[0]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/logs/u1/trainings/{}", id);

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", "/api/models/u1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
