// HTTP route handlers for the Autotest API

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use autotest_common::store::{StoreError, StoreResult};
use autotest_common::types::{TaskId, TestAddress, TestDefinition, ToleranceFilters, Visibility};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

const SCRIPT_FILE_NAME: &str = "run.sh";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct NamesResponse {
    pub names: Vec<String>,
}

/// JSON `{ "error": .. }` with the status matching the failure
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::Rejected(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Count the outcome of a store call and turn failures into API errors
fn track<T>(operation: &'static str, task: &TaskId, result: StoreResult<T>) -> Result<T, ApiError> {
    match result {
        Ok(value) => {
            metrics::record(operation, "ok");
            Ok(value)
        }
        Err(e) => {
            let outcome = match e {
                StoreError::Rejected(_) => "rejected",
                StoreError::NotFound(_) => "not_found",
                StoreError::Backend(_) => "error",
            };
            metrics::record(operation, outcome);
            match &e {
                StoreError::Backend(msg) => {
                    error!(course = %task.course_code, task = %task.task, operation, error = %msg, "Store request failed")
                }
                other => {
                    warn!(course = %task.course_code, task = %task.task, operation, error = %other, "Store refused request")
                }
            }
            Err(e.into())
        }
    }
}

fn parse_visibility(raw: &str) -> Result<Visibility, ApiError> {
    raw.parse::<Visibility>().map_err(ApiError::invalid)
}

fn check_definition(operation: &'static str, definition: &TestDefinition) -> Result<(), ApiError> {
    definition.validate().map_err(|msg| {
        metrics::record(operation, "invalid");
        ApiError::invalid(msg)
    })
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /tasks/:course/:task/tests/:visibility - Names of one class, newest first
pub async fn list_tests(
    State(state): State<Arc<AppState>>,
    Path((course, task, visibility)): Path<(String, String, String)>,
) -> Result<Json<NamesResponse>, ApiError> {
    let task = TaskId::new(course, task);
    let visibility = parse_visibility(&visibility)?;
    let names = track(
        "list",
        &task,
        state.backend.list_names(&task, visibility).await,
    )?;
    Ok(Json(NamesResponse { names }))
}

/// POST /tasks/:course/:task/tests - Store a new test
pub async fn create_test(
    State(state): State<Arc<AppState>>,
    Path((course, task)): Path<(String, String)>,
    Json(definition): Json<TestDefinition>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let task = TaskId::new(course, task);
    check_definition("create", &definition)?;
    let message = track("create", &task, state.backend.create(&task, &definition).await)?;

    info!(
        course = %task.course_code,
        task = %task.task,
        test = %definition.name,
        visibility = %definition.visibility,
        "Test created"
    );
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

/// GET /tasks/:course/:task/tests/:visibility/:name - One full definition
pub async fn get_test(
    State(state): State<Arc<AppState>>,
    Path((course, task, visibility, name)): Path<(String, String, String, String)>,
) -> Result<Json<TestDefinition>, ApiError> {
    let task = TaskId::new(course, task);
    let address = TestAddress::new(name, parse_visibility(&visibility)?);
    let definition = track("read", &task, state.backend.read(&task, &address).await)?;
    Ok(Json(definition))
}

/// PUT /tasks/:course/:task/tests/:visibility/:name - Replace the test at this address
pub async fn update_test(
    State(state): State<Arc<AppState>>,
    Path((course, task, visibility, name)): Path<(String, String, String, String)>,
    Json(definition): Json<TestDefinition>,
) -> Result<Json<MessageResponse>, ApiError> {
    let task = TaskId::new(course, task);
    let address = TestAddress::new(name, parse_visibility(&visibility)?);
    check_definition("update", &definition)?;
    let message = track(
        "update",
        &task,
        state.backend.update(&task, &address, &definition).await,
    )?;

    info!(
        course = %task.course_code,
        task = %task.task,
        from = %address,
        to = %definition.address(),
        "Test updated"
    );
    Ok(Json(MessageResponse { message }))
}

/// DELETE /tasks/:course/:task/tests/:visibility/:name
pub async fn delete_test(
    State(state): State<Arc<AppState>>,
    Path((course, task, visibility, name)): Path<(String, String, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let task = TaskId::new(course, task);
    let address = TestAddress::new(name, parse_visibility(&visibility)?);
    let message = track("delete", &task, state.backend.delete(&task, &address).await)?;

    info!(course = %task.course_code, task = %task.task, test = %address, "Test deleted");
    Ok(Json(MessageResponse { message }))
}

/// PUT /tasks/:course/:task/script/:visibility - Raw script bytes for one target
pub async fn upload_script(
    State(state): State<Arc<AppState>>,
    Path((course, task, visibility)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let task = TaskId::new(course, task);
    let target = parse_visibility(&visibility)?;
    let message = track(
        "upload_script",
        &task,
        state.backend.upload_script(&task, target, &body).await,
    )?;

    info!(
        course = %task.course_code,
        task = %task.task,
        target = target.target_name(),
        bytes = body.len(),
        "Script uploaded"
    );
    Ok(Json(MessageResponse { message }))
}

/// GET /tasks/:course/:task/script - The current script as a download
pub async fn download_script(
    State(state): State<Arc<AppState>>,
    Path((course, task)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let task = TaskId::new(course, task);
    let script = track("fetch_script", &task, state.backend.fetch_script(&task).await)?;

    let Some(bytes) = script else {
        return Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: "No script file to be downloaded.".to_string(),
        });
    };

    let disposition = format!(
        "attachment; filename=\"{}_{}_{}\"",
        task.course_code,
        task.task_segment(),
        SCRIPT_FILE_NAME
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/x-shellscript".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /tasks/:course/:task/tolerance
pub async fn get_tolerance(
    State(state): State<Arc<AppState>>,
    Path((course, task)): Path<(String, String)>,
) -> Result<Json<ToleranceFilters>, ApiError> {
    let task = TaskId::new(course, task);
    let filters = track(
        "tolerance",
        &task,
        state.backend.tolerance_filters(&task).await,
    )?;
    Ok(Json(filters))
}

/// PUT /tasks/:course/:task/tolerance
pub async fn set_tolerance(
    State(state): State<Arc<AppState>>,
    Path((course, task)): Path<(String, String)>,
    Json(filters): Json<ToleranceFilters>,
) -> Result<Json<MessageResponse>, ApiError> {
    let task = TaskId::new(course, task);
    let message = track(
        "set_tolerance",
        &task,
        state.backend.set_tolerance_filters(&task, filters).await,
    )?;
    Ok(Json(MessageResponse { message }))
}
