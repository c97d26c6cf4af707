//! axum JSON API over [`OnboardingService`].
//!
//! The caller's identity comes from the `x-user-email` header, which the
//! fronting auth proxy sets after login.

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::access::Actor;
use crate::aggregate::OverviewFilter;
use crate::blob::FsBlobStore;
use crate::db::now_ms;
use crate::error::{ErrorCode, ServiceError, ServiceResult};
use crate::service::OnboardingService;
use crate::types::{
    Direction, FileType, NewCustomer, NewReport, NewTaskFile, Phase, PhaseInfo, StaffRole,
    TaskDefinition, TaskScope, TaskUpdate, UploadedFile,
};

/// Header carrying the authenticated email.
pub const IDENTITY_HEADER: &str = "x-user-email";

/// Shared handler state.
#[derive(Clone)]
pub struct DashboardServer {
    service: OnboardingService,
    /// Set when blobs live on local disk and should be served under `/files`.
    files: Option<Arc<FsBlobStore>>,
}

impl DashboardServer {
    pub fn new(service: OnboardingService, files: Option<Arc<FsBlobStore>>) -> Self {
        Self { service, files }
    }

    pub fn service(&self) -> &OnboardingService {
        &self.service
    }

    fn actor(&self, headers: &HeaderMap) -> ServiceResult<Actor> {
        let email = headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::unauthenticated(None))?;
        self.service.resolve_actor(email)
    }
}

/// HTTP status for each error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        c if c.is_validation() => StatusCode::BAD_REQUEST,
        c if c.is_not_found() => StatusCode::NOT_FOUND,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::AlreadyExists => StatusCode::CONFLICT,
        ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_for(self.code);
        if status.is_server_error() {
            error!(code = ?self.code, message = %self.message, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ServiceError>;

fn decode_base64(field: &str, data: &str) -> ServiceResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|_| ServiceError::invalid_value(field, "content is not valid base64"))
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct SessionResponse {
    actor: Actor,
    phases: Vec<PhaseInfo>,
}

async fn session(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<SessionResponse> {
    let actor = state.actor(&headers)?;
    Ok(Json(SessionResponse {
        actor,
        phases: state.service.phases().to_vec(),
    }))
}

#[derive(Deserialize)]
struct OverviewQuery {
    search: Option<String>,
    phase: Option<Phase>,
}

async fn overview(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<crate::aggregate::Overview> {
    let actor = state.actor(&headers)?;
    let filter = OverviewFilter {
        search: query.search,
        phase: query.phase,
    };
    Ok(Json(state.service.admin_overview(&actor, &filter)?))
}

// ----- Customers -----

async fn list_customers(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<Vec<crate::types::Customer>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.list_customers(&actor)?))
}

async fn create_customer(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Json(input): Json<NewCustomer>,
) -> Result<(StatusCode, Json<crate::types::Customer>), ServiceError> {
    let actor = state.actor(&headers)?;
    let customer = state.service.create_customer(&actor, input)?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn customer_detail(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(customer_id): Path<String>,
) -> ApiResult<crate::service::CustomerDetail> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.customer_detail(&actor, &customer_id)?))
}

#[derive(Deserialize)]
struct ReassignRequest {
    staff_id: String,
}

async fn reassign_om(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(customer_id): Path<String>,
    Json(req): Json<ReassignRequest>,
) -> ApiResult<crate::types::Customer> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.reassign_om(&actor, &customer_id, &req.staff_id)?))
}

async fn toggle_phase(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path((customer_id, phase)): Path<(String, Phase)>,
) -> ApiResult<crate::types::Customer> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.toggle_phase_visibility(&actor, &customer_id, phase)?))
}

#[derive(Serialize)]
struct VerifyAllResponse {
    verified: Vec<String>,
}

async fn verify_all(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(customer_id): Path<String>,
) -> ApiResult<VerifyAllResponse> {
    let actor = state.actor(&headers)?;
    let verified = state.service.verify_all(&actor, &customer_id)?;
    Ok(Json(VerifyAllResponse { verified }))
}

async fn my_dashboard(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<crate::service::CustomerDetail> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.my_dashboard(&actor)?))
}

// ----- Task catalog -----

async fn catalog(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<Vec<crate::aggregate::PhaseGroup<crate::service::CatalogEntry>>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.catalog(&actor)?))
}

#[derive(Deserialize)]
struct CreateTaskRequest {
    #[serde(flatten)]
    definition: TaskDefinition,
    /// Absent for a global task.
    customer_id: Option<String>,
}

async fn create_task(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<crate::types::Task>), ServiceError> {
    let actor = state.actor(&headers)?;
    let scope = TaskScope::from_customer_id(req.customer_id.as_deref());
    let task = state.service.create_task(&actor, req.definition, scope)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Fields left out are unchanged; send an empty string to clear optional text.
async fn update_task(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<crate::types::Task> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.update_task(&actor, &task_id, update)?))
}

#[derive(Serialize)]
struct DeleteTaskResponse {
    deleted: bool,
    progress_rows_removed: usize,
}

async fn delete_task(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<DeleteTaskResponse> {
    let actor = state.actor(&headers)?;
    let removed = state.service.delete_task(&actor, &task_id)?;
    Ok(Json(DeleteTaskResponse {
        deleted: true,
        progress_rows_removed: removed,
    }))
}

#[derive(Deserialize)]
struct MoveRequest {
    direction: Direction,
}

async fn move_task(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<crate::types::Task> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.move_task(&actor, &task_id, req.direction)?))
}

#[derive(Deserialize)]
struct PhaseRequest {
    phase: Phase,
}

async fn move_task_to_phase(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(req): Json<PhaseRequest>,
) -> ApiResult<crate::types::Task> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.move_task_to_phase(&actor, &task_id, req.phase)?))
}

#[derive(Deserialize)]
struct DuplicateRequest {
    customer_id: String,
}

async fn duplicate_task(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(req): Json<DuplicateRequest>,
) -> Result<(StatusCode, Json<crate::types::Task>), ServiceError> {
    let actor = state.actor(&headers)?;
    let task = state
        .service
        .duplicate_for_customer(&actor, &task_id, &req.customer_id)?;
    Ok((StatusCode::CREATED, Json(task)))
}

// ----- Progress -----

type ProgressResult = ApiResult<crate::types::CustomerProgress>;

async fn mark_complete(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ProgressResult {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.mark_complete(&actor, &id)?))
}

async fn mark_incomplete(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ProgressResult {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.mark_incomplete(&actor, &id)?))
}

async fn verify(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ProgressResult {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.verify(&actor, &id)?))
}

async fn unverify(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ProgressResult {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.unverify(&actor, &id)?))
}

async fn toggle_skip(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ProgressResult {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.toggle_skip(&actor, &id)?))
}

/// Either a reference to an already hosted file (`url`) or inline bytes (`content_base64`).
#[derive(Deserialize)]
struct FileRequest {
    name: String,
    url: Option<String>,
    content_base64: Option<String>,
}

async fn attach_file(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<FileRequest>,
) -> ProgressResult {
    let actor = state.actor(&headers)?;
    let progress = match (req.url, req.content_base64) {
        (_, Some(content)) => {
            let bytes = decode_base64("content_base64", &content)?;
            state
                .service
                .upload_progress_file(&actor, &id, &req.name, bytes)
                .await?
        }
        (Some(url), None) => state.service.attach_file(
            &actor,
            &id,
            UploadedFile {
                name: req.name.trim().to_string(),
                url,
                uploaded_at: now_ms(),
            },
        )?,
        (None, None) => return Err(ServiceError::missing_field("content_base64")),
    };
    Ok(Json(progress))
}

#[derive(Deserialize)]
struct CommentRequest {
    message: String,
}

async fn list_comments(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Vec<crate::types::TaskComment>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.list_comments(&actor, &id)?))
}

async fn post_comment(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<crate::types::TaskComment>), ServiceError> {
    let actor = state.actor(&headers)?;
    let comment = state.service.post_comment(&actor, &id, &req.message)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

// ----- Reports and template files -----

async fn list_reports(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<Vec<crate::types::Report>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.list_reports(&actor)?))
}

async fn create_report(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Json(input): Json<NewReport>,
) -> Result<(StatusCode, Json<crate::types::Report>), ServiceError> {
    let actor = state.actor(&headers)?;
    let report = state.service.create_report(&actor, input)?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn list_task_files(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<Vec<crate::types::TaskFile>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.list_task_files(&actor, &task_id)?))
}

#[derive(Deserialize)]
struct TaskFileRequest {
    name: String,
    description: Option<String>,
    #[serde(default)]
    file_type: FileType,
    #[serde(default)]
    is_optional: bool,
    url: Option<String>,
    content_base64: Option<String>,
}

async fn add_task_file(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(req): Json<TaskFileRequest>,
) -> Result<(StatusCode, Json<crate::types::TaskFile>), ServiceError> {
    let actor = state.actor(&headers)?;
    let input = NewTaskFile {
        name: req.name,
        description: req.description,
        url: req.url.clone().unwrap_or_default(),
        file_type: req.file_type,
        is_optional: req.is_optional,
    };
    let file = match req.content_base64 {
        Some(content) => {
            let bytes = decode_base64("content_base64", &content)?;
            state
                .service
                .upload_task_file(&actor, &task_id, input, bytes)
                .await?
        }
        None => state.service.add_task_file(&actor, &task_id, input)?,
    };
    Ok((StatusCode::CREATED, Json(file)))
}

async fn delete_task_file(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
) -> ApiResult<crate::types::TaskFile> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.delete_task_file(&actor, &file_id)?))
}

// ----- Staff -----

async fn list_staff(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<Vec<crate::types::StaffMember>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.list_staff(&actor)?))
}

#[derive(Deserialize)]
struct AddStaffRequest {
    email: String,
    name: String,
    role: StaffRole,
}

async fn add_staff(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Json(req): Json<AddStaffRequest>,
) -> Result<(StatusCode, Json<crate::types::StaffMember>), ServiceError> {
    let actor = state.actor(&headers)?;
    let staff = state.service.add_staff(&actor, &req.email, &req.name, req.role)?;
    Ok((StatusCode::CREATED, Json(staff)))
}

async fn om_directory(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
) -> ApiResult<Vec<crate::types::OmSummary>> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.service.om_directory(&actor)?))
}

// ----- Stored files -----

async fn serve_file(
    State(state): State<DashboardServer>,
    headers: HeaderMap,
    Path(path): Path<String>,
) -> Result<Response, ServiceError> {
    let actor = state.actor(&headers)?;
    state.service.authorize_blob_read(&actor, &path)?;
    let store = state
        .files
        .as_ref()
        .ok_or_else(|| ServiceError::new(ErrorCode::InvalidState, "Files are not served locally"))?;
    let full = store
        .resolve(&path)
        .map_err(|e| ServiceError::invalid_value("path", &e.to_string()))?;
    let bytes = tokio::fs::read(&full).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ServiceError::new(ErrorCode::TaskFileNotFound, format!("File not found: {}", path))
        }
        _ => ServiceError::external("blob store", e),
    })?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], Body::from(bytes)).into_response())
}

/// Build the router with all API routes.
pub fn build_router(state: DashboardServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/session", get(session))
        .route("/api/overview", get(overview))
        .route("/api/me", get(my_dashboard))
        // Customers
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/{customer_id}", get(customer_detail))
        .route("/api/customers/{customer_id}/om", post(reassign_om))
        .route(
            "/api/customers/{customer_id}/phases/{phase}/toggle",
            post(toggle_phase),
        )
        .route("/api/customers/{customer_id}/verify-all", post(verify_all))
        // Task catalog
        .route("/api/tasks", get(catalog).post(create_task))
        .route("/api/tasks/{task_id}", patch(update_task).delete(delete_task))
        .route("/api/tasks/{task_id}/move", post(move_task))
        .route("/api/tasks/{task_id}/phase", post(move_task_to_phase))
        .route("/api/tasks/{task_id}/duplicate", post(duplicate_task))
        .route(
            "/api/tasks/{task_id}/files",
            get(list_task_files).post(add_task_file),
        )
        .route("/api/task-files/{file_id}", delete(delete_task_file))
        // Progress ledger
        .route("/api/progress/{progress_id}/complete", post(mark_complete))
        .route("/api/progress/{progress_id}/incomplete", post(mark_incomplete))
        .route("/api/progress/{progress_id}/verify", post(verify))
        .route("/api/progress/{progress_id}/unverify", post(unverify))
        .route("/api/progress/{progress_id}/skip", post(toggle_skip))
        .route("/api/progress/{progress_id}/files", post(attach_file))
        .route(
            "/api/progress/{progress_id}/comments",
            get(list_comments).post(post_comment),
        )
        // Reports and staff
        .route("/api/reports", get(list_reports).post(create_report))
        .route("/api/staff", get(list_staff).post(add_staff))
        .route("/api/oms", get(om_directory))
        .route("/files/{*path}", get(serve_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running server.
pub struct DashboardHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    addr: SocketAddr,
}

impl DashboardHandle {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal graceful shutdown and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!("Server task ended abnormally: {}", e);
        }
    }
}

/// Bind and start serving in the background.
pub async fn start_server(
    state: DashboardServer,
    addr: SocketAddr,
) -> anyhow::Result<DashboardHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            error!("API server error: {}", e);
        }
    });

    Ok(DashboardHandle {
        shutdown_tx: Some(shutdown_tx),
        task,
        addr: bound_addr,
    })
}
