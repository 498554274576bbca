use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, patch, post, put},
};
use form_flow::{
    BrandCatalog, Flow, FormError, FormRecord, FormRunner, FormSession, FormSnapshot, FormState,
    InMemoryPrefill, InMemorySessionStorage, Schema, SessionStorage, Submitter, UserAction,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{StoredSubmission, SubmissionStore};
use crate::config::ServiceConfig;
use crate::models::{CreateFormRequest, FormResponse, SubmissionReceipt, UpdateFieldsRequest};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

const START_TIMEOUT: Duration = Duration::from_secs(5);

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn conflict_error(message: &str, snapshot: &FormSnapshot) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "state": snapshot.state,
            "isLoading": snapshot.is_loading
        })),
    )
}

fn validation_error(errors: &form_flow::ValidationErrors) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "error": format!("Validation failed: {errors}"),
            "errors": errors
        })),
    )
}

/// Errors coming back from a dispatched user action.
fn action_error(error: FormError) -> ApiError {
    match error {
        FormError::InvalidFieldPath(_) => bad_request_error(&error.to_string()),
        other => internal_error("Form is no longer running", &other.to_string()),
    }
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStorage>,
    pub runner: FormRunner,
    pub submitter: Arc<dyn Submitter>,
    pub submissions: SubmissionStore,
    pub prefill: Arc<InMemoryPrefill>,
    pub submit_timeout: Duration,
}

impl AppState {
    /// State whose forms submit straight into the in-process store.
    pub fn new(brands: BrandCatalog) -> Self {
        let submissions = SubmissionStore::new();
        Self {
            sessions: Arc::new(InMemorySessionStorage::new()),
            runner: FormRunner::new(Arc::new(brands)),
            submitter: Arc::new(submissions.clone()),
            submissions,
            prefill: Arc::new(InMemoryPrefill::new()),
            submit_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = submitter;
        self
    }

    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let brands = match &config.brand_catalog {
            Some(path) => {
                let catalog = BrandCatalog::load(path)?;
                info!(path = %path.display(), brands = catalog.brands.len(), "brand catalog loaded");
                catalog
            }
            None => {
                info!("no BRAND_CATALOG set, using built-in brand copy");
                BrandCatalog::default()
            }
        };

        let state = Self::new(brands).with_submit_timeout(config.submit_timeout);
        match &config.backend_url {
            Some(url) => {
                info!(backend_url = %url, "submissions are forwarded to the backend");
                Ok(state.with_submitter(Arc::new(form_flow::HttpSubmitter::new(url.clone()))))
            }
            None => {
                info!("submissions are kept in-process (set BACKEND_URL to forward them)");
                Ok(state)
            }
        }
    }
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    Ok(build_router(AppState::from_config(config)?))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/forms", post(create_form))
        .route("/forms/{id}", get(get_form).delete(delete_form))
        .route("/forms/{id}/fields", patch(update_fields))
        .route("/forms/{id}/submit", post(submit_form))
        .route("/prefill/{token}", put(store_prefill))
        .route("/quotes", post(receive_quote))
        .route("/claims", post(receive_claim))
        .route("/submissions/{id}", get(get_submission))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    // Keep a caller-supplied id so traces line up across services
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

fn correlation_id(headers: &HeaderMap) -> &str {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Insurance Broker Form Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /forms": "Mount a quote or claim form",
            "GET /forms/{id}": "Current form snapshot",
            "PATCH /forms/{id}/fields": "Edit fields by dotted path",
            "POST /forms/{id}/submit": "Validate and submit the form",
            "DELETE /forms/{id}": "Unmount the form",
            "PUT /prefill/{token}": "Register prefill data for a token",
            "POST /quotes": "Backend: receive a quote record",
            "POST /claims": "Backend: receive a claim record",
            "GET /submissions/{id}": "Backend: look up a stored record",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateFormRequest>,
) -> ApiResult<FormResponse> {
    let correlation_id = correlation_id(&headers);

    let Some(flow) = request.feature.flow() else {
        return Err(bad_request_error(&format!(
            "Feature {} has no form",
            request.feature
        )));
    };
    Schema::for_form(flow, request.insurance).map_err(|e| bad_request_error(&e.to_string()))?;
    if !state.runner.brands().contains(&request.brand) {
        warn!(correlation_id = %correlation_id, brand = %request.brand, "unknown brand, using default copy");
    }

    let session_id = Uuid::new_v4().to_string();
    let host = form_flow::HostShell::new(request.clone(), state.submitter.clone())
        .with_prefill(state.prefill.clone());
    let form = state.runner.open(&session_id, host);

    let snapshot = timeout(
        START_TIMEOUT,
        form.wait_for(|snapshot| snapshot.state == FormState::Ready),
    )
    .await
    .map_err(|_| internal_error("Form did not start", "timed out waiting for form:start"))?
    .map_err(|e| internal_error("Form did not start", &e.to_string()))?;

    let session = FormSession::new(request, form).with_id(session_id);
    state.sessions.save(session.clone()).await.map_err(|e| {
        error!(correlation_id = %correlation_id, session_id = %session.id, error = %e, "Failed to save session");
        internal_error("Failed to save form session", &e.to_string())
    })?;
    tokio::spawn(evict_when_finished(
        state.sessions.clone(),
        session.id.clone(),
        session.form.finished(),
    ));

    info!(
        correlation_id = %correlation_id,
        session_id = %session.id,
        brand = %session.config.brand,
        flow = %flow,
        insurance = %session.config.insurance,
        "Form mounted"
    );
    Ok(Json(FormResponse::new(&session, snapshot)))
}

/// Drop a session from storage once its form has stopped running.
async fn evict_when_finished(
    sessions: Arc<dyn SessionStorage>,
    id: String,
    finished: impl Future<Output = ()>,
) {
    finished.await;
    match sessions.delete(&id).await {
        Ok(()) => debug!(session_id = %id, "Form stopped, session evicted"),
        Err(e) => warn!(session_id = %id, error = %e, "Failed to evict stopped session"),
    }
}

async fn load_session(state: &AppState, id: &str) -> Result<FormSession, ApiError> {
    match state.sessions.get(id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", id)),
        Err(e) => {
            error!(session_id = %id, error = %e, "Failed to get session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FormResponse> {
    let session = load_session(&state, &id).await?;
    let snapshot = session.form.snapshot();
    Ok(Json(FormResponse::new(&session, snapshot)))
}

async fn update_fields(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateFieldsRequest>,
) -> ApiResult<FormResponse> {
    let session = load_session(&state, &id).await?;
    let mut snapshot = session.form.snapshot();
    if snapshot.state != FormState::Ready || snapshot.is_loading {
        return Err(conflict_error("Form is not accepting edits", &snapshot));
    }

    let count = request.fields.len();
    for (path, value) in request.fields {
        let action = if value.is_null() {
            UserAction::ClearField { path }
        } else {
            UserAction::SetField { path, value }
        };
        snapshot = session.form.dispatch(action).await.map_err(|e| {
            warn!(correlation_id = %correlation_id(&headers), session_id = %id, error = %e, "Field update refused");
            action_error(e)
        })?;
    }

    info!(
        correlation_id = %correlation_id(&headers),
        session_id = %id,
        fields = count,
        can_submit = snapshot.can_submit,
        "Fields updated"
    );
    Ok(Json(FormResponse::new(&session, snapshot)))
}

async fn submit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<FormResponse> {
    let correlation_id = correlation_id(&headers);
    let session = load_session(&state, &id).await?;

    let snapshot = session
        .form
        .dispatch(UserAction::Submit)
        .await
        .map_err(action_error)?;

    match snapshot.state {
        FormState::Submitting => {
            let settled = timeout(
                state.submit_timeout,
                session
                    .form
                    .wait_for(|snapshot| snapshot.state == FormState::Ready),
            )
            .await
            .map_err(|_| {
                warn!(correlation_id = %correlation_id, session_id = %id, "Submission still pending");
                (
                    StatusCode::ACCEPTED,
                    Json(json!({ "status": "submitting", "id": id })),
                )
            })?
            .map_err(|e| internal_error("Form is no longer running", &e.to_string()))?;

            info!(
                correlation_id = %correlation_id,
                session_id = %id,
                notice = ?settled.notice,
                "Submission settled"
            );
            Ok(Json(FormResponse::new(&session, settled)))
        }
        FormState::Ready if !snapshot.errors.is_empty() => {
            info!(
                correlation_id = %correlation_id,
                session_id = %id,
                error_count = snapshot.errors.len(),
                "Submission failed validation"
            );
            Err(validation_error(&snapshot.errors))
        }
        _ => Err(conflict_error("Form is not ready to submit", &snapshot)),
    }
}

async fn delete_form(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    load_session(&state, &id).await?;
    state.sessions.delete(&id).await.map_err(|e| {
        error!(session_id = %id, error = %e, "Failed to delete session");
        internal_error("Failed to delete session", &e.to_string())
    })?;
    info!(session_id = %id, "Form unmounted");
    Ok(Json(json!({ "id": id, "status": "unmounted" })))
}

async fn store_prefill(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(data): Json<Value>,
) -> ApiResult<Value> {
    if !data.is_object() {
        return Err(bad_request_error("Prefill data must be a JSON object"));
    }
    state.prefill.insert(token.clone(), data);
    Ok(Json(json!({ "token": token })))
}

async fn receive_quote(
    State(state): State<AppState>,
    Json(record): Json<FormRecord>,
) -> ApiResult<SubmissionReceipt> {
    receive(&state, Flow::Quote, record)
}

async fn receive_claim(
    State(state): State<AppState>,
    Json(record): Json<FormRecord>,
) -> ApiResult<SubmissionReceipt> {
    receive(&state, Flow::Claim, record)
}

/// Records arriving from outside are checked against their schema again.
fn receive(state: &AppState, flow: Flow, record: FormRecord) -> ApiResult<SubmissionReceipt> {
    if record.flow() != flow {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": format!("Expected a {flow} record, got a {}", record.flow()) })),
        ));
    }
    let schema = Schema::for_form(flow, record.insurance_type())
        .map_err(|e| bad_request_error(&e.to_string()))?;
    let document = serde_json::to_value(&record)
        .map_err(|e| internal_error("Could not read record", &e.to_string()))?;
    let record = schema.validate(&document).map_err(|errors| validation_error(&errors))?;

    let StoredSubmission { id, .. } = state.submissions.accept(record);
    Ok(Json(SubmissionReceipt { id, message: None }))
}

async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StoredSubmission> {
    state
        .submissions
        .get(&id)
        .map(Json)
        .ok_or_else(|| not_found_error("Submission not found", &id))
}
