use anyhow::Context as _;
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use dashmap::DashMap;
use loan_flow::{
    ActionTag, CustomerDirectory, DocumentRef, FlowError, FlowRunner, InMemorySessionStorage,
    KeywordInterpreter, LoanFlowConfig, Payload, Session, SessionStorage, Stage, TextLetterRenderer,
    TurnResult, verify_address, verify_pan,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone)]
struct AppState {
    runner: FlowRunner,
    directory: Arc<dyn CustomerDirectory>,
    /// One lock per session id so turns for a session never interleave
    session_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
    fn new(config: &LoanFlowConfig) -> Self {
        let directory: Arc<dyn CustomerDirectory> = Arc::new(config.directory());
        let dependencies = config.dependencies(
            directory.clone(),
            Arc::new(KeywordInterpreter::new()),
            Arc::new(config.bureau()),
            Arc::new(TextLetterRenderer::new(&config.documents.output_dir)),
        );
        let flow = loan_flow::standard_flow(dependencies);
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());

        Self {
            runner: FlowRunner::new(Arc::new(flow), storage),
            directory,
            session_locks: Arc::new(DashMap::new()),
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Lock for a session that must already be stored. Unknown ids get a 404
    /// without leaving an entry behind in `session_locks`.
    async fn existing_session_lock(&self, session_id: &str) -> Result<Arc<Mutex<()>>, StatusCode> {
        match self.runner.storage().get(session_id).await {
            Ok(Some(_)) => Ok(self.session_lock(session_id)),
            Ok(None) => Err(status_for(
                session_id,
                &FlowError::SessionNotFound(session_id.to_string()),
            )),
            Err(e) => Err(status_for(session_id, &e)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    session_id: String,
    message: String,
    document: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    session_id: String,
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatResponse {
    session_id: String,
    response: String,
    stage: Stage,
    action: Option<ActionTag>,
    data: Payload,
}

impl ChatResponse {
    fn from_turn(session_id: String, turn: TurnResult) -> Self {
        Self {
            session_id,
            response: turn.response,
            stage: turn.stage,
            action: turn.action,
            data: turn.payload,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetResponse {
    session_id: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    phone: String,
    pan: Option<String>,
    address: Option<String>,
}

/// `None` for each detail the caller did not supply
#[derive(Debug, Serialize, Deserialize)]
struct VerifyResponse {
    phone: String,
    pan_verified: Option<bool>,
    address_verified: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CustomerSummary {
    phone: String,
    name: String,
    city: String,
    pre_approved_limit: u64,
}

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "loan_origination_service=debug,loan_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

fn status_for(session_id: &str, err: &FlowError) -> StatusCode {
    match err {
        FlowError::SessionNotFound(_) => {
            info!(session_id = %session_id, "Session not found");
            StatusCode::NOT_FOUND
        }
        _ => {
            error!(session_id = %session_id, error = %err, "Turn failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chat/start", post(start_chat))
        .route("/api/chat/message", post(send_message))
        .route("/api/chat/upload", post(upload_document))
        .route("/api/chat/reset", post(reset_chat))
        .route("/api/customers", get(list_customers))
        .route("/api/customers/verify", post(verify_customer))
        .route("/api/session/{id}", get(get_session))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = match std::env::var("LOAN_FLOW_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration");
            LoanFlowConfig::load(&path)
                .await
                .with_context(|| format!("failed to load configuration from {path}"))?
        }
        Err(_) => {
            info!("Using default configuration (set LOAN_FLOW_CONFIG to load a YAML file)");
            LoanFlowConfig::default()
        }
    };

    let app = router(AppState::new(&config));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn start_chat(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(session_id = %session_id, "Starting conversation");

    let lock = state.session_lock(&session_id);
    let _guard = lock.lock().await;
    let turn = state
        .runner
        .start(&session_id)
        .await
        .map_err(|e| status_for(&session_id, &e))?;

    Ok(Json(ChatResponse::from_turn(session_id, turn)))
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    info!(
        session_id = %request.session_id,
        message_length = request.message.len(),
        has_document = request.document.is_some(),
        "Processing message"
    );

    let document = request.document.map(DocumentRef::new);
    let lock = state.existing_session_lock(&request.session_id).await?;
    let _guard = lock.lock().await;
    let turn = state
        .runner
        .handle(&request.session_id, &request.message, document)
        .await
        .map_err(|e| status_for(&request.session_id, &e))?;

    Ok(Json(ChatResponse::from_turn(request.session_id, turn)))
}

async fn upload_document(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    info!(session_id = %request.session_id, file_name = %request.file_name, "Document uploaded");

    let lock = state.existing_session_lock(&request.session_id).await?;
    let _guard = lock.lock().await;
    let turn = state
        .runner
        .handle(
            &request.session_id,
            "",
            Some(DocumentRef::new(request.file_name)),
        )
        .await
        .map_err(|e| status_for(&request.session_id, &e))?;

    Ok(Json(ChatResponse::from_turn(request.session_id, turn)))
}

async fn reset_chat(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, StatusCode> {
    let lock = state.existing_session_lock(&request.session_id).await?;
    let _guard = lock.lock().await;
    state
        .runner
        .reset(&request.session_id)
        .await
        .map_err(|e| status_for(&request.session_id, &e))?;

    Ok(Json(ResetResponse {
        session_id: request.session_id,
        message: "Session reset. Start a new conversation whenever you're ready.".to_string(),
    }))
}

async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<CustomerSummary>>, StatusCode> {
    let customers = state.directory.list().await.map_err(|e| {
        error!(error = %e, "Failed to list customers");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(
        customers
            .into_iter()
            .map(|customer| CustomerSummary {
                phone: customer.phone,
                name: customer.name,
                city: customer.city,
                pre_approved_limit: customer.pre_approved_limit,
            })
            .collect(),
    ))
}

async fn verify_customer(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, StatusCode> {
    let customer = state
        .directory
        .lookup_customer(&request.phone)
        .await
        .map_err(|e| {
            error!(error = %e, "Customer lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let pan_verified = request.pan.as_deref().map(|pan| verify_pan(&customer, pan));
    let address_verified = request
        .address
        .as_deref()
        .map(|address| verify_address(&customer, address));
    info!(
        pan_verified = ?pan_verified,
        address_verified = ?address_verified,
        "Customer details checked"
    );

    Ok(Json(VerifyResponse {
        phone: customer.phone,
        pan_verified,
        address_verified,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, StatusCode> {
    info!(session_id = %session_id, "Getting session");

    match state.runner.storage().get(&session_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => {
            info!(session_id = %session_id, "Session not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
