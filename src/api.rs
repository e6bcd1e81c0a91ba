//! REST API for the finance backend
//!
//! JSON in, JSON out; failures surface as `{"error": "..."}` with an
//! appropriate 4xx/5xx status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{self, AuthUser, TokenKeys};
use crate::chat;
use crate::error::BackendError;
use crate::gemini::GeminiClient;
use crate::models::{Expense, NewUser, User, UserUpdate};
use crate::stats;
use crate::store::LedgerStore;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub monthly_income: Option<f64>,
    pub savings_goal: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub monthly_income: Option<f64>,
    pub savings_goal: Option<f64>,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub name: String,
    pub amount: f64,
    pub category: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// =============================
/// Error Responses
/// =============================

/// Handler-level error: a status code plus the message rendered into the
/// `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        let (status, message) = match &e {
            BackendError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            BackendError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            BackendError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            BackendError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            other => {
                error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn LedgerStore>,
    pub model: Arc<GeminiClient>,
    pub tokens: TokenKeys,
}

impl ApiState {
    async fn current_user(&self, user_id: Uuid) -> Result<User, ApiError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("user {}", user_id)).into())
    }
}

/// =============================
/// Validation Helpers
/// =============================

fn require_non_empty(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(BackendError::Validation(format!("{} must not be empty", field)).into());
    }
    Ok(())
}

fn require_non_negative(value: f64, field: &str) -> Result<(), ApiError> {
    if !value.is_finite() || value < 0.0 {
        return Err(
            BackendError::Validation(format!("{} must be a non-negative number", field)).into(),
        );
    }
    Ok(())
}

fn require_positive_amount(value: f64) -> Result<(), ApiError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BackendError::Validation("amount must be greater than zero".to_string()).into());
    }
    Ok(())
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Auth Endpoints
/// =============================

async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_non_empty(&req.username, "username")?;
    require_non_empty(&req.email, "email")?;
    if req.password.len() < 6 {
        return Err(
            BackendError::Validation("password must be at least 6 characters".to_string()).into(),
        );
    }

    let monthly_income = req.monthly_income.unwrap_or(0.0);
    let savings_goal = req.savings_goal.unwrap_or(0.0);
    require_non_negative(monthly_income, "monthly_income")?;
    require_non_negative(savings_goal, "savings_goal")?;

    let password_hash = auth::hash_password(&req.password)?;
    let user = state
        .store
        .create_user(NewUser {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            password_hash,
            monthly_income,
            savings_goal,
        })
        .await?;

    info!("Registered user {}", user.id);

    let token = state.tokens.issue(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": token, "user": user.profile() })),
    ))
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    require_non_empty(&req.email, "email")?;
    require_non_empty(&req.password, "password")?;

    // Same message for unknown email and wrong password.
    let invalid = || BackendError::Auth("invalid email or password".to_string());

    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(invalid().into());
    }

    let token = state.tokens.issue(&user)?;
    Ok(Json(json!({ "token": token, "user": user.profile() })))
}

/// =============================
/// Profile & Settings
/// =============================

async fn get_profile(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user = state.current_user(user_id).await?;
    Ok(Json(json!(user.profile())))
}

async fn update_profile(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    require_non_empty(&req.username, "username")?;

    let user = state
        .store
        .update_user(
            user_id,
            UserUpdate {
                username: Some(req.username.trim().to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(json!(user.profile())))
}

async fn update_settings(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(income) = req.monthly_income {
        require_non_negative(income, "monthly_income")?;
    }
    if let Some(goal) = req.savings_goal {
        require_non_negative(goal, "savings_goal")?;
    }

    let user = state
        .store
        .update_user(
            user_id,
            UserUpdate {
                username: None,
                monthly_income: req.monthly_income,
                savings_goal: req.savings_goal,
                gemini_api_key: req.gemini_api_key,
            },
        )
        .await?;

    Ok(Json(json!(user.profile())))
}

/// =============================
/// Expense Endpoints
/// =============================

async fn list_expenses(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let expenses = state.store.list_expenses(user_id).await?;
    Ok(Json(expenses))
}

async fn create_expense(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    require_non_empty(&req.name, "name")?;
    require_positive_amount(req.amount)?;

    let expense = state
        .store
        .insert_expense(Expense::new(
            user_id,
            req.name.trim().to_string(),
            req.amount,
            req.category,
            req.occurred_at,
        ))
        .await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

async fn delete_expense(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.store.delete_expense(user_id, expense_id).await?;
    if !deleted {
        return Err(BackendError::NotFound(format!("expense {}", expense_id)).into());
    }

    Ok(Json(json!({ "deleted": true })))
}

/// =============================
/// Statistics Endpoint
/// =============================

async fn get_statistics(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user = state.current_user(user_id).await?;
    let now = Utc::now();
    let expenses = state.store.expenses_in_current_month(user_id, now).await?;

    let snapshot = stats::compute_snapshot(user.monthly_income, user.savings_goal, &expenses);
    Ok(Json(json!(snapshot)))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    require_non_empty(&req.message, "message")?;

    // Both store reads complete before the context block is built.
    let user = state.current_user(user_id).await?;
    let now = Utc::now();
    let expenses = state.store.expenses_in_current_month(user_id, now).await?;

    let snapshot = stats::compute_snapshot(user.monthly_income, user.savings_goal, &expenses);
    let recent = &expenses[..expenses.len().min(chat::CONTEXT_EXPENSE_LIMIT)];

    let reply = chat::answer_question(
        state.model.as_ref(),
        user.gemini_api_key.as_deref(),
        &req.message,
        &snapshot,
        recent,
    )
    .await;

    Ok(Json(json!(reply)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/user/profile", get(get_profile))
        .route("/api/user/profile", put(update_profile))
        .route("/api/user/settings", put(update_settings))
        .route("/api/expenses", get(list_expenses))
        .route("/api/expenses", post(create_expense))
        .route("/api/expenses/:id", delete(delete_expense))
        .route("/api/statistics", get(get_statistics))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
