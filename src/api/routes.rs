//! API Routes
//!
//! HTTP endpoint definitions for the expense lifecycle.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header::HeaderName, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Expense, ExpenseStatus, RequestContext};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{
    ApproveExpenseCommand, ApproveExpenseHandler, AuditLogHandler, CreateExpenseCommand,
    CreateExpenseHandler, RejectExpenseCommand, RejectExpenseHandler, SubmitExpenseCommand,
    SubmitExpenseHandler,
};
use crate::search::SearchService;
use crate::store::{AuditEntry, ExpenseStore, SearchCriteria};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateExpenseRequest {
    pub title: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseResponse {
    pub id: i64,
    pub applicant_id: i64,
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: ExpenseStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl From<&Expense> for ExpenseResponse {
    fn from(expense: &Expense) -> Self {
        let mut amount = expense.amount().value();
        amount.rescale(2);
        Self {
            id: expense.id(),
            applicant_id: expense.applicant_id(),
            title: expense.title().to_string(),
            amount,
            currency: expense.currency().as_str().to_string(),
            status: expense.status(),
            submitted_at: expense.submitted_at(),
            created_at: expense.created_at(),
            updated_at: expense.updated_at(),
            version: expense.version(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub applicant_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount_min: Option<Decimal>,
    #[serde(default)]
    pub amount_max: Option<Decimal>,
    #[serde(default)]
    pub submitted_from: Option<NaiveDate>,
    #[serde(default)]
    pub submitted_to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    5
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
    pub page_window: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: i64,
    pub expense_id: i64,
    pub actor_id: i64,
    pub action: String,
    pub before_status: Option<String>,
    pub after_status: String,
    pub note: Option<String>,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&AuditEntry> for AuditLogResponse {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            expense_id: entry.expense_id,
            actor_id: entry.actor_id,
            action: entry.action.as_str().to_string(),
            before_status: entry.before_status.map(|s| s.as_str().to_string()),
            after_status: entry.after_status.as_str().to_string(),
            note: entry.note.clone(),
            trace_id: entry.trace_id.clone(),
            created_at: entry.created_at,
        }
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/expenses", post(create_expense).get(search_expenses))
        .route("/expenses/:id/submit", post(submit_expense))
        .route("/expenses/:id/approve", post(approve_expense))
        .route("/expenses/:id/reject", post(reject_expense))
        .route("/expenses/:id/audit-logs", get(get_audit_logs))
}

// =========================================================================
// POST /expenses
// =========================================================================

/// Create a draft expense
async fn create_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, [(HeaderName, String); 1], Json<ExpenseResponse>)> {
    let handler = CreateExpenseHandler::new(state.pool, state.bus);

    let mut command = CreateExpenseCommand::new(request.title, request.amount);
    if let Some(currency) = request.currency {
        command = command.with_currency(currency);
    }

    let expense = handler
        .execute(command, &ctx)
        .await
        .map_err(|e| ApiError::with_ctx(e, &ctx))?;

    Ok((
        StatusCode::CREATED,
        [(
            axum::http::header::LOCATION,
            format!("/expenses/{}", expense.id()),
        )],
        Json(ExpenseResponse::from(&expense)),
    ))
}

// =========================================================================
// POST /expenses/:id/submit
// =========================================================================

/// Submit a draft for approval
async fn submit_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(expense_id): Path<i64>,
) -> ApiResult<Json<ExpenseResponse>> {
    let handler = SubmitExpenseHandler::new(state.pool, state.bus);

    let expense = handler
        .execute(SubmitExpenseCommand::new(expense_id), &ctx)
        .await
        .map_err(|e| ApiError::with_ctx(e, &ctx))?;

    Ok(Json(ExpenseResponse::from(&expense)))
}

// =========================================================================
// POST /expenses/:id/approve?version=N
// =========================================================================

/// Approve a submitted expense at a known version
async fn approve_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(expense_id): Path<i64>,
    Query(query): Query<VersionQuery>,
) -> ApiResult<Json<ExpenseResponse>> {
    let handler = ApproveExpenseHandler::new(state.pool, state.bus);

    let expense = handler
        .execute(ApproveExpenseCommand::new(expense_id, query.version), &ctx)
        .await
        .map_err(|e| ApiError::with_ctx(e, &ctx))?;

    Ok(Json(ExpenseResponse::from(&expense)))
}

// =========================================================================
// POST /expenses/:id/reject?version=N
// =========================================================================

/// Reject a submitted expense; the reason is mandatory
async fn reject_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(expense_id): Path<i64>,
    Query(query): Query<VersionQuery>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<Json<ExpenseResponse>> {
    let handler = RejectExpenseHandler::new(state.pool, state.bus);

    let expense = handler
        .execute(
            RejectExpenseCommand::new(expense_id, query.version, request.reason),
            &ctx,
        )
        .await
        .map_err(|e| ApiError::with_ctx(e, &ctx))?;

    Ok(Json(ExpenseResponse::from(&expense)))
}

// =========================================================================
// GET /expenses
// =========================================================================

/// Search expenses visible to the caller, paged
async fn search_expenses(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<PagedResponse<ExpenseResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ExpenseStatus>()
                .map_err(|e| ApiError::with_ctx(DomainError::validation("status", e), &ctx))
        })
        .transpose()?;

    let criteria = SearchCriteria {
        applicant_id: query.applicant_id,
        status,
        title: query.title,
        amount_min: query.amount_min,
        amount_max: query.amount_max,
        submitted_from: query.submitted_from,
        submitted_to: query.submitted_to,
    };

    let service = SearchService::new(ExpenseStore::new(state.pool));
    let result = service
        .execute(&criteria, query.sort.as_deref(), query.page, query.size, &ctx)
        .await
        .map_err(|e| ApiError::with_ctx(e, &ctx))?;

    Ok(Json(PagedResponse {
        items: result.items.iter().map(ExpenseResponse::from).collect(),
        page: result.page,
        page_size: result.page_size,
        total: result.total,
        total_pages: result.total_pages,
        page_window: result.page_window,
    }))
}

// =========================================================================
// GET /expenses/:id/audit-logs
// =========================================================================

/// Transition history of one expense, for the owner or an approver/admin
async fn get_audit_logs(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(expense_id): Path<i64>,
) -> ApiResult<Json<Vec<AuditLogResponse>>> {
    let handler = AuditLogHandler::new(state.pool);

    let entries = handler
        .execute(expense_id, &ctx)
        .await
        .map_err(|e| ApiError::with_ctx(e, &ctx))?;

    Ok(Json(entries.iter().map(AuditLogResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_deserialize() {
        let json = r#"{"title": "Taxi", "amount": 1200}"#;
        let request: CreateExpenseRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.title, "Taxi");
        assert_eq!(request.amount, Decimal::new(1200, 0));
        assert!(request.currency.is_none());

        let json = r#"{"title": "Hotel", "amount": "250.00", "currency": "USD"}"#;
        let request: CreateExpenseRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.amount, Decimal::new(25000, 2));
        assert_eq!(request.currency, Some("USD".to_string()));
    }

    #[test]
    fn test_search_query_defaults() {
        let query: SearchQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.size, 5);
        assert!(query.status.is_none());
        assert!(query.sort.is_none());
    }

    #[test]
    fn test_expense_response_shape() {
        use crate::domain::NewExpense;

        let now = Utc::now();
        let draft = NewExpense::new(10, "Taxi", Decimal::new(1200, 0), None, now).unwrap();
        let expense = Expense::from_inserted(draft, 1);

        let response = ExpenseResponse::from(&expense);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["applicantId"], 10);
        assert_eq!(json["status"], "DRAFT");
        assert_eq!(json["amount"], "1200.00");
        assert_eq!(json["currency"], "JPY");
        assert_eq!(json["version"], 0);
        assert!(json["submittedAt"].is_null());
    }
}
