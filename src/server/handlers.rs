use super::error::ApiError;
use super::extract::AdminContext;
use super::AppState;
use crate::auth::{self, expired_session_cookie, session_cookie, AuthContext};
use crate::db::{get_admin_stats, AdminStats};
use crate::entities::company::{self, Company, CompanySummary};
use crate::entities::financial::{get_statements, FinancialStatement};
use crate::entities::portfolio::{self, PortfolioEntry};
use crate::importer;
use crate::metrics::{derive_metrics, snowflake_data, MetricScores, SnowflakePoint};
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn success() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

/// # GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

/// # POST /login
/// Checks credentials and opens a session cookie.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Username and password required"));
    }

    let ttl = chrono::Duration::hours(state.settings.session_ttl_hours);
    let secret = state.settings.secret_key.clone();
    let session = state
        .with_conn(move |conn| Ok(auth::login(conn, &secret, &username, &password, ttl)?))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let cookie = session_cookie(&session.token, ttl, state.settings.cookie_secure);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "status": "success", "user": session.user })),
    ))
}

/// # POST /logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = auth.token().map(str::to_string) {
        let secret = state.settings.secret_key.clone();
        state
            .with_conn(move |conn| Ok(auth::logout(conn, &secret, &token)?))
            .await?;
    }

    Ok((
        [(SET_COOKIE, expired_session_cookie(state.settings.cookie_secure))],
        success(),
    ))
}

/// # GET /auth/status
pub async fn auth_status(auth: AuthContext) -> Json<Value> {
    match auth.user() {
        Some(user) => Json(json!({ "authenticated": true, "user": user })),
        None => Json(json!({ "authenticated": false })),
    }
}

// ============================================================================
// Import
// ============================================================================

/// # POST /import_csv
/// Admin only. Expects the CSV in a multipart field named `file`.
pub async fn import_csv(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            upload = Some((file_name, bytes));
            break;
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if file_name.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if std::str::from_utf8(&bytes).is_err() {
        return Err(ApiError::bad_request("File is not valid UTF-8"));
    }

    tracing::info!(admin = %admin.username, file = %file_name, bytes = bytes.len(), "Importing CSV");

    let report = state
        .with_conn(move |conn| Ok(importer::import_csv(conn, &bytes[..])?))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "imported_count": report.imported,
        "skipped_count": report.skipped_count(),
        "skipped": report.skipped,
    })))
}

// ============================================================================
// Companies
// ============================================================================

/// # GET /companies
pub async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<CompanySummary>>, ApiError> {
    let summaries = state
        .with_conn(|conn| Ok(company::list_company_summaries(conn)?))
        .await?;
    Ok(Json(summaries))
}

#[derive(Debug, Serialize)]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: Company,
    pub financials: Vec<FinancialStatement>,
    pub metrics: MetricScores,
    pub snowflake_data: Vec<SnowflakePoint>,
}

/// # GET /company/:company_id
/// Company with its full statement history and snowflake scores.
pub async fn company_detail(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
) -> Result<Json<CompanyDetail>, ApiError> {
    let (company, financials) = state
        .with_conn(move |conn| {
            let company = company::get_company(conn, company_id)?
                .ok_or_else(|| ApiError::not_found("Company not found"))?;
            Ok((company, get_statements(conn, company_id)?))
        })
        .await?;

    let metrics = derive_metrics(&financials);
    let snowflake_data = snowflake_data(&metrics);

    Ok(Json(CompanyDetail {
        company,
        financials,
        metrics,
        snowflake_data,
    }))
}

// ============================================================================
// Portfolio
// ============================================================================

/// # GET /portfolio
pub async fn list_portfolio(State(state): State<AppState>) -> Result<Json<Vec<PortfolioEntry>>, ApiError> {
    let entries = state
        .with_conn(|conn| Ok(portfolio::list_portfolio(conn)?))
        .await?;
    Ok(Json(entries))
}

fn default_shares() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddPortfolioRequest {
    company_id: Option<i64>,
    #[serde(default = "default_shares")]
    shares: i64,
    #[serde(default)]
    purchase_price: f64,
}

/// # POST /portfolio
pub async fn add_to_portfolio(
    State(state): State<AppState>,
    payload: Result<Json<AddPortfolioRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let company_id = request
        .company_id
        .filter(|id| *id != 0)
        .ok_or_else(|| ApiError::bad_request("Company ID is required"))?;

    let AddPortfolioRequest {
        shares,
        purchase_price,
        ..
    } = request;
    state
        .with_conn(move |conn| {
            Ok(portfolio::add_to_portfolio(conn, company_id, shares, purchase_price)?)
        })
        .await?;

    Ok(success())
}

/// # DELETE /portfolio/:portfolio_id
pub async fn remove_from_portfolio(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state
        .with_conn(move |conn| Ok(portfolio::remove_from_portfolio(conn, portfolio_id)?))
        .await?;
    Ok(success())
}

// ============================================================================
// Admin
// ============================================================================

/// # GET /admin/stats
pub async fn admin_stats(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<AdminStats>, ApiError> {
    let stats = state.with_conn(|conn| Ok(get_admin_stats(conn)?)).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct DeleteCompanyRequest {
    company_id: Option<i64>,
}

/// # DELETE /admin/companies
/// Removes a company with all of its statements and portfolio entries.
pub async fn admin_delete_company(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    payload: Result<Json<DeleteCompanyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let company_id = request
        .company_id
        .filter(|id| *id != 0)
        .ok_or_else(|| ApiError::bad_request("Company ID required"))?;

    state
        .with_conn(move |conn| Ok(company::delete_company(conn, company_id)?))
        .await?;

    tracing::info!(admin = %admin.username, company_id, "Admin deleted company");
    Ok(success())
}
