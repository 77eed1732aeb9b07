//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanDetails, LoanQuery},
};

use super::AuthenticatedUser;

/// Create loan parameters
#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CreateLoanParams {
    /// Borrowing user ID
    pub user_id: i32,
    /// Book ID
    pub book_id: i32,
    /// Loan period in days (default from configuration)
    pub loan_period_days: Option<i64>,
}

/// Extend loan parameters
#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ExtendLoanParams {
    /// Number of days to add to the due date
    pub extension_days: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct ListLoansParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// List all loans (admin only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(ListLoansParams),
    responses(
        (status = 200, description = "All loans", body = Vec<LoanDetails>),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<ListLoansParams>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state
        .services
        .lending
        .list_loans(params.page.unwrap_or(1), params.per_page.unwrap_or(20))
        .await?;
    Ok(Json(loans))
}

/// Create a new loan (admin only)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(CreateLoanParams),
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "No copies available")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<CreateLoanParams>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    claims.require_admin()?;

    let loan = state
        .services
        .lending
        .borrow(params.book_id, params.user_id, params.loan_period_days)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Get a loan with its derived status (self or admin)
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.lending.get_loan(id).await?;
    claims.require_self_or_admin(loan.user_id)?;
    Ok(Json(loan))
}

/// Return a borrowed book (admin only)
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let loan = state.services.lending.return_loan(id).await?;
    Ok(Json(loan))
}

/// Extend a loan's due date (admin only)
#[utoipa::path(
    post,
    path = "/loans/{id}/extend",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID"),
        ExtendLoanParams
    ),
    responses(
        (status = 200, description = "Loan extended", body = LoanDetails),
        (status = 400, description = "Invalid extension"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn extend_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(params): Query<ExtendLoanParams>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let loan = state
        .services
        .lending
        .extend(id, params.extension_days)
        .await?;
    Ok(Json(loan))
}

/// Get loans for a specific user (self or admin)
#[utoipa::path(
    get,
    path = "/loans/user/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans", body = Vec<LoanDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_self_or_admin(user_id)?;

    let loans = state.services.lending.get_user_loans(user_id).await?;
    Ok(Json(loans))
}

/// Get loans for a specific book (admin only)
#[utoipa::path(
    get,
    path = "/loans/book/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book's loans", body = Vec<LoanDetails>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.lending.get_book_loans(book_id).await?;
    Ok(Json(loans))
}

/// Get open loans (admin only)
#[utoipa::path(
    get,
    path = "/loans/active/",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanDetails>)
    )
)]
pub async fn get_active_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.lending.get_active_loans().await?;
    Ok(Json(loans))
}

/// Get overdue loans (admin only)
#[utoipa::path(
    get,
    path = "/loans/overdue/",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanDetails>)
    )
)]
pub async fn get_overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.lending.get_overdue_loans().await?;
    Ok(Json(loans))
}

/// Search loans with filters (admin only)
#[utoipa::path(
    get,
    path = "/loans/search",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Matching loans", body = Vec<LoanDetails>)
    )
)]
pub async fn search_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.lending.search_loans(&query).await?;
    Ok(Json(loans))
}
