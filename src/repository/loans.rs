//! Loans repository for database operations
//!
//! Owns the loan records. Inventory checks are deliberately absent here:
//! whether a loan *may* exist is the lending service's call, this layer
//! only records that it *does*.

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanQuery, LoanStatus},
    repository::page_window,
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Persist a new open loan with `due_date = now + loan_period_days`
    pub async fn create(&self, book_id: i32, user_id: i32, loan_period_days: i64) -> AppResult<Loan> {
        let now = Utc::now();
        let due_date = Loan::due_date_for(now, loan_period_days).ok_or_else(|| {
            AppError::BadRequest("loan_period_days is out of range".to_string())
        })?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, user_id, loan_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(now)
        .bind(due_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Close a loan by stamping `return_date`.
    ///
    /// The `return_date IS NULL` guard makes this safe under a concurrent
    /// double return: exactly one caller closes the loan, the other gets
    /// `AlreadyReturned`.
    pub async fn mark_returned(&self, loan_id: i32) -> AppResult<Loan> {
        let returned = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET return_date = $2
            WHERE id = $1 AND return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match returned {
            Some(loan) => Ok(loan),
            None => {
                // Zero rows: either the loan never existed or it is closed
                let loan = self.get_by_id(loan_id).await?;
                debug_assert!(loan.return_date.is_some());
                Err(AppError::AlreadyReturned { loan_id })
            }
        }
    }

    /// Push `due_date` forward by `extra_days`. Cumulative: repeated
    /// extensions keep adding. Closed loans are immutable.
    pub async fn extend_due_date(&self, loan_id: i32, extra_days: i64) -> AppResult<Loan> {
        // make_interval takes an int4; a silent wrap here would move the
        // due date backwards
        let days = i32::try_from(extra_days).map_err(|_| {
            AppError::InvalidExtension("extension_days is out of range".to_string())
        })?;

        let extended = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET due_date = due_date + make_interval(days => $2)
            WHERE id = $1 AND return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(days)
        .fetch_optional(&self.pool)
        .await?;

        match extended {
            Some(loan) => Ok(loan),
            None => {
                self.get_by_id(loan_id).await?;
                Err(AppError::AlreadyReturned { loan_id })
            }
        }
    }

    /// Get all loans for a user, newest first
    pub async fn get_by_user(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let loans =
            sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE user_id = $1 ORDER BY loan_date DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(loans)
    }

    /// Get all loans for a book, newest first
    pub async fn get_by_book(&self, book_id: i32) -> AppResult<Vec<Loan>> {
        let loans =
            sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE book_id = $1 ORDER BY loan_date DESC")
                .bind(book_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(loans)
    }

    /// Get all loans
    pub async fn get_all(&self, page: i64, per_page: i64) -> AppResult<Vec<Loan>> {
        let (limit, offset) = page_window(Some(page), Some(per_page));
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans ORDER BY loan_date DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Get open loans
    pub async fn get_active(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE return_date IS NULL ORDER BY due_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Get open loans whose due date has passed
    pub async fn get_overdue(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE return_date IS NULL AND due_date < NOW() ORDER BY due_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Filtered loan search. The status filter is expressed over the stored
    /// timestamps, matching the derived lifecycle states.
    pub async fn search(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let (limit, offset) = page_window(query.page, query.per_page);

        let status_filter = match query.status {
            Some(LoanStatus::Active) => "AND return_date IS NULL AND due_date >= NOW()",
            Some(LoanStatus::Overdue) => "AND return_date IS NULL AND due_date < NOW()",
            Some(LoanStatus::Returned) => "AND return_date IS NOT NULL",
            None => "",
        };

        let loans = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT * FROM loans
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::int IS NULL OR book_id = $2)
              {}
            ORDER BY loan_date DESC
            LIMIT $3 OFFSET $4
            "#,
            status_filter
        ))
        .bind(query.user_id)
        .bind(query.book_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Count open loans for a user
    pub async fn count_open_for_user(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND return_date IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Count open loans for a book
    pub async fn count_open_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
