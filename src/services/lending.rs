//! Lending service: the borrow/return/extend entry points
//!
//! The only place that mutates the inventory ledger and the loan records
//! together. Borrowing is a two-phase sequence: reserve a copy, then commit
//! the loan record, compensating the reservation if the commit fails. That
//! compensation is what keeps `available_copies` equal to
//! `total_copies - open loans` for every book.

use chrono::Utc;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails, LoanQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
    config: LendingConfig,
}

impl LendingService {
    pub fn new(repository: Repository, config: LendingConfig) -> Self {
        Self { repository, config }
    }

    /// Borrow one copy of a book for a user.
    ///
    /// Validation happens before any mutation. The reservation is the
    /// serialization point: when the last copy is contended, exactly one
    /// caller gets past it. A failure after the reservation releases the
    /// copy before the error surfaces, so no copy is ever left phantom
    /// unavailable.
    pub async fn borrow(
        &self,
        book_id: i32,
        user_id: i32,
        loan_period_days: Option<i64>,
    ) -> AppResult<Loan> {
        let period = loan_period_days.unwrap_or(self.config.default_period_days);
        Self::validate_loan_period(period)?;

        let user = self.repository.users.get_by_id(user_id).await?;
        if !user.is_active {
            return Err(AppError::BadRequest(format!(
                "User {} is deactivated and cannot borrow",
                user_id
            )));
        }

        self.repository.books.reserve_copy(book_id).await?;

        match self.repository.loans.create(book_id, user_id, period).await {
            Ok(loan) => {
                tracing::info!(loan_id = loan.id, book_id, user_id, "loan created");
                Ok(loan)
            }
            Err(err) => {
                // Compensate the reservation, unconditionally. If even that
                // fails the book's count is suspect and the operator must
                // know; the original error still wins.
                if let Err(release_err) = self.repository.books.release_copy(book_id).await {
                    tracing::error!(
                        book_id,
                        error = %release_err,
                        "failed to release copy while rolling back a failed borrow"
                    );
                }
                Err(err)
            }
        }
    }

    /// Return a loan and put its copy back on the shelf.
    ///
    /// The loan record closes first; releasing the copy afterwards can only
    /// fail if the ledger already disagrees with the loan records, in which
    /// case the return stands for the patron and the fault is surfaced to
    /// the operator.
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.mark_returned(loan_id).await?;

        if let Err(err) = self.repository.books.release_copy(loan.book_id).await {
            tracing::error!(
                loan_id,
                book_id = loan.book_id,
                error = %err,
                "copy release failed after return; book counts need operator attention"
            );
        } else {
            tracing::info!(loan_id, book_id = loan.book_id, "loan returned");
        }

        Ok(LoanDetails::from_loan(loan, Utc::now()))
    }

    /// Extend an open loan's due date. Touches no inventory.
    pub async fn extend(&self, loan_id: i32, extra_days: i64) -> AppResult<LoanDetails> {
        self.validate_extension(extra_days)?;

        let loan = self.repository.loans.extend_due_date(loan_id, extra_days).await?;
        tracing::info!(loan_id, extra_days, "loan extended");
        Ok(LoanDetails::from_loan(loan, Utc::now()))
    }

    /// Reject a loan period before anything is written. A period the date
    /// arithmetic cannot represent must not get as far as the reservation,
    /// where a failure would need compensating.
    fn validate_loan_period(period: i64) -> AppResult<()> {
        if period <= 0 {
            return Err(AppError::BadRequest(
                "loan_period_days must be positive".to_string(),
            ));
        }
        if Loan::due_date_for(Utc::now(), period).is_none() {
            return Err(AppError::BadRequest(
                "loan_period_days is out of range".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_extension(&self, extra_days: i64) -> AppResult<()> {
        if extra_days <= 0 {
            return Err(AppError::InvalidExtension(
                "extension_days must be positive".to_string(),
            ));
        }
        if i32::try_from(extra_days).is_err() {
            return Err(AppError::InvalidExtension(
                "extension_days is out of range".to_string(),
            ));
        }
        if let Some(max) = self.config.max_extension_days {
            if extra_days > max {
                return Err(AppError::InvalidExtension(format!(
                    "extension_days must not exceed {}",
                    max
                )));
            }
        }
        Ok(())
    }

    /// Get a loan with its derived status
    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;
        Ok(LoanDetails::from_loan(loan, Utc::now()))
    }

    /// Get loans for a user
    pub async fn get_user_loans(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        let loans = self.repository.loans.get_by_user(user_id).await?;
        Ok(Self::with_status(loans))
    }

    /// Get loans for a book
    pub async fn get_book_loans(&self, book_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.books.get_by_id(book_id).await?;
        let loans = self.repository.loans.get_by_book(book_id).await?;
        Ok(Self::with_status(loans))
    }

    /// List all loans. Pagination is normalized in the repository.
    pub async fn list_loans(&self, page: i64, per_page: i64) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.get_all(page, per_page).await?;
        Ok(Self::with_status(loans))
    }

    /// Get open loans
    pub async fn get_active_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.get_active().await?;
        Ok(Self::with_status(loans))
    }

    /// Get overdue loans
    pub async fn get_overdue_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.get_overdue().await?;
        Ok(Self::with_status(loans))
    }

    /// Filtered loan search
    pub async fn search_loans(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.search(query).await?;
        Ok(Self::with_status(loans))
    }

    fn with_status(loans: Vec<Loan>) -> Vec<LoanDetails> {
        let now = Utc::now();
        loans
            .into_iter()
            .map(|loan| LoanDetails::from_loan(loan, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(max_extension_days: Option<i64>) -> LendingService {
        // Lazy pool: never connects, the validation under test does no I/O
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/placeholder")
            .unwrap();
        LendingService::new(
            Repository::new(pool),
            LendingConfig {
                default_period_days: 14,
                max_extension_days,
            },
        )
    }

    #[test]
    fn loan_period_must_be_positive() {
        assert!(matches!(
            LendingService::validate_loan_period(0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            LendingService::validate_loan_period(-3),
            Err(AppError::BadRequest(_))
        ));
        assert!(LendingService::validate_loan_period(14).is_ok());
    }

    #[test]
    fn unrepresentable_loan_period_is_rejected_up_front() {
        assert!(matches!(
            LendingService::validate_loan_period(i64::MAX),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn extension_must_be_positive() {
        let svc = service(None);
        assert!(matches!(
            svc.validate_extension(0),
            Err(AppError::InvalidExtension(_))
        ));
        assert!(svc.validate_extension(7).is_ok());
    }

    #[tokio::test]
    async fn extension_beyond_interval_range_is_rejected() {
        let svc = service(None);
        assert!(matches!(
            svc.validate_extension(i64::from(i32::MAX) + 1),
            Err(AppError::InvalidExtension(_))
        ));
    }

    #[tokio::test]
    async fn configured_extension_cap_is_enforced() {
        let svc = service(Some(30));
        assert!(svc.validate_extension(30).is_ok());
        assert!(matches!(
            svc.validate_extension(31),
            Err(AppError::InvalidExtension(_))
        ));
    }
}
