//! Loan model and lifecycle state derivation

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

/// Lifecycle state of a loan, derived fresh from the stored timestamps on
/// every query. Never persisted: storing an "overdue" flag would be a
/// second source of truth that can drift from `due_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Open, due date not yet passed
    Active,
    /// Open, due date in the past
    Overdue,
    /// Closed. Terminal: a returned loan cannot be re-opened.
    Returned,
}

impl Loan {
    /// Derive the lifecycle state at `now`. States are mutually exclusive;
    /// Active and Overdue flip purely as a function of wall-clock time.
    pub fn status_at(&self, now: DateTime<Utc>) -> LoanStatus {
        match self.return_date {
            Some(_) => LoanStatus::Returned,
            None if self.due_date < now => LoanStatus::Overdue,
            None => LoanStatus::Active,
        }
    }

    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    /// Due date for a loan starting at `start`. `None` when `period_days`
    /// does not fit in the representable time range, so callers can reject
    /// the input instead of panicking mid-operation.
    pub fn due_date_for(start: DateTime<Utc>, period_days: i64) -> Option<DateTime<Utc>> {
        Duration::try_days(period_days).and_then(|d| start.checked_add_signed(d))
    }
}

/// Loan with its derived status, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

impl LoanDetails {
    pub fn from_loan(loan: Loan, now: DateTime<Utc>) -> Self {
        let status = loan.status_at(now);
        Self {
            id: loan.id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status,
        }
    }
}

/// Loan search query
#[derive(Debug, Deserialize, IntoParams)]
pub struct LoanQuery {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    /// Filter on derived status (active, overdue, returned)
    pub status: Option<LoanStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(due: DateTime<Utc>, returned: Option<DateTime<Utc>>) -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            user_id: 7,
            loan_date: due - Duration::days(14),
            due_date: due,
            return_date: returned,
        }
    }

    #[test]
    fn open_loan_with_future_due_date_is_active() {
        let now = Utc::now();
        assert_eq!(loan(now + Duration::days(3), None).status_at(now), LoanStatus::Active);
    }

    #[test]
    fn open_loan_with_past_due_date_is_overdue() {
        let now = Utc::now();
        assert_eq!(loan(now - Duration::days(1), None).status_at(now), LoanStatus::Overdue);
    }

    #[test]
    fn due_exactly_now_is_still_active() {
        let now = Utc::now();
        assert_eq!(loan(now, None).status_at(now), LoanStatus::Active);
    }

    #[test]
    fn returned_wins_regardless_of_due_date() {
        let now = Utc::now();
        let overdue_then_returned = loan(now - Duration::days(30), Some(now - Duration::days(2)));
        assert_eq!(overdue_then_returned.status_at(now), LoanStatus::Returned);

        let returned_early = loan(now + Duration::days(5), Some(now));
        assert_eq!(returned_early.status_at(now), LoanStatus::Returned);
    }

    #[test]
    fn status_flips_with_the_clock_only() {
        let due = Utc::now();
        let l = loan(due, None);
        assert_eq!(l.status_at(due - Duration::hours(1)), LoanStatus::Active);
        assert_eq!(l.status_at(due + Duration::hours(1)), LoanStatus::Overdue);
    }

    #[test]
    fn due_date_for_adds_whole_days() {
        let now = Utc::now();
        assert_eq!(Loan::due_date_for(now, 14), Some(now + Duration::days(14)));
    }

    #[test]
    fn due_date_for_rejects_out_of_range_periods() {
        let now = Utc::now();
        assert_eq!(Loan::due_date_for(now, i64::MAX), None);
        assert_eq!(Loan::due_date_for(now, i64::MIN), None);
    }
}
