//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database.
///
/// `available_copies` is owned by the inventory ledger: it is mutated only
/// through reserve/release/adjust_capacity, never by catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Number of copies currently out on loan.
    pub fn copies_on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Available count after resizing to `new_total`, keeping the on-loan
    /// count fixed. `None` when more copies are on loan than the new total
    /// would hold.
    pub fn reconciled_available(&self, new_total: i32) -> Option<i32> {
        let available = new_total - self.copies_on_loan();
        (available >= 0).then_some(available)
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author must not be empty"))]
    pub author: String,
    /// ISBN-10 or ISBN-13
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10-13 characters"))]
    pub isbn: String,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    /// Number of copies; all start available
    #[validate(range(min = 0, message = "total_copies must not be negative"))]
    pub total_copies: i32,
    pub description: Option<String>,
}

/// Update book request. `total_copies` changes are routed through the
/// inventory ledger; `available_copies` is not accepted here.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10-13 characters"))]
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub total_copies: Option<i32>,
    pub description: Option<String>,
}

/// Book search query
#[derive(Debug, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Search in title
    pub title: Option<String>,
    /// Search by author
    pub author: Option<String>,
    /// Exact ISBN lookup
    pub isbn: Option<String>,
    /// Free-text search over title, author and description
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(total: i32, available: i32) -> Book {
        Book {
            id: 1,
            title: "Test".into(),
            author: "Author".into(),
            isbn: "1234567890".into(),
            publication_year: None,
            publisher: None,
            language: None,
            pages: None,
            total_copies: total,
            available_copies: available,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn copies_on_loan_is_the_difference() {
        assert_eq!(book(5, 2).copies_on_loan(), 3);
        assert_eq!(book(1, 1).copies_on_loan(), 0);
    }

    #[test]
    fn capacity_increase_adds_available_copies() {
        // 3 on loan, growing to 10 leaves 7 available
        assert_eq!(book(5, 2).reconciled_available(10), Some(7));
    }

    #[test]
    fn capacity_decrease_keeps_loaned_copies() {
        // 3 on loan, shrinking to 3 leaves none available
        assert_eq!(book(5, 2).reconciled_available(3), Some(0));
    }

    #[test]
    fn capacity_below_loaned_count_is_rejected() {
        // 3 on loan cannot fit in 2 total copies
        assert_eq!(book(5, 2).reconciled_available(2), None);
    }
}
