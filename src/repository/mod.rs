//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod users;

use sqlx::{Pool, Postgres};

/// Highest page number the paginated queries will serve
const MAX_PAGE: i64 = 1_000_000;

/// Normalize pagination inputs into a `(LIMIT, OFFSET)` pair.
///
/// Both inputs are clamped so the offset multiplication stays within i64
/// for any caller-supplied values.
pub(crate) fn page_window(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (per_page, (page - 1) * per_page)
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults() {
        assert_eq!(page_window(None, None), (20, 0));
    }

    #[test]
    fn page_window_computes_offset() {
        assert_eq!(page_window(Some(3), Some(25)), (25, 50));
    }

    #[test]
    fn page_window_clamps_out_of_range_inputs() {
        // An absurd page number must not overflow the offset arithmetic
        let (limit, offset) = page_window(Some(i64::MAX), Some(i64::MAX));
        assert_eq!(limit, 100);
        assert_eq!(offset, (MAX_PAGE - 1) * 100);

        assert_eq!(page_window(Some(0), Some(0)), (1, 0));
        assert_eq!(page_window(Some(-5), Some(-5)), (1, 0));
    }
}
