//! Books repository and inventory ledger
//!
//! Holds each book's total and available copy counts. The reserve/release
//! operations are single conditional UPDATEs, so Postgres row locking is
//! the serialization point: two concurrent reservations of a last copy
//! resolve to exactly one success and one out-of-stock failure.

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::page_window,
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with filters and pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (limit, offset) = page_window(query.page, query.per_page);

        let title = query.title.as_deref().unwrap_or("");
        let author = query.author.as_deref().unwrap_or("");
        let search = query.search.as_deref().unwrap_or("");

        let where_clause = r#"
            WHERE ($1 = '' OR title ILIKE '%' || $1 || '%')
              AND ($2 = '' OR author ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR isbn = $3)
              AND ($4 = '' OR title ILIKE '%' || $4 || '%'
                   OR author ILIKE '%' || $4 || '%'
                   OR description ILIKE '%' || $4 || '%')
        "#;

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT * FROM books {} ORDER BY title LIMIT $5 OFFSET $6",
            where_clause
        ))
        .bind(title)
        .bind(author)
        .bind(query.isbn.as_deref())
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books {}", where_clause))
            .bind(title)
            .bind(author)
            .bind(query.isbn.as_deref())
            .bind(search)
            .fetch_one(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Check if ISBN already exists
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Create a new book; all copies start available
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, publication_year, publisher,
                               language, pages, total_copies, available_copies, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.publication_year)
        .bind(&book.publisher)
        .bind(&book.language)
        .bind(book.pages)
        .bind(book.total_copies)
        .bind(&book.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update bibliographic fields. Copy counts are not touched here; they
    /// belong to `adjust_capacity`.
    pub async fn update_details(&self, id: i32, book: &UpdateBook) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                publication_year = COALESCE($5, publication_year),
                publisher = COALESCE($6, publisher),
                language = COALESCE($7, language),
                pages = COALESCE($8, pages),
                description = COALESCE($9, description)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.publication_year)
        .bind(&book.publisher)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        Ok(updated)
    }

    /// Atomically take one copy out of the available pool.
    ///
    /// The `available_copies > 0` guard and the decrement are one statement,
    /// so concurrent callers on the same book serialize on the row lock and
    /// at most `available_copies` of them succeed.
    pub async fn reserve_copy(&self, book_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1
             WHERE id = $1 AND available_copies > 0",
        )
        .bind(book_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing book from an empty shelf
            self.get_by_id(book_id).await?;
            return Err(AppError::OutOfStock { book_id });
        }

        Ok(())
    }

    /// Put one copy back into the available pool, capped at `total_copies`.
    ///
    /// Hitting the cap means a release without a matching reservation, i.e.
    /// the ledger and the loan records have already diverged.
    pub async fn release_copy(&self, book_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies + 1
             WHERE id = $1 AND available_copies < total_copies",
        )
        .bind(book_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.get_by_id(book_id).await?;
            return Err(AppError::InventoryCorruption { book_id });
        }

        Ok(())
    }

    /// Change `total_copies`, applying the same delta to `available_copies`.
    ///
    /// Rejected when the new total is smaller than the number of copies
    /// currently on loan; the guard and the write are one statement so a
    /// concurrent borrow cannot slip between them.
    pub async fn adjust_capacity(&self, book_id: i32, new_total: i32) -> AppResult<Book> {
        if new_total < 0 {
            return Err(AppError::InvalidCapacity(
                "total_copies must not be negative".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = $2 - (total_copies - available_copies),
                total_copies = $2
            WHERE id = $1 AND $2 >= total_copies - available_copies
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(new_total)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                let book = self.get_by_id(book_id).await?;
                Err(AppError::InvalidCapacity(format!(
                    "Cannot reduce total_copies to {}: {} copies are on loan",
                    new_total,
                    book.copies_on_loan()
                )))
            }
        }
    }

    /// Delete a book
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }
}
