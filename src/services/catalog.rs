//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Create a new book with ISBN uniqueness check
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.repository.books.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Conflict(
                "A book with this ISBN already exists".to_string(),
            ));
        }

        self.repository.books.create(&book).await
    }

    /// Update a book.
    ///
    /// Bibliographic fields are written directly; a `total_copies` change
    /// goes through the inventory ledger so `available_copies` moves by the
    /// same delta and can never go negative or above the new total.
    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        book.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let existing = self.repository.books.get_by_id(id).await?;

        if let Some(ref isbn) = book.isbn {
            if self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(
                    "A book with this ISBN already exists".to_string(),
                ));
            }
        }

        // The capacity change goes first: its guard is the only part of the
        // update that can be refused, and refusal must leave the record
        // untouched, bibliographic fields included.
        if let Some(new_total) = book.total_copies {
            if existing.reconciled_available(new_total).is_none() {
                return Err(AppError::InvalidCapacity(format!(
                    "Cannot reduce total_copies to {}: {} copies are on loan",
                    new_total,
                    existing.copies_on_loan()
                )));
            }
            self.repository.books.adjust_capacity(id, new_total).await?;
        }

        self.repository.books.update_details(id, &book).await
    }

    /// Delete a book. Refused while copies are out on loan unless forced.
    pub async fn delete_book(&self, id: i32, force: bool) -> AppResult<()> {
        self.repository.books.get_by_id(id).await?;

        if !force {
            let open = self.repository.loans.count_open_for_book(id).await?;
            if open > 0 {
                return Err(AppError::Conflict(format!(
                    "Book has {} open loan(s)",
                    open
                )));
            }
        }

        self.repository.books.delete(id).await
    }
}
