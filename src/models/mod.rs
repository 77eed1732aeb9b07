//! Data models for the Alexandria library management system

pub mod book;
pub mod loan;
pub mod user;

pub use book::Book;
pub use loan::{Loan, LoanStatus};
pub use user::User;
