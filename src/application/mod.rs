//! Application layer: the ledger store and the engines built on it.
//!
//! Each money-affecting operation runs inside a [`ledger::UnitOfWork`] that
//! locks the rows it touches, validates against their locked state and
//! commits all of its writes at once.

pub mod accounts;
pub mod bank;
pub mod customers;
pub mod emi_payments;
pub mod ledger;
pub mod loans;
pub mod locks;
pub mod transactions;

pub use bank::Bank;
