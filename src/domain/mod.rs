//! Domain entities, value objects and the persistence port.

pub mod access;
pub mod account;
pub mod clock;
pub mod customer;
pub mod emi;
pub mod loan;
pub mod money;
pub mod ports;
pub mod transaction;
