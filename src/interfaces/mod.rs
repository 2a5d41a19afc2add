//! Batch interface: CSV commands in, CSV reports out.

pub mod csv;
pub mod dispatch;
