//! Database models and DTOs for all domain entities.

pub mod application;
pub mod issue;
pub mod pagination;
pub mod scan_run;
pub mod summary;
