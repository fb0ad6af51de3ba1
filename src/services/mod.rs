//! Business logic services.

pub mod application;
pub mod dashboard;
pub mod discovery;
pub mod health;
pub mod issue;
pub mod orchestrator;
pub mod result_store;
pub mod scan_lock;
pub mod scan_run;
pub mod scheduler;
pub mod summary;
