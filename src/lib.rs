//! Engagement flags and accountability-partner matching for cohort programs.
//!
//! [`compatibility`] and [`engagement`] are pure and do no I/O; the remaining
//! modules load their inputs and store or render their outputs.

pub mod compatibility;
pub mod db;
pub mod engagement;
pub mod error;
pub mod import;
pub mod models;
pub mod nuance;
pub mod report;
