//! Bulk course generation orchestrator
//!
//! This library provides the core functionality for the bulk-course-gen
//! service: it turns a request for a group of employees into a job with one
//! task per employee, processes those tasks one by one against a hosted
//! generation backend, and reports progress to the job's creator.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
