pub mod auth;
pub mod generation;
pub mod personalization;
pub mod processor;
pub mod queue;
pub mod status;
pub mod store;
pub mod submission;
