pub mod bulk;
pub mod error;
pub mod extract;
pub mod health;
pub mod metrics;
