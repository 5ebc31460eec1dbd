pub mod bulk;
pub mod course;
pub mod employee;
pub mod job;
