pub mod extraction;
pub mod schedule;
pub mod task;
