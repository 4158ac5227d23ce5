pub mod schedule_repository;
pub mod task_repository;
