pub mod bucket;
pub mod conflict;
pub mod extraction;
pub mod prompts;
pub mod schedule_service;
pub mod task_service;
pub mod time_codec;
