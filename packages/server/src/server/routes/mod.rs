pub mod cron;
pub mod health;
pub mod jobs;

pub use cron::execute_pending_jobs;
pub use health::{health_db_handler, health_handler};
pub use jobs::{create_job, delete_job, get_job, list_jobs, update_job_status};
