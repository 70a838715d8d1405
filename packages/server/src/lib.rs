// Durable Job Scheduler & Execution Engine
//
// REST submission surface lives in `server`; the scheduling, claiming,
// execution-lifecycle, retry, and crash-recovery core lives in `kernel::jobs`.
// Workers coordinate exclusively through Postgres row locks.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::Config;
