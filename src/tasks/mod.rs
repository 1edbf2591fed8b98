//! Background tasks module
//! 
//! This module contains background tasks that run alongside the HTTP server.

pub mod completion_runner;
pub mod notification_worker;
pub mod timer_ticker;

// Re-export main functions
pub use completion_runner::{finish_completion, resume_after_restart, run_completion};
pub use notification_worker::notification_worker_task;
pub use timer_ticker::timer_ticker_task;
