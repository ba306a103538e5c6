//! Payslip Runner - the scheduled download run.
//!
//! Invoked by cron through the `payslip-run` binary: loads configuration,
//! sets up logging, then downloads new PDF attachments for every active
//! task and records which tasks ran.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod context;
pub mod logging;
pub mod worker;

pub use context::RunContext;
pub use logging::init_tracing;
pub use worker::{process_all_tasks, RunSummary};
