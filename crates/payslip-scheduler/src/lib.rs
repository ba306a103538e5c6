//! Payslip Scheduler - the persistent task registry.
//!
//! Tasks describe which sender to fetch PDF attachments from and on what
//! recurrence. Running them on time is the job of the system cron daemon;
//! this crate validates the expressions and owns the `tasks.json` file.

pub mod error;
pub mod expression;
mod lock;
pub mod store;
pub mod task;

pub use error::{Result, StoreError, StoreErrorKind};
pub use expression::{validate_email, validate_schedule, MonthlySchedule};
pub use store::{TaskStore, DEFAULT_LOCK_TIMEOUT};
pub use task::{default_description, NewTask, Task, TaskCounts, TaskUpdate};
