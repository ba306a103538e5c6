//! The scheduled run: process every active task once.
//!
//! Tasks are handled one at a time. A task succeeds when at least one PDF
//! was downloaded, when nothing matched, or when everything that matched was
//! already on disk; only successful tasks get `last_run` stamped.

use chrono::{Datelike, Local};
use payslip_core::AppConfig;
use payslip_mail::{MailApi, MailError, SearchClient};
use payslip_scheduler::{StoreError, Task, TaskStore};
use payslip_security::secure_join;
use tracing::{error, info, warn};

/// Totals for one scheduled run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Active tasks found at the start of the run
    pub total_tasks: usize,
    /// Tasks that succeeded and were marked as run
    pub processed: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Messages with PDF attachments across all tasks
    pub total_emails: usize,
    /// Attachments downloaded
    pub total_downloads: usize,
    /// Attachments skipped because the file already existed
    pub skipped_existing: usize,
    /// Human-readable error descriptions
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Whether any task failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn log(&self) {
        info!(
            total_tasks = self.total_tasks,
            processed = self.processed,
            failed = self.failed,
            emails = self.total_emails,
            downloads = self.total_downloads,
            skipped_existing = self.skipped_existing,
            "Run complete"
        );
        for err in &self.errors {
            warn!("  {}", err);
        }
    }
}

/// What happened while working through one task's messages.
#[derive(Debug, Default)]
struct TaskReport {
    emails_found: usize,
    downloaded: usize,
    skipped_existing: usize,
    errors: Vec<String>,
}

impl TaskReport {
    fn succeeded(&self) -> bool {
        self.downloaded > 0 || self.emails_found == 0 || self.errors.is_empty()
    }
}

/// Run every active task in `store` once.
///
/// Only failing to read the task list aborts the run; per-task problems
/// are recorded in the summary.
pub async fn process_all_tasks<A: MailApi>(
    store: &TaskStore,
    client: &SearchClient<A>,
    config: &AppConfig,
) -> Result<RunSummary, StoreError> {
    let tasks = store.active()?;
    info!(count = tasks.len(), "Processing active tasks");

    let mut summary = RunSummary {
        total_tasks: tasks.len(),
        ..RunSummary::default()
    };

    for task in &tasks {
        info!(task_id = %task.id, sender = %task.sender_email, "Processing task");

        let report = match run_task(task, client, config).await {
            Ok(report) => report,
            Err(e) => {
                error!(task_id = %task.id, "Task failed: {}", e);
                summary.failed += 1;
                summary.errors.push(format!("{}: {e}", task.description));
                continue;
            }
        };

        summary.total_emails += report.emails_found;
        summary.total_downloads += report.downloaded;
        summary.skipped_existing += report.skipped_existing;
        let succeeded = report.succeeded();
        summary.errors.extend(
            report
                .errors
                .into_iter()
                .map(|e| format!("{}: {e}", task.description)),
        );

        if !succeeded {
            warn!(task_id = %task.id, "Task finished without downloading anything");
            summary.failed += 1;
            continue;
        }

        match store.mark_run(task.id.as_str(), None) {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                error!(task_id = %task.id, "Failed to record run: {}", e);
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("{}: failed to record run: {e}", task.description));
            }
        }
    }

    summary.log();
    Ok(summary)
}

/// Search and download for one task. Errors abort only this task.
async fn run_task<A: MailApi>(
    task: &Task,
    client: &SearchClient<A>,
    config: &AppConfig,
) -> Result<TaskReport, MailError> {
    let messages = client
        .search(
            &task.sender_email,
            task.subject_keywords.as_deref(),
            config.gmail.days_back,
        )
        .await?;

    let mut report = TaskReport {
        emails_found: messages.len(),
        ..TaskReport::default()
    };

    for message in &messages {
        let year = message.date.with_timezone(&Local).year();
        let year_dir = match config.year_dir(year) {
            Ok(dir) => dir,
            Err(e) => {
                report.errors.push(format!("download directory for {year}: {e}"));
                continue;
            }
        };

        for attachment in &message.attachments {
            let target = match secure_join(&year_dir, &[attachment.filename.as_str()]) {
                Ok(path) => path,
                Err(e) => {
                    report.errors.push(format!("{}: {e}", attachment.filename));
                    continue;
                }
            };

            if target.exists() {
                info!(path = %target.display(), "Already downloaded, skipping");
                report.skipped_existing += 1;
                continue;
            }

            match client
                .download_attachment(&message.message_id, &attachment.attachment_id, &target)
                .await
            {
                Ok(_) => report.downloaded += 1,
                Err(e) if e.is_fatal_remote() => return Err(e),
                Err(e) => {
                    warn!(filename = %attachment.filename, "Download failed: {}", e);
                    report.errors.push(format!("{}: {e}", attachment.filename));
                }
            }
        }
    }

    info!(
        task_id = %task.id,
        emails = report.emails_found,
        downloaded = report.downloaded,
        skipped = report.skipped_existing,
        "Task finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_success_rules() {
        let nothing_found = TaskReport::default();
        assert!(nothing_found.succeeded());

        let downloaded_some = TaskReport {
            emails_found: 2,
            downloaded: 1,
            errors: vec!["b.pdf: not a pdf".to_string()],
            ..TaskReport::default()
        };
        assert!(downloaded_some.succeeded());

        let all_present = TaskReport {
            emails_found: 1,
            skipped_existing: 1,
            ..TaskReport::default()
        };
        assert!(all_present.succeeded());

        let all_failed = TaskReport {
            emails_found: 1,
            errors: vec!["a.pdf: not a pdf".to_string()],
            ..TaskReport::default()
        };
        assert!(!all_failed.succeeded());
    }

    #[test]
    fn test_summary_failures() {
        assert!(!RunSummary::default().has_failures());
        let summary = RunSummary {
            failed: 1,
            ..RunSummary::default()
        };
        assert!(summary.has_failures());
    }
}
