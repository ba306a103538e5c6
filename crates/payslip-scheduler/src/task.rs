//! Task definitions.

use crate::expression::{validate_email, validate_schedule};
use chrono::{DateTime, Utc};
use payslip_core::{format_timestamp, parse_timestamp, TaskId, ValidationError};
use serde::{Deserialize, Serialize};

/// A recurring instruction: fetch PDF attachments from one sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub sender_email: String,
    /// Subject filter, `None` when unset
    pub subject_keywords: Option<String>,
    /// 5-field recurrence expression
    pub schedule: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub description: String,
}

/// Label used when a task has no explicit description.
#[must_use]
pub fn default_description(sender_email: &str) -> String {
    format!("Payslips from {sender_email}")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// On-disk representation of a task.
///
/// Fields are declared in alphabetical order so serialized keys come out
/// sorted. Unknown keys (e.g. `schedule_id`) are ignored on read.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredTask {
    created_at: String,
    description: String,
    enabled: bool,
    last_run: Option<String>,
    schedule: String,
    sender_email: String,
    subject_keywords: Option<String>,
}

impl From<&Task> for StoredTask {
    fn from(task: &Task) -> Self {
        Self {
            created_at: format_timestamp(&task.created_at),
            description: task.description.clone(),
            enabled: task.enabled,
            last_run: task.last_run.as_ref().map(format_timestamp),
            schedule: task.schedule.clone(),
            sender_email: task.sender_email.clone(),
            subject_keywords: task.subject_keywords.clone(),
        }
    }
}

impl StoredTask {
    /// Validate a record read from disk. The error names what is wrong.
    pub(crate) fn into_task(self, id: &str) -> Result<Task, String> {
        let id = TaskId::new(id).map_err(|e| e.to_string())?;
        validate_email(&self.sender_email).map_err(|e| e.to_string())?;
        validate_schedule(&self.schedule).map_err(|e| e.to_string())?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| format!("invalid created_at '{}'", self.created_at))?;
        let last_run = match self.last_run {
            Some(raw) => Some(
                parse_timestamp(&raw).ok_or_else(|| format!("invalid last_run '{raw}'"))?,
            ),
            None => None,
        };

        Ok(Task {
            id,
            sender_email: self.sender_email,
            subject_keywords: non_empty(self.subject_keywords),
            schedule: self.schedule,
            enabled: self.enabled,
            created_at,
            last_run,
            description: self.description,
        })
    }
}

/// Input for [`TaskStore::create`](crate::TaskStore::create).
#[derive(Debug, Clone)]
pub struct NewTask {
    sender_email: String,
    schedule: String,
    subject_keywords: Option<String>,
    description: Option<String>,
    enabled: bool,
}

impl NewTask {
    /// A new enabled task with no subject filter and the default description.
    pub fn new(sender_email: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            sender_email: sender_email.into(),
            schedule: schedule.into(),
            subject_keywords: None,
            description: None,
            enabled: true,
        }
    }

    /// Only match messages whose subject contains `keywords`.
    #[must_use]
    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.subject_keywords = Some(keywords.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub(crate) fn into_task(self, now: DateTime<Utc>) -> Result<Task, ValidationError> {
        validate_email(&self.sender_email)?;
        validate_schedule(&self.schedule)?;
        let description = non_empty(self.description)
            .unwrap_or_else(|| default_description(&self.sender_email));

        Ok(Task {
            id: TaskId::generate(),
            subject_keywords: non_empty(self.subject_keywords),
            sender_email: self.sender_email,
            schedule: self.schedule,
            enabled: self.enabled,
            created_at: now,
            last_run: None,
            description,
        })
    }
}

/// Partial update for [`TaskStore::update`](crate::TaskStore::update).
///
/// `None` leaves a field untouched. For `subject_keywords`, `Some("")`
/// clears the filter; for `description`, `Some("")` restores the default.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub sender_email: Option<String>,
    pub subject_keywords: Option<String>,
    pub schedule: Option<String>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
}

impl TaskUpdate {
    #[must_use]
    pub fn sender_email(mut self, sender_email: impl Into<String>) -> Self {
        self.sender_email = Some(sender_email.into());
        self
    }

    #[must_use]
    pub fn subject_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.subject_keywords = Some(keywords.into());
        self
    }

    /// Remove the subject filter.
    #[must_use]
    pub fn clear_subject_keywords(mut self) -> Self {
        self.subject_keywords = Some(String::new());
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check every supplied field before anything is applied.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(sender) = &self.sender_email {
            validate_email(sender)?;
        }
        if let Some(schedule) = &self.schedule {
            validate_schedule(schedule)?;
        }
        Ok(())
    }

    pub(crate) fn apply(self, task: &mut Task) {
        if let Some(sender) = self.sender_email {
            task.sender_email = sender;
        }
        if let Some(keywords) = self.subject_keywords {
            task.subject_keywords = non_empty(Some(keywords));
        }
        if let Some(schedule) = self.schedule {
            task.schedule = schedule;
        }
        if let Some(enabled) = self.enabled {
            task.enabled = enabled;
        }
        if let Some(description) = self.description {
            task.description = non_empty(Some(description))
                .unwrap_or_else(|| default_description(&task.sender_email));
        }
    }
}

/// Task totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        NewTask::new("payroll@company.com", "0 9 11 * *")
            .into_task(Utc::now())
            .expect("valid task")
    }

    #[test]
    fn test_new_task_defaults() {
        let task = sample();
        assert!(task.enabled);
        assert_eq!(task.subject_keywords, None);
        assert_eq!(task.description, "Payslips from payroll@company.com");
        assert_eq!(task.last_run, None);
    }

    #[test]
    fn test_new_task_empty_keywords_become_none() {
        let task = NewTask::new("payroll@company.com", "0 9 11 * *")
            .with_keywords("")
            .into_task(Utc::now())
            .expect("valid task");
        assert_eq!(task.subject_keywords, None);
    }

    #[test]
    fn test_new_task_rejects_bad_input() {
        assert!(matches!(
            NewTask::new("not-an-email", "0 9 11 * *").into_task(Utc::now()),
            Err(ValidationError::Email { .. })
        ));
        assert!(matches!(
            NewTask::new("payroll@company.com", "0 9 11 *").into_task(Utc::now()),
            Err(ValidationError::FieldCount { found: 4 })
        ));
    }

    #[test]
    fn test_update_semantics() {
        let mut task = sample();
        task.subject_keywords = Some("payslip".to_string());

        TaskUpdate::default().enabled(false).apply(&mut task);
        assert!(!task.enabled);
        assert_eq!(task.subject_keywords.as_deref(), Some("payslip"));

        TaskUpdate::default().clear_subject_keywords().apply(&mut task);
        assert_eq!(task.subject_keywords, None);

        TaskUpdate::default().description("Salary").apply(&mut task);
        assert_eq!(task.description, "Salary");
        TaskUpdate::default().description("").apply(&mut task);
        assert_eq!(task.description, "Payslips from payroll@company.com");
    }

    #[test]
    fn test_update_validation() {
        assert!(TaskUpdate::default().schedule("0 25 * * *").validate().is_err());
        assert!(TaskUpdate::default().sender_email("nope").validate().is_err());
        assert!(TaskUpdate::default().schedule("30 8 1 * *").validate().is_ok());
    }

    #[test]
    fn test_stored_round_trip_keeps_fields() {
        let mut task = sample();
        task.last_run = Some(Utc::now());
        let stored = StoredTask::from(&task);
        let restored = stored
            .into_task(task.id.as_str())
            .expect("valid record");
        assert_eq!(restored.sender_email, task.sender_email);
        assert_eq!(restored.schedule, task.schedule);
        assert_eq!(restored.created_at, task.created_at);
        assert_eq!(restored.last_run, task.last_run);
    }

    #[test]
    fn test_stored_accepts_legacy_record() {
        let raw = r#"{
            "sender_email": "payroll@company.com",
            "subject_keywords": "",
            "schedule": "0 9 11 * *",
            "schedule_id": "0 9 11 * *",
            "enabled": true,
            "created_at": "2025-01-15T10:30:00.123456",
            "last_run": null,
            "description": "Payslips from payroll@company.com"
        }"#;
        let stored: StoredTask = serde_json::from_str(raw).expect("parse legacy record");
        let task = stored
            .into_task("0b6f5c1e-2d3a-4c5b-9e7f-8a1b2c3d4e5f")
            .expect("valid record");
        assert_eq!(task.subject_keywords, None);
    }

    #[test]
    fn test_stored_rejects_invalid_schedule() {
        let raw = r#"{
            "sender_email": "payroll@company.com",
            "subject_keywords": null,
            "schedule": "every month",
            "enabled": true,
            "created_at": "2025-01-15T10:30:00Z",
            "last_run": null,
            "description": "x"
        }"#;
        let stored: StoredTask = serde_json::from_str(raw).expect("parse record");
        assert!(stored
            .into_task("0b6f5c1e-2d3a-4c5b-9e7f-8a1b2c3d4e5f")
            .is_err());
    }
}
