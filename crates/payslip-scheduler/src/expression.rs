//! Validation of recurrence expressions and sender addresses.
//!
//! Expressions use the 5-field cron layout `minute hour day month weekday`,
//! where each field is `*` or a single in-range integer. Interpreting the
//! expression (computing run times) is left to the system cron daemon.

use payslip_core::ValidationError;

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    // 0 and 7 both mean Sunday
    FieldSpec { name: "weekday", min: 0, max: 7 },
];

/// Validate a 5-field recurrence expression.
///
/// # Errors
/// [`ValidationError::FieldCount`] when there are not exactly five fields,
/// [`ValidationError::Field`] naming the first non-numeric or out-of-range field.
pub fn validate_schedule(expr: &str) -> Result<(), ValidationError> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != FIELDS.len() {
        return Err(ValidationError::FieldCount { found: parts.len() });
    }

    for (token, spec) in parts.iter().zip(FIELDS.iter()) {
        if *token == "*" {
            continue;
        }
        let in_range = token
            .parse::<i64>()
            .is_ok_and(|v| (i64::from(spec.min)..=i64::from(spec.max)).contains(&v));
        if !in_range {
            return Err(ValidationError::Field {
                field: spec.name,
                value: (*token).to_string(),
                min: spec.min,
                max: spec.max,
            });
        }
    }

    Ok(())
}

/// Validate an email address: one `@`, a local part, and a dotted domain.
///
/// # Errors
/// [`ValidationError::Email`] describing the first problem found.
pub fn validate_email(address: &str) -> Result<(), ValidationError> {
    let reject = |reason| {
        Err(ValidationError::Email {
            address: address.to_string(),
            reason,
        })
    };

    let Some((local, domain)) = address.split_once('@') else {
        return reject("missing '@'");
    };
    if domain.contains('@') {
        return reject("more than one '@'");
    }
    if local.is_empty() {
        return reject("empty local part");
    }
    if domain.is_empty() {
        return reject("empty domain");
    }
    if !domain.contains('.') {
        return reject("domain has no '.'");
    }
    Ok(())
}

/// A "once a month at a fixed time" schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlySchedule {
    day: u32,
    hour: u32,
    minute: u32,
}

impl MonthlySchedule {
    /// Build a monthly schedule, range-checking every component.
    ///
    /// # Errors
    /// [`ValidationError::Field`] for a day outside 1-31, hour outside 0-23
    /// or minute outside 0-59.
    pub fn new(day: u32, hour: u32, minute: u32) -> Result<Self, ValidationError> {
        for (value, spec) in [(minute, &FIELDS[0]), (hour, &FIELDS[1]), (day, &FIELDS[2])] {
            if !(spec.min..=spec.max).contains(&value) {
                return Err(ValidationError::Field {
                    field: spec.name,
                    value: value.to_string(),
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        Ok(Self { day, hour, minute })
    }

    /// The recurrence expression, e.g. `"0 9 11 * *"`.
    #[must_use]
    pub fn expression(&self) -> String {
        format!("{} {} {} * *", self.minute, self.hour, self.day)
    }

    /// Human-readable summary, e.g. `"Every month on day 11 at 09:00"`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "Every month on day {} at {:02}:{:02}",
            self.day, self.hour, self.minute
        )
    }

    /// A crontab line running `command` on this schedule.
    #[must_use]
    pub fn crontab_line(&self, command: &str) -> String {
        format!("{} {command}", self.expression())
    }
}
