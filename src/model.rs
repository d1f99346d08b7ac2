//! Domain enumerations and the validation boundary.
//!
//! Everything here is pure: callers pass values in, get a normalized value or
//! a field-level [`ValidationError`] back. Persistence-level invariants
//! (uniqueness, referential integrity) live in the schema, not here.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A rejected field value. `field` names the offending request field so the
/// API layer can report errors per field: `{"<field>": ["<message>"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

// ─── Task domains ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "assigned" => Some(Self::Assigned),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ─── Field validation ────────────────────────────────────────────────────────

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::new("title", "Title cannot be blank."));
    }
    Ok(())
}

/// Parse an RFC 3339 datetime and return it normalized to UTC.
///
/// All stored timestamps share the `+00:00` offset so that string comparison
/// in SQL orders and filters them correctly.
pub fn normalize_datetime(raw: &str, field: &str) -> Result<String, ValidationError> {
    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| {
        ValidationError::new(field, "Datetime has wrong format. Use RFC 3339, e.g. 2026-01-02T15:04:05Z.")
    })?;
    Ok(parsed.with_timezone(&Utc).to_rfc3339())
}

/// Validate a due date supplied on create/update: RFC 3339 and strictly in
/// the future relative to `now`. Returns the normalized UTC string.
pub fn validate_due_date(raw: &str, now: DateTime<Utc>) -> Result<String, ValidationError> {
    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| {
        ValidationError::new("due_date", "Datetime has wrong format. Use RFC 3339, e.g. 2026-01-02T15:04:05Z.")
    })?;
    let utc = parsed.with_timezone(&Utc);
    if utc <= now {
        return Err(ValidationError::new(
            "due_date",
            "Task due date must be in the future.",
        ));
    }
    Ok(utc.to_rfc3339())
}

pub fn validate_priority(raw: &str) -> Result<TaskPriority, ValidationError> {
    TaskPriority::parse(raw)
        .ok_or_else(|| ValidationError::new("priority", "Priority must be one of: low, medium, high."))
}

pub fn validate_status(raw: &str) -> Result<TaskStatus, ValidationError> {
    TaskStatus::parse(raw).ok_or_else(|| {
        ValidationError::new("status", "Status must be one of: pending, in_progress, completed.")
    })
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::new("username", "Username cannot be blank."));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(ValidationError::new("email", "Enter a valid email address."));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 6 {
        return Err(ValidationError::new(
            "password",
            "Password must be at least 6 characters.",
        ));
    }
    Ok(())
}

/// Truthy tokens accepted by the `upcoming` query toggle.
pub fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
