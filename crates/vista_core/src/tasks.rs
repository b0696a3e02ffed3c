//! crates/vista_core/src/tasks.rs
//!
//! Filtering of application-task updates coming from the browser. Form fields the
//! user left blank arrive as empty strings and must not overwrite stored values.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::TaskStatus;
use crate::ports::{PortError, PortResult};

/// A raw task update as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

/// The fields that survive filtering, ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
}

fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TaskUpdate {
    /// Drops empty and absent fields, then parses the typed ones.
    ///
    /// Fails with `InvalidInput` if nothing is left to update, or if a date or
    /// status is present but malformed.
    pub fn into_patch(self) -> PortResult<TaskPatch> {
        let due_date = match filled(self.due_date) {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                PortError::InvalidInput(format!("'{}' is not a valid due date (YYYY-MM-DD)", raw))
            })?),
            None => None,
        };
        let status = match filled(self.status) {
            Some(raw) => Some(TaskStatus::parse(&raw).ok_or_else(|| {
                PortError::InvalidInput(format!("'{}' is not a valid task status", raw))
            })?),
            None => None,
        };

        let patch = TaskPatch {
            title: filled(self.title),
            description: filled(self.description),
            due_date,
            status,
        };
        if patch == TaskPatch::default() {
            return Err(PortError::InvalidInput(
                "No valid fields provided for task update".to_string(),
            ));
        }
        Ok(patch)
    }
}
