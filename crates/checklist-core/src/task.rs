use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{due_date_serde, iso_millis_serde};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, enough to tell tasks apart in a table.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" | "normal" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(anyhow!("invalid priority: {other} (expected low, medium or high)")),
        }
    }
}

// Stored data is lenient: null or anything unrecognized weighs as low.
impl From<Option<String>> for Priority {
    fn from(value: Option<String>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(Priority::Low)
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default, with = "due_date_serde")]
    pub due: Option<NaiveDate>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub completed: bool,

    #[serde(default = "iso_millis_serde::missing", with = "iso_millis_serde")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        title: String,
        due: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            title,
            due,
            priority,
            completed: false,
            created_at: now,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due.is_some_and(|due| due < today)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Priority, Task, TaskId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn overdue_is_strictly_before_today() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).single().expect("valid now");
        let today = date(2024, 6, 15);

        let mut task = Task::new("Pay rent".to_string(), Some(date(2024, 6, 14)), Priority::High, now);
        assert!(task.is_overdue(today));

        task.completed = true;
        assert!(!task.is_overdue(today));

        task.completed = false;
        task.due = Some(today);
        assert!(!task.is_overdue(today));

        task.due = None;
        assert!(!task.is_overdue(today));
    }

    #[test]
    fn serializes_with_browser_field_names() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).single().expect("valid now");
        let mut task = Task::new("Buy milk".to_string(), Some(date(2024, 6, 20)), Priority::Low, now);
        task.id = TaskId::from("1718445600000");

        let value = serde_json::to_value(&task).expect("serialize");
        assert_eq!(value["id"], "1718445600000");
        assert_eq!(value["due"], "2024-06-20");
        assert_eq!(value["priority"], "low");
        assert_eq!(value["completed"], false);
        assert_eq!(value["createdAt"], "2024-06-15T10:00:00.000Z");
    }

    #[test]
    fn reads_legacy_priorities_and_null_due() {
        let raw = r#"{"id":"1","title":"Call mom","due":null,"priority":"normal","completed":true,"createdAt":"2024-06-01T08:30:00.123Z"}"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.due, None);
        assert!(task.completed);

        let odd = r#"{"id":"2","title":"x","due":"","priority":"urgent","completed":false,"createdAt":"2024-06-01T08:30:00Z"}"#;
        let task: Task = serde_json::from_str(odd).expect("parse task");
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.due, None);
    }

    #[test]
    fn damaged_fields_do_not_reject_the_record() {
        let raw = r#"{"id":"3","title":"Pay rent","due":"soon","priority":null,"completed":false}"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert_eq!(task.title, "Pay rent");
        assert_eq!(task.due, None);
        assert_eq!(task.priority, Priority::Low);

        let bad_stamp = r#"{"id":"4","title":"Stretch","createdAt":"yesterday-ish"}"#;
        let task: Task = serde_json::from_str(bad_stamp).expect("parse task");
        assert_eq!(task.title, "Stretch");
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn short_id_truncates_long_ids_only() {
        assert_eq!(TaskId::from("abc").short(), "abc");
        assert_eq!(TaskId::from("0123456789abcdef").short(), "01234567");
    }
}
