use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};

use crate::datetime::DayBoundary;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewFilter {
    #[default]
    All,
    Active,
    Completed,
    Overdue,
}

impl ViewFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewFilter::All => "all",
            ViewFilter::Active => "active",
            ViewFilter::Completed => "completed",
            ViewFilter::Overdue => "overdue",
        }
    }

    pub fn keeps(self, task: &Task, today: NaiveDate) -> bool {
        match self {
            ViewFilter::Active => !task.completed,
            ViewFilter::Completed => task.completed,
            ViewFilter::Overdue => task.is_overdue(today),
            ViewFilter::All => true,
        }
    }
}

impl fmt::Display for ViewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ViewFilter::All),
            "active" => Ok(ViewFilter::Active),
            "completed" => Ok(ViewFilter::Completed),
            "overdue" => Ok(ViewFilter::Overdue),
            other => Err(anyhow!(
                "unknown filter: {other} (expected all, active, completed or overdue)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedDesc,
    CreatedAsc,
    DueAsc,
    DueDesc,
    PriorityDesc,
    PriorityAsc,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::CreatedDesc,
        SortKey::CreatedAsc,
        SortKey::DueAsc,
        SortKey::DueDesc,
        SortKey::PriorityDesc,
        SortKey::PriorityAsc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::CreatedDesc => "created-desc",
            SortKey::CreatedAsc => "created-asc",
            SortKey::DueAsc => "due-asc",
            SortKey::DueDesc => "due-desc",
            SortKey::PriorityDesc => "priority-desc",
            SortKey::PriorityAsc => "priority-asc",
        }
    }

    /// Tasks without a due date order before every dated task, so they lead
    /// `due-asc` and trail `due-desc`.
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortKey::CreatedDesc => b.created_at.cmp(&a.created_at),
            SortKey::CreatedAsc => a.created_at.cmp(&b.created_at),
            SortKey::DueAsc => a.due.cmp(&b.due),
            SortKey::DueDesc => b.due.cmp(&a.due),
            SortKey::PriorityDesc => b.priority.weight().cmp(&a.priority.weight()),
            SortKey::PriorityAsc => a.priority.weight().cmp(&b.priority.weight()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = SortKey::ALL.iter().map(|key| key.as_str()).collect();
                anyhow!("unknown sort: {wanted} (expected one of {})", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub filter: ViewFilter,
    pub search: String,
    pub sort: SortKey,
}

impl ViewQuery {
    pub fn new(filter: ViewFilter, search: impl Into<String>, sort: SortKey) -> Self {
        Self {
            filter,
            search: search.into(),
            sort,
        }
    }

    pub fn apply<'a>(
        &self,
        tasks: &'a [Task],
        now: DateTime<Utc>,
        boundary: &DayBoundary,
    ) -> Vec<&'a Task> {
        derive(tasks, self, boundary.date_of(now))
    }
}

/// Filters, searches and sorts `tasks` without touching them.
pub fn derive<'a>(tasks: &'a [Task], query: &ViewQuery, today: NaiveDate) -> Vec<&'a Task> {
    let needle = query.search.to_lowercase();

    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|task| query.filter.keeps(task, today))
        .filter(|task| needle.is_empty() || task.title.to_lowercase().contains(&needle))
        .collect();

    // sort_by is stable: ties keep list order.
    out.sort_by(|a, b| query.sort.compare(a, b));
    out
}
