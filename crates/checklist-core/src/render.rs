use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, NaiveDate, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::format::{format_due, format_relative};
use crate::store::Stats;
use crate::task::Task;

pub const EMPTY_VIEW_MESSAGE: &str = "No tasks here. Add something you want to get done today!";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true);
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(rows = tasks.len()))]
    pub fn print_view(
        &self,
        tasks: &[&Task],
        stats: Stats,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_view(out, tasks, stats, now, today)
    }

    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        tasks: &[&Task],
        stats: Stats,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "{EMPTY_VIEW_MESSAGE}")?;
        } else {
            let headers = ["ID", "Done", "Title", "Due", "Priority", "Created"]
                .map(str::to_string)
                .to_vec();

            let rows = tasks
                .iter()
                .map(|task| self.row(task, now, today))
                .collect();
            write_table(&mut out, headers, rows)?;
        }

        writeln!(out)?;
        self.write_stats(&mut out, stats)
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: Stats) -> anyhow::Result<()> {
        writeln!(out, "{} total, {} completed", stats.total, stats.completed)?;
        Ok(())
    }

    pub fn print_task(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}  {}", self.paint(task.id.short(), "33"), task.title)?;
        Ok(())
    }

    fn row(&self, task: &Task, now: DateTime<Utc>, today: NaiveDate) -> Vec<String> {
        let overdue = task.is_overdue(today);

        let due = format_due(task.due);
        let due = if overdue { self.paint(&due, "31") } else { due };

        let mut created = format_relative(task.created_at, now);
        if overdue {
            created.push_str(" • Overdue");
        }

        vec![
            self.paint(task.id.short(), "33"),
            (if task.completed { "[x]" } else { "[ ]" }).to_string(),
            task.title.clone(),
            due,
            task.priority.to_string(),
            created,
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let line = |cells: &[String], writer: &mut W| -> anyhow::Result<()> {
        let mut text = String::new();
        for (idx, cell) in cells.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            text.push_str(cell);
            text.push_str(&" ".repeat(padding));
            text.push(' ');
        }
        writeln!(writer, "{}", text.trim_end())?;
        Ok(())
    };

    line(&headers, &mut writer)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    line(&rule, &mut writer)?;
    for row in &rows {
        line(row, &mut writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
