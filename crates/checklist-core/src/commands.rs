use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::datetime::{DayBoundary, parse_due_expr};
use crate::render::Renderer;
use crate::storage::KeyValueStore;
use crate::store::TaskStore;
use crate::view::{SortKey, ViewFilter, ViewQuery};

/// Runs one user action against the store, then shows the list again the way
/// the browser re-renders after every change.
#[instrument(skip(store, cfg, renderer, boundary))]
pub fn dispatch<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    now: DateTime<Utc>,
    boundary: &DayBoundary,
) -> anyhow::Result<()> {
    let today = boundary.date_of(now);

    let query = match command {
        Command::Add {
            title,
            due,
            priority,
        } => {
            let due = match due {
                Some(raw) => parse_due_expr(&raw, today)?,
                None => None,
            };
            let task = store.add_at(&title.join(" "), due, priority, now)?;
            info!(id = %task.id, "task added");
            renderer.print_task(&task)?;
            default_query(cfg)
        }
        Command::List {
            filter,
            search,
            sort,
        } => {
            let filter = match filter {
                Some(filter) => filter,
                None => cfg.default_filter()?,
            };
            let sort = match sort {
                Some(sort) => sort,
                None => cfg.default_sort()?,
            };
            ViewQuery::new(filter, search.unwrap_or_default(), sort)
        }
        Command::Done { id } => {
            let id = store.resolve_id(&id)?;
            store.toggle_completed(&id);
            default_query(cfg)
        }
        Command::Delete { id } => {
            let id = store.resolve_id(&id)?;
            store.remove(&id);
            default_query(cfg)
        }
        Command::Edit { id, title } => {
            let id = store.resolve_id(&id)?;
            store.begin_edit(&id);
            store.set_draft(&title.join(" "));
            store.commit_edit();
            default_query(cfg)
        }
        Command::Priority { id, level } => {
            let id = store.resolve_id(&id)?;
            store.set_priority(&id, level);
            default_query(cfg)
        }
        Command::Due { id, date } => {
            let id = store.resolve_id(&id)?;
            let due = parse_due_expr(&date, today)
                .with_context(|| format!("failed to set due date for {id}"))?;
            store.set_due(&id, due);
            default_query(cfg)
        }
        Command::ClearCompleted => {
            store.clear_completed();
            default_query(cfg)
        }
        Command::ClearAll => {
            store.clear_all();
            default_query(cfg)
        }
        Command::Stats => {
            let stats = store.stats(today);
            println!(
                "total      {}\ncompleted  {}\nactive     {}\noverdue    {}",
                stats.total, stats.completed, stats.active, stats.overdue
            );
            return Ok(());
        }
    };

    let view = store.view(&query, today);
    renderer.print_view(&view, store.stats(today), now, today)
}

// A change has already been saved by the time the list is redrawn, so a bad
// default only degrades the redraw.
fn default_query(cfg: &Config) -> ViewQuery {
    let filter = cfg.default_filter().unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "ignoring default.filter");
        ViewFilter::All
    });
    let sort = cfg.default_sort().unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "ignoring default.sort");
        SortKey::CreatedDesc
    });
    ViewQuery::new(filter, "", sort)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::dispatch;
    use crate::cli::Command;
    use crate::config::Config;
    use crate::datetime::DayBoundary;
    use crate::render::Renderer;
    use crate::storage::{MemoryStorage, StorageKey};
    use crate::store::{StoreError, TaskStore};
    use crate::task::Priority;
    use crate::view::SortKey;

    fn run(store: &mut TaskStore<MemoryStorage>, command: Command) -> anyhow::Result<()> {
        run_with(store, &Config::defaults(), command)
    }

    fn run_with(
        store: &mut TaskStore<MemoryStorage>,
        cfg: &Config,
        command: Command,
    ) -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).single().expect("valid now");
        dispatch(
            store,
            cfg,
            &Renderer::plain(),
            command,
            now,
            &DayBoundary::Zone(chrono_tz::UTC),
        )
    }

    #[test]
    fn add_edit_and_complete_through_commands() {
        let mut store = TaskStore::open(MemoryStorage::new(), &StorageKey::default());

        run(
            &mut store,
            Command::Add {
                title: vec!["Buy".to_string(), "milk".to_string()],
                due: Some("yesterday".to_string()),
                priority: Priority::High,
            },
        )
        .expect("add");
        let id = store.tasks()[0].id.clone();
        assert_eq!(store.tasks()[0].title, "Buy milk");
        assert_eq!(store.tasks()[0].due.map(|d| d.to_string()).as_deref(), Some("2024-06-14"));

        run(
            &mut store,
            Command::Edit {
                id: id.short().to_string(),
                title: vec!["Buy oat milk".to_string()],
            },
        )
        .expect("edit");
        assert_eq!(store.tasks()[0].title, "Buy oat milk");
        assert!(store.editing().is_none());

        run(&mut store, Command::Done { id: id.to_string() }).expect("done");
        assert!(store.tasks()[0].completed);

        run(&mut store, Command::ClearCompleted).expect("clear");
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn empty_title_surfaces_as_error_without_changes() {
        let mut store = TaskStore::open(MemoryStorage::new(), &StorageKey::default());

        let err = run(
            &mut store,
            Command::Add {
                title: vec!["   ".to_string()],
                due: None,
                priority: Priority::Medium,
            },
        )
        .expect_err("blank title must fail");

        assert_eq!(err.downcast_ref::<StoreError>(), Some(&StoreError::EmptyTitle));
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn unknown_id_prefix_is_reported() {
        let mut store = TaskStore::open(MemoryStorage::new(), &StorageKey::default());
        assert!(run(&mut store, Command::Delete { id: "nope".to_string() }).is_err());
    }

    #[test]
    fn bad_default_sort_does_not_block_changes() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([("rc.default.sort".to_string(), "sideways".to_string())]);
        let mut store = TaskStore::open(MemoryStorage::new(), &StorageKey::default());

        run_with(
            &mut store,
            &cfg,
            Command::Add {
                title: vec!["Water plants".to_string()],
                due: None,
                priority: Priority::Low,
            },
        )
        .expect("add despite bad default.sort");
        assert_eq!(store.tasks().len(), 1);

        let id = store.tasks()[0].id.to_string();
        run_with(&mut store, &cfg, Command::Done { id: id.clone() }).expect("done");
        assert!(store.tasks()[0].completed);

        run_with(&mut store, &cfg, Command::Delete { id }).expect("delete");
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn bad_default_sort_fails_list_only_when_it_is_used() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([("rc.default.sort".to_string(), "sideways".to_string())]);
        let mut store = TaskStore::open(MemoryStorage::new(), &StorageKey::default());

        let err = run_with(
            &mut store,
            &cfg,
            Command::List {
                filter: None,
                search: None,
                sort: None,
            },
        )
        .expect_err("list falls back to the bad default");
        assert!(format!("{err:#}").contains("invalid default.sort"));

        run_with(
            &mut store,
            &cfg,
            Command::List {
                filter: None,
                search: None,
                sort: Some(SortKey::DueAsc),
            },
        )
        .expect("explicit sort bypasses the default");
    }
}
