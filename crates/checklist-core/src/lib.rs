pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod format;
pub mod render;
pub mod storage;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use storage::{
  FileStorage,
  KeyValueStore,
  MemoryStorage,
  StorageKey
};
pub use store::{
  StoreError,
  TaskStore
};
pub use task::{
  Priority,
  Task,
  TaskId
};
pub use view::{
  SortKey,
  ViewFilter,
  ViewQuery,
  derive
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting checklist"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.checklistrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
      .chain(pre.rc_overrides)
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    FileStorage::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open storage at \
           {}",
          data_dir.display()
        )
      })?;
  let key =
    cfg.storage_key(cli.user.as_deref());
  let mut store =
    TaskStore::open(storage, &key);

  debug!(
    files = ?cfg.loaded_files(),
    "loaded config"
  );

  let renderer =
    render::Renderer::new(&cfg);
  let command = cli.command.unwrap_or(
    cli::Command::List {
      filter: None,
      search: None,
      sort:   None
    }
  );

  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    command,
    Utc::now(),
    datetime::day_boundary()
  )?;

  info!("done");
  Ok(())
}
