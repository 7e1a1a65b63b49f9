use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::storage::{
  DEFAULT_STORAGE_KEY,
  StorageKey
};
use crate::view::{
  SortKey,
  ViewFilter
};

const RC_ENV_VAR: &str = "CHECKLISTRC";
const RC_FILE_NAME: &str =
  ".checklistrc";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading checklistrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no checklistrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  pub fn defaults() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.checklist".to_string()
    );
    map.insert(
      "storage.key".to_string(),
      DEFAULT_STORAGE_KEY.to_string()
    );
    map.insert(
      "default.filter".to_string(),
      ViewFilter::All.to_string()
    );
    map.insert(
      "default.sort".to_string(),
      SortKey::CreatedDesc.to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  /// Rc files read so far, includes
  /// after the file that named them.
  pub fn loaded_files(
    &self
  ) -> &[PathBuf] {
    &self.loaded_files
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Slot key for the task list. An
  /// explicit user wins over the
  /// configured namespace.
  pub fn storage_key(
    &self,
    user: Option<&str>
  ) -> StorageKey {
    let base = self
      .get("storage.key")
      .filter(|key| {
        !key.trim().is_empty()
      })
      .unwrap_or_else(|| {
        DEFAULT_STORAGE_KEY.to_string()
      });
    let configured =
      self.get("storage.namespace");
    let namespace =
      user.or(configured.as_deref());

    StorageKey::new(base.trim())
      .with_namespace(namespace)
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<ViewFilter> {
    self
      .get("default.filter")
      .map_or(Ok(ViewFilter::All), |raw| {
        raw.parse().context(
          "invalid default.filter"
        )
      })
  }

  pub fn default_sort(
    &self
  ) -> anyhow::Result<SortKey> {
    self
      .get("default.sort")
      .map_or(
        Ok(SortKey::CreatedDesc),
        |raw| {
          raw.parse().context(
            "invalid default.sort"
          )
        }
      )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       checklistrc lookup"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".checklist"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::Config;
  use crate::view::{
    SortKey,
    ViewFilter
  };

  #[test]
  fn defaults_cover_every_key() {
    let cfg = Config::defaults();
    assert_eq!(
      cfg.storage_key(None).as_key(),
      "advanced_todo_tasks_v1"
    );
    assert_eq!(
      cfg.default_filter().expect("filter"),
      ViewFilter::All
    );
    assert_eq!(
      cfg.default_sort().expect("sort"),
      SortKey::CreatedDesc
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
  }

  #[test]
  fn reads_rc_file_with_comments_and_includes()
  {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "default.sort = due-asc\n"
    )
    .expect("write include");
    let rc =
      temp.path().join("checklistrc");
    fs::write(
      &rc,
      "# personal settings\n\
       storage.namespace = alice # me\n\
       color = off\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load config");

    assert_eq!(cfg.loaded_files().len(), 2);
    assert_eq!(
      cfg.storage_key(None).as_key(),
      "advanced_todo_tasks_v1:alice"
    );
    assert_eq!(
      cfg
        .storage_key(Some("bob"))
        .as_key(),
      "advanced_todo_tasks_v1:bob"
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
    assert_eq!(
      cfg.default_sort().expect("sort"),
      SortKey::DueAsc
    );
  }

  #[test]
  fn rejects_lines_without_equals() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "color on\n")
      .expect("write rc");

    assert!(
      Config::load(Some(rc.as_path())).is_err()
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![
      (
        "rc.default.filter".to_string(),
        "overdue".to_string()
      ),
      (
        "default.sort".to_string(),
        "sideways".to_string()
      ),
    ]);

    assert_eq!(
      cfg.default_filter().expect("filter"),
      ViewFilter::Overdue
    );
    assert!(cfg.default_sort().is_err());
  }
}
