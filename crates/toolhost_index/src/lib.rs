//! Tool file discovery.
//!
//! Maintains a merged view over a user-shared directory and a project-local
//! directory of tool source files, keyed by name with project entries
//! overriding user entries of the same name.

mod watcher;

pub use watcher::{FileWatcher, WatcherError};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

/// Where a discovered tool file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Project,
    User,
}

/// A discovered tool source file. A `ToolFile` is replaced when its
/// mtime changes even though its name doesn't, which is what lets
/// `reconcile` tell a content edit apart from a no-op rescan.
#[derive(Debug, Clone)]
pub struct ToolFile {
    pub name: String,
    pub path: PathBuf,
    pub origin: Origin,
    pub modified: SystemTime,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tool-source file extension recognised by the index.
pub const TOOL_FILE_EXTENSION: &str = "ts";

/// The merged, named set of discovered tool files.
///
/// `reconcile` is idempotent: running it twice with no filesystem change
/// produces an identical mapping.
pub struct ToolIndex {
    user_dir: PathBuf,
    project_dir: PathBuf,
    files: BTreeMap<String, ToolFile>,
}

impl ToolIndex {
    pub fn new(user_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            project_dir: project_dir.into(),
            files: BTreeMap::new(),
        }
    }

    /// Current merged mapping, `name -> ToolFile`.
    pub fn files(&self) -> &BTreeMap<String, ToolFile> {
        &self.files
    }

    /// Re-scan both directories and replace the mapping atomically.
    ///
    /// Read errors on a single directory are logged and treated as "no
    /// files from that directory" rather than aborting the reconcile;
    /// a missing user directory should not prevent project tools from
    /// loading. A namespace whose mtime changed but whose name didn't is
    /// reported in `modified`, distinct from `added`/`removed`, so a
    /// caller can hot-reload the one worker that needs it instead of
    /// treating every rescan as a full namespace-set change.
    pub fn reconcile(&mut self) -> Result<ReconcileOutcome, IndexError> {
        let previous = self.files.clone();

        let mut merged = BTreeMap::new();
        for (origin, dir) in [(Origin::User, &self.user_dir), (Origin::Project, &self.project_dir)]
        {
            match scan_dir(dir, origin) {
                Ok(entries) => {
                    for entry in entries {
                        merged.insert(entry.name.clone(), entry);
                    }
                }
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "failed to scan tool directory");
                }
            }
        }

        self.files = merged;

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for (name, file) in &self.files {
            match previous.get(name) {
                None => added.push(name.clone()),
                Some(prev) if prev.modified != file.modified || prev.origin != file.origin => {
                    modified.push(name.clone())
                }
                Some(_) => {}
            }
        }
        let removed: Vec<String> = previous
            .keys()
            .filter(|name| !self.files.contains_key(*name))
            .cloned()
            .collect();

        let changed = !added.is_empty() || !modified.is_empty() || !removed.is_empty();
        Ok(ReconcileOutcome {
            changed,
            names: self.files.keys().cloned().collect(),
            added,
            modified,
            removed,
        })
    }
}

pub struct ReconcileOutcome {
    pub changed: bool,
    pub names: Vec<String>,
    /// Namespaces newly discovered this reconcile.
    pub added: Vec<String>,
    /// Namespaces that already existed but whose file mtime (or origin)
    /// changed. These need their worker hot-reloaded, not just spawned.
    pub modified: Vec<String>,
    /// Namespaces whose tool file disappeared.
    pub removed: Vec<String>,
}

fn scan_dir(dir: &Path, origin: Origin) -> Result<Vec<ToolFile>, IndexError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let entries = fs::read_dir(dir).map_err(|source| IndexError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if ext != TOOL_FILE_EXTENSION {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let name = normalize_name(stem);
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        out.push(ToolFile {
            name,
            path: path.canonicalize().unwrap_or(path),
            origin,
            modified,
        });
    }

    Ok(out)
}

/// Namespace names end up as the first segment of method strings, which
/// are restricted to `[A-Za-z0-9_]`. Any other character in a file stem
/// becomes `_`.
fn normalize_name(stem: &str) -> String {
    stem.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_tool(dir: &Path, name: &str, body: &str) {
        let mut f = File::create(dir.join(format!("{name}.ts"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn project_overrides_user_entry_of_same_name() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_tool(user.path(), "shared", "// user");
        write_tool(project.path(), "shared", "// project");

        let mut index = ToolIndex::new(user.path(), project.path());
        index.reconcile().unwrap();

        let entry = index.files().get("shared").unwrap();
        assert_eq!(entry.origin, Origin::Project);
    }

    #[test]
    fn reconcile_is_idempotent_with_no_changes() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_tool(project.path(), "a", "// a");

        let mut index = ToolIndex::new(user.path(), project.path());
        let first = index.reconcile().unwrap();
        let second = index.reconcile().unwrap();
        assert!(first.changed);
        assert!(first.added == vec!["a".to_string()]);
        assert!(!second.changed);
        assert!(second.added.is_empty() && second.modified.is_empty() && second.removed.is_empty());
        assert_eq!(first.names, second.names);
    }

    #[test]
    fn content_edit_with_same_name_is_reported_as_modified_not_added() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let path = project.path().join("a.ts");
        write_tool(project.path(), "a", "// v1");

        let mut index = ToolIndex::new(user.path(), project.path());
        index.reconcile().unwrap();

        let bumped = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        write_tool(project.path(), "a", "// v2, longer body");
        File::options().write(true).open(&path).unwrap().set_modified(bumped).unwrap();

        let outcome = index.reconcile().unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.modified, vec!["a".to_string()]);
        assert!(outcome.added.is_empty());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn removed_file_is_reported_and_drops_from_the_map() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let path = project.path().join("a.ts");
        write_tool(project.path(), "a", "// a");

        let mut index = ToolIndex::new(user.path(), project.path());
        index.reconcile().unwrap();
        std::fs::remove_file(&path).unwrap();

        let outcome = index.reconcile().unwrap();
        assert_eq!(outcome.removed, vec!["a".to_string()]);
        assert!(index.files().is_empty());
    }

    #[test]
    fn non_tool_extensions_are_ignored() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_tool(project.path(), "a", "// a");
        File::create(project.path().join("README.md")).unwrap();

        let mut index = ToolIndex::new(user.path(), project.path());
        index.reconcile().unwrap();
        assert_eq!(index.files().len(), 1);
    }

    #[test]
    fn file_stem_with_disallowed_chars_is_normalized() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_tool(project.path(), "my-tools.v2", "// a");

        let mut index = ToolIndex::new(user.path(), project.path());
        index.reconcile().unwrap();
        assert!(index.files().contains_key("my_tools_v2"));
    }

    #[test]
    fn missing_user_dir_does_not_abort_reconcile() {
        let project = tempfile::tempdir().unwrap();
        write_tool(project.path(), "a", "// a");

        let mut index = ToolIndex::new("/nonexistent/toolhost-user-dir", project.path());
        let outcome = index.reconcile().unwrap();
        assert_eq!(outcome.names, vec!["a".to_string()]);
    }
}
