//! Core [`SourceLoader`] struct: filesystem-backed source registration with optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use cmg_core::{GeneratorError, Result, SourceDefinition};

use crate::registry::SourceRegistry;

use super::report::{LoadResult, LoadStatus};
use super::watcher::handle_fs_event;

/// Path of each loaded file → the key it registered.
pub(super) type TrackedFiles = Arc<RwLock<HashMap<PathBuf, String>>>;

/// Filesystem-backed source loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, parses each
/// into a [`SourceDefinition`] and registers it. Remembers which key every
/// file registered so that a later edit or deletion affects the right source.
pub struct SourceLoader {
    /// Root directory containing source YAML files.
    sources_dir: PathBuf,
    registry: Arc<SourceRegistry>,
    files: TrackedFiles,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl SourceLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(sources_dir: PathBuf, registry: Arc<SourceRegistry>) -> Self {
        if !sources_dir.exists() {
            if let Err(e) = fs::create_dir_all(&sources_dir) {
                warn!(path = %sources_dir.display(), error = %e, "failed to create sources directory");
            }
        }
        // Watcher events carry absolute paths; scan with the same form.
        let sources_dir = fs::canonicalize(&sources_dir).unwrap_or(sources_dir);
        Self {
            sources_dir,
            registry,
            files: Arc::new(RwLock::new(HashMap::new())),
            _watcher: None,
        }
    }

    /// Recursively scan the sources directory and register every YAML file.
    ///
    /// Dotfiles and non-YAML files are skipped. Errors are reported per file
    /// and never abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.sources_dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        // Deterministic order: the last file wins when two share a key.
        paths.sort();

        for path in paths {
            if is_dotfile(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            let status = match apply_file(&path, &self.registry, &self.files) {
                Ok(key) => LoadStatus::Loaded { key },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load source file");
                    LoadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push(LoadResult { path, status });
        }

        Ok(())
    }

    /// Parse a single YAML file into a [`SourceDefinition`].
    ///
    /// The key is trimmed; a missing or blank `key` defaults to the file stem.
    pub fn load_file(path: &Path) -> Result<SourceDefinition> {
        let contents = fs::read_to_string(path)?;
        let mut definition: SourceDefinition = serde_yaml::from_str(&contents)?;

        definition.key = definition.key.trim().to_string();
        if definition.key.is_empty() {
            definition.key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    GeneratorError::Validation(format!("cannot derive a key from {}", path.display()))
                })?;
        }
        Ok(definition)
    }

    /// Start a recursive filesystem watcher on the sources directory.
    ///
    /// On file create/modify the source is re-parsed and re-registered.
    /// On file delete its source is unregistered.
    /// Parse errors are logged as warnings; the previous registration is kept.
    pub fn watch(&mut self) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let files = Arc::clone(&self.files);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => handle_fs_event(&event, &registry, &files),
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        })
        .map_err(watch_error)?;

        watcher
            .watch(&self.sources_dir, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        info!(path = %self.sources_dir.display(), "watching sources directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn sources_dir(&self) -> &Path {
        &self.sources_dir
    }

    /// The key registered by `path`, if the file is loaded.
    pub fn key_for(&self, path: &Path) -> Option<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

fn watch_error(e: notify::Error) -> GeneratorError {
    GeneratorError::Watch(e.to_string())
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Parse `path` and register its source.
///
/// If the file previously registered a different key, that key is
/// unregistered unless another file still provides it.
pub(super) fn apply_file(path: &Path, registry: &SourceRegistry, files: &TrackedFiles) -> Result<String> {
    let definition = SourceLoader::load_file(path)?;
    let key = definition.key.clone();
    registry.register(definition)?;

    let mut tracked = files.write().unwrap_or_else(PoisonError::into_inner);
    let previous = tracked.insert(path.to_path_buf(), key.clone());
    if let Some(old) = previous.filter(|old| *old != key) {
        if !tracked.values().any(|k| *k == old) {
            registry.unregister(&old);
        }
    }
    drop(tracked);

    info!(key = %key, path = %path.display(), "loaded source");
    Ok(key)
}

/// Stop tracking `path`. If another file still claims its key, that file is
/// re-registered so the key serves the surviving definition; otherwise the
/// key is unregistered. Returns the key the file had registered.
pub(super) fn forget_file(path: &Path, registry: &SourceRegistry, files: &TrackedFiles) -> Option<String> {
    let mut tracked = files.write().unwrap_or_else(PoisonError::into_inner);
    let key = tracked.remove(path)?;
    let mut providers: Vec<PathBuf> = tracked
        .iter()
        .filter(|(_, k)| **k == key)
        .map(|(p, _)| p.clone())
        .collect();
    drop(tracked);

    // Same precedence as the initial scan: the last path in sorted order wins.
    providers.sort();
    let restored = providers.iter().rev().any(|other| match apply_file(other, registry, files) {
        Ok(k) => k == key,
        Err(e) => {
            warn!(key = %key, path = %other.display(), error = %e, "failed to restore source from remaining file");
            false
        }
    });
    if !restored {
        registry.unregister(&key);
    }
    info!(key = %key, path = %path.display(), "removed source after file deletion");
    Some(key)
}
