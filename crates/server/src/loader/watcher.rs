//! Filesystem event handler for the notify watcher (hot-reload).

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tracing::warn;

use crate::registry::SourceRegistry;

use super::core::{apply_file, forget_file, is_dotfile, is_yaml, TrackedFiles};

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, registry: &SourceRegistry, files: &TrackedFiles) {
    for path in &event.paths {
        // Skip dotfiles (editor swap files) and anything that is not YAML.
        if !is_yaml(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                forget_file(path, registry, files);
            }
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any) => {
                // A rename reported without direction: the path tells which side it is.
                if !path.exists() {
                    forget_file(path, registry, files);
                    continue;
                }
                if let Err(e) = apply_file(path, registry, files) {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to reload source, keeping previous version"
                    );
                }
            }
            _ => {}
        }
    }
}
