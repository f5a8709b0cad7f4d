//! Restart trigger: a per-application-root sentinel file that forces a
//! Domain purge and respawn.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Tracks the last observed mtime of `<app_root>/tmp/restart.txt` per root.
///
/// Keys are a subset of live Domains' keys (SPEC_FULL.md §3 invariant 8);
/// the pool core is responsible for removing an entry when its Domain is
/// destroyed.
#[derive(Default)]
pub(crate) struct RestartProbe {
    recorded: HashMap<Arc<str>, SystemTime>,
}

impl RestartProbe {
    pub(crate) fn forget(&mut self, app_root: &Arc<str>) {
        self.recorded.remove(app_root);
    }

    /// Implements §4.4: delete-on-observe, falling back to mtime comparison
    /// when the trigger file cannot be removed (e.g. read-only mounts).
    pub(crate) fn needs_restart(&mut self, app_root: &Arc<str>) -> bool {
        let path = Path::new(app_root.as_ref()).join("tmp").join("restart.txt");

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => {
                self.recorded.remove(app_root);
                return false;
            }
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                self.recorded.remove(app_root);
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.recorded.remove(app_root);
                true
            }
            Err(_) => {
                let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                let previous = self.recorded.insert(Arc::clone(app_root), mtime);
                match previous {
                    None => true,
                    Some(previous) => previous != mtime,
                }
            }
        }
    }
}
